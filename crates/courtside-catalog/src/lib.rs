// HTTP client for the balldontlie players catalog.
//
// Issues one GET per cursor and validates the response against an explicit
// schema. Anything that does not match (missing `data`, missing `meta`,
// oversized pages) is reported as `Malformed` rather than being read as an
// empty page.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tracing::{debug, warn};

use courtside_core::{CatalogClient, CatalogError, CatalogQuery, Cursor, Page, Player};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.balldontlie.io/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wire schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PlayersResponse {
    data: Vec<Player>,
    meta: ResponseMeta,
}

#[derive(Debug, Deserialize)]
struct ResponseMeta {
    #[serde(default)]
    next_cursor: Option<u64>,
    #[serde(default)]
    per_page: Option<u32>,
}

/// Parse and validate a players response body.
pub fn parse_page(body: &str) -> Result<Page<Player>, CatalogError> {
    let response: PlayersResponse =
        serde_json::from_str(body).map_err(|e| CatalogError::Malformed {
            message: e.to_string(),
        })?;

    if let Some(per_page) = response.meta.per_page {
        if response.data.len() > per_page as usize {
            return Err(CatalogError::Malformed {
                message: format!(
                    "page holds {} players but per_page is {}",
                    response.data.len(),
                    per_page
                ),
            });
        }
    }

    Ok(Page {
        items: response.data,
        next_cursor: response.meta.next_cursor,
    })
}

// ---------------------------------------------------------------------------
// BallDontLieClient
// ---------------------------------------------------------------------------

/// Catalog client for `GET {base_url}/players`.
pub struct BallDontLieClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl BallDontLieClient {
    /// Build a client. `api_key` is sent verbatim in the `Authorization`
    /// header when present.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Http {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    fn players_url(&self) -> String {
        format!("{}/players", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CatalogClient for BallDontLieClient {
    type Item = Player;

    async fn fetch_page(
        &self,
        query: &CatalogQuery,
        cursor: Cursor,
    ) -> Result<Page<Player>, CatalogError> {
        let mut params: Vec<(&str, String)> = vec![("per_page", query.per_page.to_string())];
        if let Some(token) = cursor.token() {
            params.push(("cursor", token.to_string()));
        }
        if let Some(search) = &query.search {
            params.push(("search", search.clone()));
        }

        let mut request = self
            .http
            .get(self.players_url())
            .header(ACCEPT, "application/json")
            .query(&params);
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, key);
        }

        debug!("GET players cursor={} per_page={}", cursor, query.per_page);
        let response = request.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("Catalog responded with HTTP {}", status);
            return Err(CatalogError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(transport_error)?;
        let page = parse_page(&body)?;
        debug!(
            "Received {} players, next_cursor={:?}",
            page.items.len(),
            page.next_cursor
        );
        Ok(page)
    }
}

fn transport_error(err: reqwest::Error) -> CatalogError {
    if err.is_timeout() {
        CatalogError::Timeout
    } else {
        CatalogError::Http {
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const PLAYER_JSON: &str = r#"{
        "id": 1,
        "first_name": "Alex",
        "last_name": "Abrines",
        "position": "G",
        "height": "6-6",
        "weight": "190",
        "jersey_number": "8",
        "college": "FC Barcelona",
        "country": "Spain",
        "draft_year": 2013,
        "draft_round": 2,
        "draft_number": 32,
        "team": {
            "id": 21,
            "conference": "West",
            "division": "Northwest",
            "city": "Oklahoma City",
            "name": "Thunder",
            "full_name": "Oklahoma City Thunder",
            "abbreviation": "OKC"
        }
    }"#;

    fn body(next_cursor: &str, per_page: u32) -> String {
        format!(
            r#"{{"data": [{PLAYER_JSON}], "meta": {{"next_cursor": {next_cursor}, "per_page": {per_page}}}}}"#
        )
    }

    // -----------------------------------------------------------------------
    // parse_page
    // -----------------------------------------------------------------------

    #[test]
    fn parses_page_with_next_cursor() {
        let page = parse_page(&body("1", 10)).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].last_name, "Abrines");
        assert_eq!(page.next_cursor, Some(1));
    }

    #[test]
    fn null_next_cursor_means_last_page() {
        let page = parse_page(&body("null", 10)).unwrap();
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn absent_next_cursor_means_last_page() {
        let page = parse_page(r#"{"data": [], "meta": {"per_page": 10}}"#).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn missing_data_is_malformed() {
        let err = parse_page(r#"{"meta": {"next_cursor": 5}}"#).unwrap_err();
        assert!(matches!(err, CatalogError::Malformed { .. }));
    }

    #[test]
    fn missing_meta_is_malformed() {
        let err = parse_page(r#"{"data": []}"#).unwrap_err();
        assert!(matches!(err, CatalogError::Malformed { .. }));
    }

    #[test]
    fn non_array_data_is_malformed() {
        let err = parse_page(r#"{"data": {"id": 1}, "meta": {}}"#).unwrap_err();
        assert!(matches!(err, CatalogError::Malformed { .. }));
    }

    #[test]
    fn oversized_page_is_malformed() {
        let err = parse_page(&body("2", 0)).unwrap_err();
        match err {
            CatalogError::Malformed { message } => assert!(message.contains("per_page is 0")),
            other => panic!("expected Malformed, got: {other}"),
        }
    }

    #[test]
    fn html_error_page_is_malformed() {
        assert!(parse_page("<html>502 Bad Gateway</html>").is_err());
    }

    #[test]
    fn empty_api_key_is_not_sent() {
        let client = BallDontLieClient::new(DEFAULT_BASE_URL, Some(String::new()), DEFAULT_TIMEOUT)
            .unwrap();
        assert!(client.api_key.is_none());
        assert_eq!(client.players_url(), "https://api.balldontlie.io/v1/players");
    }

    // -----------------------------------------------------------------------
    // fetch_page against a local one-shot HTTP server
    // -----------------------------------------------------------------------

    /// Serve a single canned response and hand back the raw request text.
    async fn serve_once(
        status_line: &'static str,
        body: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn fetch_sends_cursor_and_auth() {
        let (base, server) = serve_once("HTTP/1.1 200 OK", body("11", 10)).await;
        let client =
            BallDontLieClient::new(base, Some("secret-key".into()), DEFAULT_TIMEOUT).unwrap();

        let page = client
            .fetch_page(&CatalogQuery::new(10), Cursor::At(1))
            .await
            .unwrap();
        assert_eq!(page.next_cursor, Some(11));

        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("GET /players?"));
        assert!(request_line.contains("per_page=10"));
        assert!(request_line.contains("cursor=1"));
        assert!(request.to_lowercase().contains("authorization: secret-key"));
    }

    #[tokio::test]
    async fn first_page_omits_cursor() {
        let (base, server) = serve_once("HTTP/1.1 200 OK", body("null", 5)).await;
        let client = BallDontLieClient::new(base, None, DEFAULT_TIMEOUT).unwrap();

        let query = CatalogQuery::new(5).with_search("abr");
        client.fetch_page(&query, Cursor::Start).await.unwrap();

        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(!request_line.contains("cursor="));
        assert!(request_line.contains("search=abr"));
        assert!(!request.to_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (base, _server) =
            serve_once("HTTP/1.1 429 Too Many Requests", "{}".to_string()).await;
        let client = BallDontLieClient::new(base, None, DEFAULT_TIMEOUT).unwrap();

        let err = client
            .fetch_page(&CatalogQuery::default(), Cursor::Start)
            .await
            .unwrap_err();
        assert_eq!(err, CatalogError::Status { status: 429 });
    }

    #[tokio::test]
    async fn unreachable_host_is_http_error() {
        // Bind and immediately drop to get a port nothing listens on.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let client =
            BallDontLieClient::new(format!("http://{addr}"), None, DEFAULT_TIMEOUT).unwrap();

        let err = client
            .fetch_page(&CatalogQuery::default(), Cursor::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Http { .. }));
    }
}
