// Contract for the external, cursor-paginated catalog service.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Page size the catalog is queried with unless configured otherwise.
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Position in the catalog a page request starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cursor {
    /// Sentinel: from the beginning of the catalog.
    Start,
    /// Token returned by the catalog as a page's `next_cursor`.
    At(u64),
}

impl Cursor {
    /// The raw token to send, or `None` for the start sentinel.
    pub fn token(&self) -> Option<u64> {
        match self {
            Cursor::Start => None,
            Cursor::At(n) => Some(*n),
        }
    }

    /// Cursor of the page preceding the one that starts here, or `None` when
    /// nothing precedes it.
    pub fn back(&self, page_size: u32) -> Option<Cursor> {
        match *self {
            Cursor::Start | Cursor::At(0) => None,
            Cursor::At(n) if n <= u64::from(page_size) => Some(Cursor::Start),
            Cursor::At(n) => Some(Cursor::At(n - u64::from(page_size))),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Start => f.write_str("start"),
            Cursor::At(n) => write!(f, "{n}"),
        }
    }
}

/// What a pagination session is listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogQuery {
    /// Free-text filter passed through to the catalog, if any.
    pub search: Option<String>,
    pub per_page: u32,
}

impl CatalogQuery {
    pub fn new(per_page: u32) -> Self {
        CatalogQuery {
            search: None,
            per_page,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }
}

impl Default for CatalogQuery {
    fn default() -> Self {
        CatalogQuery::new(DEFAULT_PER_PAGE)
    }
}

/// One validated page of catalog results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the following page; `None` once the catalog is exhausted.
    pub next_cursor: Option<u64>,
}

/// A page source. Implementations own no pagination state.
///
/// Requests must be idempotent per cursor: asking for the same cursor twice
/// returns the same page or a superset of it, which is what makes retry safe.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    type Item: Clone + Send + Sync + 'static;

    async fn fetch_page(
        &self,
        query: &CatalogQuery,
        cursor: Cursor,
    ) -> Result<Page<Self::Item>, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_has_no_token() {
        assert_eq!(Cursor::Start.token(), None);
        assert_eq!(Cursor::At(25).token(), Some(25));
    }

    #[test]
    fn back_steps_one_page() {
        assert_eq!(Cursor::At(30).back(10), Some(Cursor::At(20)));
    }

    #[test]
    fn back_from_first_page_lands_on_start() {
        assert_eq!(Cursor::At(10).back(10), Some(Cursor::Start));
        assert_eq!(Cursor::At(4).back(10), Some(Cursor::Start));
    }

    #[test]
    fn nothing_precedes_the_beginning() {
        assert_eq!(Cursor::Start.back(10), None);
        assert_eq!(Cursor::At(0).back(10), None);
    }

    #[test]
    fn default_query_uses_default_page_size() {
        let q = CatalogQuery::default();
        assert_eq!(q.per_page, DEFAULT_PER_PAGE);
        assert!(q.search.is_none());
        assert_eq!(q.with_search("james").search.as_deref(), Some("james"));
    }
}
