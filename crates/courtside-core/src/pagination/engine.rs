// Async driver for pagination sessions.
//
// Each accepted ticket is fetched on its own tokio task; the result comes back
// as a `PageEvent` over an mpsc channel and is folded in by whoever owns the
// engine (the app loop). Sessions are only ever mutated through `&mut self`,
// so there is a single writer and the session's `loading` phase is the only
// guard against duplicate requests.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::session::{Completion, FetchTicket, Session};
use crate::catalog::{CatalogClient, CatalogQuery, Cursor, Page};
use crate::error::CatalogError;

/// Handle to a session owned by a [`PaginationEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Accepts both the bare number and the displayed `session#N` form.
impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("session#").unwrap_or(s);
        raw.parse().map(SessionId)
    }
}

/// A finished fetch, on its way back to the engine.
#[derive(Debug)]
pub struct PageEvent<T> {
    pub session: SessionId,
    pub generation: u64,
    pub result: Result<Page<T>, CatalogError>,
}

struct Entry<T> {
    session: Session<T>,
    task: Option<JoinHandle<()>>,
}

/// Owns every live session and the catalog client they share.
pub struct PaginationEngine<C: CatalogClient> {
    client: Arc<C>,
    events: mpsc::Sender<PageEvent<C::Item>>,
    sessions: HashMap<SessionId, Entry<C::Item>>,
    next_id: u64,
}

impl<C> PaginationEngine<C>
where
    C: CatalogClient + 'static,
{
    /// Create an engine that reports fetch results through `events`.
    pub fn new(client: Arc<C>, events: mpsc::Sender<PageEvent<C::Item>>) -> Self {
        PaginationEngine {
            client,
            events,
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Begin a session at the start of the catalog. No request is made until
    /// the first `advance`.
    pub fn start(&mut self, query: CatalogQuery) -> SessionId {
        self.insert(Session::new(query))
    }

    /// Begin a session whose first page starts at `cursor`.
    pub fn start_at(&mut self, query: CatalogQuery, cursor: Cursor) -> SessionId {
        self.insert(Session::starting_at(query, cursor))
    }

    /// Fetch the next page of a session.
    ///
    /// Returns `false` without touching the catalog when the session is
    /// unknown, already loading, in error, or exhausted. Viewport triggers may
    /// call this as often as they fire.
    pub fn advance(&mut self, id: SessionId) -> bool {
        self.dispatch(id, |s| s.begin_forward())
    }

    /// Fetch the page before the earliest one held.
    pub fn advance_backward(&mut self, id: SessionId) -> bool {
        self.dispatch(id, |s| s.begin_backward())
    }

    /// Re-issue the request that put a session into error.
    pub fn retry(&mut self, id: SessionId) -> bool {
        self.dispatch(id, |s| s.retry())
    }

    /// Drop a session. Any in-flight fetch is aborted, and a result that
    /// still makes it back is ignored.
    pub fn discard(&mut self, id: SessionId) -> bool {
        match self.sessions.remove(&id) {
            Some(entry) => {
                if let Some(task) = entry.task {
                    task.abort();
                }
                info!("Discarded {} after {} pages", id, entry.session.page_count());
                true
            }
            None => false,
        }
    }

    /// Fold a fetch result into its session.
    pub fn handle_event(&mut self, event: PageEvent<C::Item>) -> Completion {
        let Some(entry) = self.sessions.get_mut(&event.session) else {
            debug!("Dropping page event for discarded {}", event.session);
            return Completion::Stale;
        };

        let completion = entry.session.complete(event.generation, event.result);
        if let Completion::Applied(status) = &completion {
            entry.task = None;
            debug!(
                "{} now {:?} with {} pages",
                event.session,
                status,
                entry.session.page_count()
            );
        }
        completion
    }

    pub fn session(&self, id: SessionId) -> Option<&Session<C::Item>> {
        self.sessions.get(&id).map(|e| &e.session)
    }

    /// All items of a session in listing order, or `None` if it is unknown.
    pub fn flattened_items(&self, id: SessionId) -> Option<impl Iterator<Item = &C::Item> + '_> {
        self.session(id).map(|s| s.flattened_items())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Ids of all live sessions, oldest first.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        ids.sort();
        ids
    }

    fn insert(&mut self, session: Session<C::Item>) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        info!("Started {} at cursor {}", id, session.cursor());
        self.sessions.insert(
            id,
            Entry {
                session,
                task: None,
            },
        );
        id
    }

    fn dispatch<F>(&mut self, id: SessionId, begin: F) -> bool
    where
        F: FnOnce(&mut Session<C::Item>) -> Option<FetchTicket>,
    {
        let Some(entry) = self.sessions.get_mut(&id) else {
            debug!("Ignoring request for unknown {}", id);
            return false;
        };
        let Some(ticket) = begin(&mut entry.session) else {
            debug!("{} is {:?}; request skipped", id, entry.session.status());
            return false;
        };

        debug!(
            "{} fetching {:?} at cursor {} (gen {})",
            id, ticket.direction, ticket.cursor, ticket.generation
        );

        let client = Arc::clone(&self.client);
        let tx = self.events.clone();
        let query = entry.session.query().clone();
        entry.task = Some(tokio::spawn(async move {
            let result = client.fetch_page(&query, ticket.cursor).await;
            let event = PageEvent {
                session: id,
                generation: ticket.generation,
                result,
            };
            if tx.send(event).await.is_err() {
                debug!("Page event receiver dropped for {}", id);
            }
        }));
        true
    }
}
