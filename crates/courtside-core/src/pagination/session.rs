// Per-session cursor state machine. Pure and synchronous: it hands out fetch
// tickets and folds completions back in, but never performs I/O itself.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::catalog::{CatalogQuery, Cursor, Page};
use crate::error::CatalogError;

/// Which end of the listing a fetch extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Loading(Direction),
    Error,
    Exhausted,
}

/// A fetch the session has committed to. The holder performs the request and
/// reports back through [`Session::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub direction: Direction,
    pub cursor: Cursor,
}

/// Result of folding a completion into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The completion matched the outstanding fetch and was applied.
    Applied(SessionStatus),
    /// No fetch with that generation is outstanding; nothing changed.
    Stale,
}

#[derive(Debug, Clone)]
enum Phase {
    Ready,
    Loading(FetchTicket),
    Failed { ticket: FetchTicket, error: CatalogError },
}

/// One pagination run over a query.
///
/// Pages are append-only at the tail (forward) and prepend-only at the head
/// (backward); nothing fetched is ever reordered or dropped. At most one fetch
/// is outstanding at a time, in either direction.
#[derive(Debug, Clone)]
pub struct Session<T> {
    query: CatalogQuery,
    pages: VecDeque<Page<T>>,
    /// Where the next forward fetch starts.
    cursor: Cursor,
    /// Where the earliest held page was fetched from.
    head_cursor: Cursor,
    has_more: bool,
    phase: Phase,
    generation: u64,
}

impl<T> Session<T> {
    /// A fresh session at the start of the catalog.
    pub fn new(query: CatalogQuery) -> Self {
        Self::starting_at(query, Cursor::Start)
    }

    /// A fresh session whose first forward page starts at `cursor`.
    pub fn starting_at(query: CatalogQuery, cursor: Cursor) -> Self {
        Session {
            query,
            pages: VecDeque::new(),
            cursor,
            head_cursor: cursor,
            has_more: true,
            phase: Phase::Ready,
            generation: 0,
        }
    }

    pub fn query(&self) -> &CatalogQuery {
        &self.query
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Whether a backward fetch has anywhere to go.
    pub fn has_previous(&self) -> bool {
        self.head_cursor.back(self.query.per_page).is_some()
    }

    pub fn status(&self) -> SessionStatus {
        match &self.phase {
            Phase::Loading(ticket) => SessionStatus::Loading(ticket.direction),
            Phase::Failed { .. } => SessionStatus::Error,
            Phase::Ready if self.has_more => SessionStatus::Idle,
            Phase::Ready => SessionStatus::Exhausted,
        }
    }

    /// The error that put the session into `Error`, if it is there.
    pub fn last_error(&self) -> Option<&CatalogError> {
        match &self.phase {
            Phase::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page<T>> + '_ {
        self.pages.iter()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Every item across all pages, in listing order. Recomputed on each
    /// call; items repeated across pages are passed through as they are.
    pub fn flattened_items(&self) -> impl Iterator<Item = &T> + '_ {
        self.pages.iter().flat_map(|p| p.items.iter())
    }

    /// Request the next forward page.
    ///
    /// Returns `None` (a no-op) while a fetch is outstanding, after an error
    /// until `retry`, or once the catalog is exhausted.
    pub fn begin_forward(&mut self) -> Option<FetchTicket> {
        if !matches!(self.phase, Phase::Ready) || !self.has_more {
            return None;
        }
        Some(self.issue(Direction::Forward, self.cursor))
    }

    /// Request the page before the earliest one held.
    pub fn begin_backward(&mut self) -> Option<FetchTicket> {
        if !matches!(self.phase, Phase::Ready) {
            return None;
        }
        let cursor = self.head_cursor.back(self.query.per_page)?;
        Some(self.issue(Direction::Backward, cursor))
    }

    /// Re-issue the request that failed, in its original direction and at
    /// its original cursor. Only valid in `Error`.
    pub fn retry(&mut self) -> Option<FetchTicket> {
        let Phase::Failed { ticket, .. } = &self.phase else {
            return None;
        };
        let (direction, cursor) = (ticket.direction, ticket.cursor);
        Some(self.issue(direction, cursor))
    }

    /// Fold the outcome of a ticket back into the session.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<Page<T>, CatalogError>,
    ) -> Completion {
        let ticket = match &self.phase {
            Phase::Loading(ticket) if ticket.generation == generation => *ticket,
            _ => {
                debug!(
                    "Ignoring completion for generation {} (current {})",
                    generation, self.generation
                );
                return Completion::Stale;
            }
        };

        match result {
            Ok(page) => match ticket.direction {
                Direction::Forward => self.apply_forward(ticket, page),
                Direction::Backward => {
                    self.head_cursor = ticket.cursor;
                    self.pages.push_front(page);
                }
            },
            Err(error) => {
                warn!(
                    "Catalog fetch at cursor {} failed: {}; {} pages kept",
                    ticket.cursor,
                    error,
                    self.pages.len()
                );
                self.phase = Phase::Failed { ticket, error };
                return Completion::Applied(self.status());
            }
        }

        self.phase = Phase::Ready;
        Completion::Applied(self.status())
    }

    fn apply_forward(&mut self, ticket: FetchTicket, page: Page<T>) {
        match page.next_cursor.map(Cursor::At) {
            // A cursor that does not move would fetch the same page forever.
            Some(next) if next != ticket.cursor => {
                self.cursor = next;
                self.has_more = true;
            }
            _ => self.has_more = false,
        }
        self.pages.push_back(page);
    }

    fn issue(&mut self, direction: Direction, cursor: Cursor) -> FetchTicket {
        self.generation += 1;
        let ticket = FetchTicket {
            generation: self.generation,
            direction,
            cursor,
        };
        self.phase = Phase::Loading(ticket);
        ticket
    }
}
