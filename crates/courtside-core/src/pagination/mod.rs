// Cursor pagination: per-session state machine plus the async driver that
// runs its fetches.

pub mod engine;
pub mod session;

pub use engine::{PageEvent, PaginationEngine, SessionId};
pub use session::{Completion, Direction, FetchTicket, Session, SessionStatus};
