// Error types shared by the roster store and the pagination engine.

use thiserror::Error;

use crate::team::TeamId;

/// Errors returned by roster store mutations.
///
/// Every variant is reported before any state is touched, so a failed call
/// leaves the store exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("team name `{name}` is already taken")]
    DuplicateName { name: String },

    #[error("team name must not be empty")]
    InvalidName,

    #[error("team not found: {id}")]
    TeamNotFound { id: TeamId },

    #[error("player {player_id} is already on team {team_id}")]
    PlayerAlreadyAssigned { player_id: u64, team_id: TeamId },

    #[error("unknown region: {value}")]
    InvalidRegion { value: String },

    #[error("unknown country: {value}")]
    InvalidCountry { value: String },

    #[error("snapshot is inconsistent: {message}")]
    CorruptSnapshot { message: String },
}

/// Failure talking to the external catalog service.
///
/// All variants are recoverable: the pagination engine keeps its pages and
/// cursor and waits for an explicit retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {message}")]
    Http { message: String },

    #[error("catalog returned HTTP {status}")]
    Status { status: u16 },

    #[error("catalog request timed out")]
    Timeout,

    #[error("malformed catalog response: {message}")]
    Malformed { message: String },
}
