// Core of the courtside roster manager: the roster consistency store, the
// cursor pagination engine, the catalog contract they share, and SQLite
// persistence for roster snapshots.

pub mod catalog;
pub mod db;
pub mod error;
pub mod pagination;
pub mod player;
pub mod roster;
pub mod team;

pub use catalog::{CatalogClient, CatalogQuery, Cursor, Page};
pub use error::{CatalogError, RosterError};
pub use player::{CatalogTeam, Player};
pub use roster::{RosterSnapshot, RosterStore};
pub use team::{Country, Region, Team, TeamId, TeamUpdate};
