// Catalog player records. Read-only to this system; referenced by id.

use serde::{Deserialize, Serialize};

/// Catalog-side team affiliation carried on every player record.
///
/// This is the catalog's own (real-world) team, unrelated to the locally
/// managed teams in the roster store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTeam {
    pub id: u64,
    #[serde(default)]
    pub conference: String,
    #[serde(default)]
    pub division: String,
    #[serde(default)]
    pub city: String,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub abbreviation: String,
}

/// A player as returned by the catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Catalog-assigned id, globally unique and immutable.
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub jersey_number: Option<String>,
    #[serde(default)]
    pub college: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Draft fields are null for undrafted players.
    #[serde(default)]
    pub draft_year: Option<u16>,
    #[serde(default)]
    pub draft_round: Option<u8>,
    #[serde(default)]
    pub draft_number: Option<u16>,
    pub team: CatalogTeam,
}

impl Player {
    /// "First Last", as shown in pickers.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
