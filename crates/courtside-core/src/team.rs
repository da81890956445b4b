// Team entity and its fixed enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RosterError;
use crate::player::Player;

/// Locally generated team identifier (e.g., "team_3").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(String);

impl TeamId {
    /// Build the id for the `seq`-th team ever created in a store.
    pub(crate) fn from_seq(seq: u64) -> Self {
        TeamId(format!("team_{seq}"))
    }

    /// The sequence number encoded in a store-generated id, if any.
    pub(crate) fn seq(&self) -> Option<u64> {
        self.0.strip_prefix("team_")?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TeamId {
    fn from(s: &str) -> Self {
        TeamId(s.to_string())
    }
}

impl From<String> for TeamId {
    fn from(s: String) -> Self {
        TeamId(s)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Region a team plays in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Americas,
    Europe,
    Asia,
    Africa,
    Oceania,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Americas,
        Region::Europe,
        Region::Asia,
        Region::Africa,
        Region::Oceania,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Americas => "Americas",
            Region::Europe => "Europe",
            Region::Asia => "Asia",
            Region::Africa => "Africa",
            Region::Oceania => "Oceania",
        }
    }
}

impl FromStr for Region {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| RosterError::InvalidRegion {
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Country a team is registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Country {
    #[serde(rename = "USA")]
    Usa,
    #[serde(rename = "UK")]
    Uk,
    Canada,
    Germany,
    Japan,
    Brazil,
}

impl Country {
    pub const ALL: [Country; 6] = [
        Country::Usa,
        Country::Uk,
        Country::Canada,
        Country::Germany,
        Country::Japan,
        Country::Brazil,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Country::Usa => "USA",
            Country::Uk => "UK",
            Country::Canada => "Canada",
            Country::Germany => "Germany",
            Country::Japan => "Japan",
            Country::Brazil => "Brazil",
        }
    }
}

impl FromStr for Country {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Country::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| RosterError::InvalidCountry {
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locally managed team and its roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub region: Region,
    pub country: Country,
    /// Players in the order they were added.
    pub players: Vec<Player>,
    /// Always `players.len()`; kept as a field so snapshots carry it.
    pub player_count: usize,
}

impl Team {
    pub(crate) fn new(id: TeamId, name: String, region: Region, country: Country) -> Self {
        Team {
            id,
            name,
            region,
            country,
            players: Vec::new(),
            player_count: 0,
        }
    }

    pub fn has_player(&self, player_id: u64) -> bool {
        self.players.iter().any(|p| p.id == player_id)
    }

    pub(crate) fn sync_player_count(&mut self) {
        self.player_count = self.players.len();
    }
}

/// Partial update for `RosterStore::update_team`. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamUpdate {
    pub name: Option<String>,
    pub region: Option<Region>,
    pub country: Option<Country>,
}
