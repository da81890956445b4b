// Roster store: teams, their rosters, and the single-team membership rule.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::RosterError;
use crate::player::Player;
use crate::team::{Country, Region, Team, TeamId, TeamUpdate};

/// Serialized form of the store handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    /// Teams in insertion order.
    pub teams: Vec<Team>,
    /// Sequence number the next created team will use.
    pub next_team_seq: u64,
    pub saved_at: DateTime<Utc>,
}

/// Owns every team and all player membership.
///
/// Invariants held after every public call:
/// - each team's `player_count` equals its roster length;
/// - a player id is on at most one roster;
/// - team names are unique (exact, case-sensitive match);
/// - team ids are never handed out twice, even after deletion.
///
/// Mutations are synchronous and validated up front; a call that returns
/// `Err` has not changed anything.
#[derive(Debug, Clone)]
pub struct RosterStore {
    teams: Vec<Team>,
    next_team_seq: u64,
}

impl Default for RosterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterStore {
    pub fn new() -> Self {
        RosterStore {
            teams: Vec::new(),
            next_team_seq: 1,
        }
    }

    /// Create a team with an empty roster.
    ///
    /// The name is trimmed; an empty result is `InvalidName`, and a name
    /// already used by another team is `DuplicateName`.
    pub fn create_team(
        &mut self,
        name: &str,
        region: Region,
        country: Country,
    ) -> Result<Team, RosterError> {
        let name = validate_name(name)?;
        if self.teams.iter().any(|t| t.name == name) {
            return Err(RosterError::DuplicateName { name });
        }

        let id = TeamId::from_seq(self.next_team_seq);
        self.next_team_seq += 1;

        let team = Team::new(id, name, region, country);
        info!("Created team '{}' ({}, {}/{})", team.name, team.id, region, country);
        self.teams.push(team.clone());
        Ok(team)
    }

    /// Apply a partial update to a team's descriptive fields.
    ///
    /// A new name is checked against every *other* team, so re-saving a team
    /// under its current name is fine.
    pub fn update_team(&mut self, id: &TeamId, update: TeamUpdate) -> Result<(), RosterError> {
        let idx = self.index_of(id)?;

        let new_name = match update.name.as_deref() {
            Some(raw) => {
                let name = validate_name(raw)?;
                let taken = self
                    .teams
                    .iter()
                    .any(|t| t.id != *id && t.name == name);
                if taken {
                    return Err(RosterError::DuplicateName { name });
                }
                Some(name)
            }
            None => None,
        };

        let team = &mut self.teams[idx];
        if let Some(name) = new_name {
            if team.name != name {
                info!("Renamed team {} from '{}' to '{}'", team.id, team.name, name);
            }
            team.name = name;
        }
        if let Some(region) = update.region {
            team.region = region;
        }
        if let Some(country) = update.country {
            team.country = country;
        }
        Ok(())
    }

    /// Remove a team. Its players become unassigned and may join any team.
    pub fn delete_team(&mut self, id: &TeamId) -> Result<Team, RosterError> {
        let idx = self.index_of(id)?;
        let team = self.teams.remove(idx);
        info!(
            "Deleted team '{}' ({}), released {} players",
            team.name,
            team.id,
            team.players.len()
        );
        Ok(team)
    }

    /// Append a player to a team's roster.
    ///
    /// Fails if the player is on any roster already, including this one.
    pub fn add_player_to_team(&mut self, team_id: &TeamId, player: Player) -> Result<(), RosterError> {
        let idx = self.index_of(team_id)?;
        if let Some(holder) = self.assigned_team(player.id) {
            return Err(RosterError::PlayerAlreadyAssigned {
                player_id: player.id,
                team_id: holder.clone(),
            });
        }

        let team = &mut self.teams[idx];
        debug!("Adding player {} ({}) to {}", player.id, player.full_name(), team.id);
        team.players.push(player);
        team.sync_player_count();
        Ok(())
    }

    /// Remove a player from a team's roster.
    ///
    /// Returns whether the player was on the roster; an absent player is not
    /// an error.
    pub fn remove_player_from_team(
        &mut self,
        team_id: &TeamId,
        player_id: u64,
    ) -> Result<bool, RosterError> {
        let idx = self.index_of(team_id)?;
        let team = &mut self.teams[idx];
        let before = team.players.len();
        team.players.retain(|p| p.id != player_id);
        team.sync_player_count();

        let removed = team.players.len() != before;
        if removed {
            debug!("Removed player {} from {}", player_id, team.id);
        }
        Ok(removed)
    }

    /// All teams in creation order.
    pub fn list_teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn team(&self, id: &TeamId) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == *id)
    }

    /// The team currently holding `player_id`, if any.
    pub fn assigned_team(&self, player_id: u64) -> Option<&TeamId> {
        self.teams
            .iter()
            .find(|t| t.has_player(player_id))
            .map(|t| &t.id)
    }

    /// Filter a catalog listing down to players not on any roster, keeping
    /// the listing's order.
    pub fn available_players<'a, I>(&self, players: I) -> Vec<&'a Player>
    where
        I: IntoIterator<Item = &'a Player>,
    {
        let assigned: HashSet<u64> = self
            .teams
            .iter()
            .flat_map(|t| t.players.iter().map(|p| p.id))
            .collect();
        players
            .into_iter()
            .filter(|p| !assigned.contains(&p.id))
            .collect()
    }

    /// Capture the store for persistence.
    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            teams: self.teams.clone(),
            next_team_seq: self.next_team_seq,
            saved_at: Utc::now(),
        }
    }

    /// Rebuild a store from a persisted snapshot.
    ///
    /// Rejects snapshots that break name uniqueness, id uniqueness or
    /// single-team membership. A stored player count that disagrees with its
    /// roster is corrected and logged.
    pub fn restore(snapshot: RosterSnapshot) -> Result<Self, RosterError> {
        let max_seq = check_snapshot(&snapshot.teams)?;

        let mut teams = snapshot.teams;
        for team in &mut teams {
            if team.player_count != team.players.len() {
                warn!(
                    "Team {} stored player_count {} but has {} players; reconciling",
                    team.id,
                    team.player_count,
                    team.players.len()
                );
                team.sync_player_count();
            }
        }

        // Never fall behind an id that is already in use, and keep room to
        // hand out the next one.
        let next_team_seq = max_seq
            .checked_add(1)
            .map(|floor| snapshot.next_team_seq.max(floor))
            .filter(|seq| *seq < u64::MAX)
            .ok_or_else(|| RosterError::CorruptSnapshot {
                message: "team id sequence is exhausted".into(),
            })?;

        info!("Restored {} teams from snapshot", teams.len());
        Ok(RosterStore {
            teams,
            next_team_seq,
        })
    }

    fn index_of(&self, id: &TeamId) -> Result<usize, RosterError> {
        self.teams
            .iter()
            .position(|t| t.id == *id)
            .ok_or_else(|| RosterError::TeamNotFound { id: id.clone() })
    }
}

/// Verify a persisted team list against the store invariants. Returns the
/// highest id sequence number in use.
fn check_snapshot(teams: &[Team]) -> Result<u64, RosterError> {
    let mut names: HashSet<&str> = HashSet::new();
    let mut ids: HashSet<&TeamId> = HashSet::new();
    let mut members: HashMap<u64, &TeamId> = HashMap::new();
    let mut max_seq = 0;

    for team in teams {
        if validate_name(&team.name).is_err() {
            return Err(RosterError::CorruptSnapshot {
                message: format!("team {} has an empty name", team.id),
            });
        }
        if !names.insert(team.name.as_str()) {
            return Err(RosterError::CorruptSnapshot {
                message: format!("duplicate team name '{}'", team.name),
            });
        }
        if !ids.insert(&team.id) {
            return Err(RosterError::CorruptSnapshot {
                message: format!("duplicate team id {}", team.id),
            });
        }
        for player in &team.players {
            if let Some(other) = members.insert(player.id, &team.id) {
                return Err(RosterError::CorruptSnapshot {
                    message: format!(
                        "player {} is on both {} and {}",
                        player.id, other, team.id
                    ),
                });
            }
        }
        max_seq = max_seq.max(team.id.seq().unwrap_or(0));
    }
    Ok(max_seq)
}

fn validate_name(raw: &str) -> Result<String, RosterError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RosterError::InvalidName);
    }
    Ok(name.to_string())
}
