// Line-oriented front end: turns typed commands into app messages and app
// updates into printable text.

use std::fmt::Write as _;

use thiserror::Error;

use courtside_core::pagination::{SessionId, SessionStatus};
use courtside_core::{Country, Region, RosterError, Team, TeamId, TeamUpdate};

use crate::protocol::{BrowserView, UiUpdate, UserCommand, ViewportSignal};

pub const HELP: &str = "\
commands:
  teams                                 list teams
  create <region> <country> <name...>   create a team
  rename <team> <name...>               rename a team
  region <team> <region>                change a team's region
  country <team> <country>              change a team's country
  delete <team>                         delete a team (its players are released)
  browse [search...]                    open a player listing
  browse-from <cursor> [search...]      open a listing mid-catalog
  more <listing>                        scroll to the bottom of a listing
  older <listing>                       load the page before the first one shown
  retry <listing>                       retry a failed page load
  close <listing>                       close a listing
  add <team> <listing> <player>         put a listed player on a team
  remove <team> <player>                take a player off a team
  save                                  save the roster now
  help                                  show this text
  quit                                  save and exit";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(UserCommand),
    Viewport(ViewportSignal),
    Help,
    Empty,
}

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("unknown command `{0}` (try `help`)")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("not a number: {0}")]
    BadNumber(String),

    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// Parse one line of input.
pub fn parse_line(line: &str) -> Result<Input, InputError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Input::Empty);
    };
    let args: Vec<&str> = words.collect();

    let cmd = match verb {
        "help" | "?" => return Ok(Input::Help),
        "quit" | "exit" => UserCommand::Quit,
        "teams" => UserCommand::ListTeams,
        "save" => UserCommand::Save,
        "create" => match args.as_slice() {
            [region, country, _, ..] => UserCommand::CreateTeam {
                name: rest_after(line, 3).to_string(),
                region: region.parse::<Region>()?,
                country: country.parse::<Country>()?,
            },
            _ => return Err(InputError::Usage("create <region> <country> <name...>")),
        },
        "rename" => match args.as_slice() {
            [team, _, ..] => UserCommand::UpdateTeam {
                id: TeamId::from(*team),
                update: TeamUpdate {
                    name: Some(rest_after(line, 2).to_string()),
                    ..TeamUpdate::default()
                },
            },
            _ => return Err(InputError::Usage("rename <team> <name...>")),
        },
        "region" => match args.as_slice() {
            [team, region] => UserCommand::UpdateTeam {
                id: TeamId::from(*team),
                update: TeamUpdate {
                    region: Some(region.parse()?),
                    ..TeamUpdate::default()
                },
            },
            _ => return Err(InputError::Usage("region <team> <region>")),
        },
        "country" => match args.as_slice() {
            [team, country] => UserCommand::UpdateTeam {
                id: TeamId::from(*team),
                update: TeamUpdate {
                    country: Some(country.parse()?),
                    ..TeamUpdate::default()
                },
            },
            _ => return Err(InputError::Usage("country <team> <country>")),
        },
        "delete" => match args.as_slice() {
            [team] => UserCommand::DeleteTeam {
                id: TeamId::from(*team),
            },
            _ => return Err(InputError::Usage("delete <team>")),
        },
        "browse" => UserCommand::OpenBrowser {
            search: search_words(&args),
            from: None,
        },
        "browse-from" => match args.as_slice() {
            [cursor, rest @ ..] => UserCommand::OpenBrowser {
                search: search_words(rest),
                from: Some(number(cursor)?),
            },
            _ => return Err(InputError::Usage("browse-from <cursor> [search...]")),
        },
        "more" => match args.as_slice() {
            [listing] => {
                return Ok(Input::Viewport(ViewportSignal {
                    session: session(listing)?,
                }))
            }
            _ => return Err(InputError::Usage("more <listing>")),
        },
        "older" => match args.as_slice() {
            [listing] => UserCommand::LoadOlder {
                session: session(listing)?,
            },
            _ => return Err(InputError::Usage("older <listing>")),
        },
        "retry" => match args.as_slice() {
            [listing] => UserCommand::Retry {
                session: session(listing)?,
            },
            _ => return Err(InputError::Usage("retry <listing>")),
        },
        "close" => match args.as_slice() {
            [listing] => UserCommand::CloseBrowser {
                session: session(listing)?,
            },
            _ => return Err(InputError::Usage("close <listing>")),
        },
        "add" => match args.as_slice() {
            [team, listing, player] => UserCommand::AddPlayer {
                team_id: TeamId::from(*team),
                session: session(listing)?,
                player_id: number(player)?,
            },
            _ => return Err(InputError::Usage("add <team> <listing> <player>")),
        },
        "remove" => match args.as_slice() {
            [team, player] => UserCommand::RemovePlayer {
                team_id: TeamId::from(*team),
                player_id: number(player)?,
            },
            _ => return Err(InputError::Usage("remove <team> <player>")),
        },
        other => return Err(InputError::UnknownCommand(other.to_string())),
    };
    Ok(Input::Command(cmd))
}

/// The raw remainder of `line` after its first `words` words, so names keep
/// their inner spacing. The verb counts as a word.
fn rest_after(line: &str, words: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..words {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest.trim_end()
}

fn search_words(words: &[&str]) -> Option<String> {
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn number(raw: &str) -> Result<u64, InputError> {
    raw.parse()
        .map_err(|_| InputError::BadNumber(raw.to_string()))
}

fn session(raw: &str) -> Result<SessionId, InputError> {
    raw.parse()
        .map_err(|_| InputError::BadNumber(raw.to_string()))
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render an update for the terminal.
pub fn render(update: &UiUpdate) -> String {
    match update {
        UiUpdate::Teams(teams) => render_teams(teams),
        UiUpdate::BrowserOpened { session } => format!("opened {session}"),
        UiUpdate::Browser(view) => render_browser(view),
        UiUpdate::BrowserClosed { session } => format!("closed {session}"),
        UiUpdate::Saved { teams } => format!("saved {teams} teams"),
        UiUpdate::CommandFailed { message } => format!("error: {message}"),
    }
}

fn render_teams(teams: &[Team]) -> String {
    if teams.is_empty() {
        return "no teams".to_string();
    }
    let mut out = String::new();
    for team in teams {
        let _ = writeln!(
            out,
            "{}  {}  [{} / {}]  {} players",
            team.id, team.name, team.region, team.country, team.player_count
        );
        for player in &team.players {
            let _ = writeln!(out, "    #{} {} ({})", player.id, player.full_name(), player.position);
        }
    }
    out.truncate(out.trim_end().len());
    out
}

fn render_browser(view: &BrowserView) -> String {
    let status = match view.status {
        SessionStatus::Idle => "idle",
        SessionStatus::Loading(_) => "loading",
        SessionStatus::Error => "error",
        SessionStatus::Exhausted => "end of catalog",
    };
    let mut out = format!("{} ({} players, {status})", view.session, view.rows.len());
    if view.has_previous {
        out.push_str("\n    ... older pages available");
    }
    for row in &view.rows {
        let marker = match &row.assigned_to {
            Some(team) => format!("  [on {team}]"),
            None => String::new(),
        };
        let _ = write!(
            out,
            "\n  #{} {} ({}, {}){marker}",
            row.player.id,
            row.player.full_name(),
            row.player.position,
            row.player.team.abbreviation
        );
    }
    if let Some(error) = &view.error {
        let _ = write!(out, "\n  ! {error} (use `retry {}`)", view.session);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::BrowserRow;
    use courtside_core::Player;

    fn command(line: &str) -> UserCommand {
        match parse_line(line) {
            Ok(Input::Command(cmd)) => cmd,
            other => panic!("expected a command for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn blank_line_is_empty() {
        assert_eq!(parse_line("   ").unwrap(), Input::Empty);
    }

    #[test]
    fn create_joins_multiword_name() {
        assert_eq!(
            command("create Europe UK Red Lions"),
            UserCommand::CreateTeam {
                name: "Red Lions".into(),
                region: Region::Europe,
                country: Country::Uk,
            }
        );
    }

    #[test]
    fn names_keep_inner_spacing() {
        assert_eq!(
            command("  create  Europe UK   Red   Lions  "),
            UserCommand::CreateTeam {
                name: "Red   Lions".into(),
                region: Region::Europe,
                country: Country::Uk,
            }
        );
        assert_eq!(
            command("rename\tteam_3 Night  Owls"),
            UserCommand::UpdateTeam {
                id: TeamId::from("team_3"),
                update: TeamUpdate {
                    name: Some("Night  Owls".into()),
                    ..TeamUpdate::default()
                },
            }
        );
    }

    #[test]
    fn create_rejects_unknown_region() {
        assert_eq!(
            parse_line("create Atlantis UK Lions").unwrap_err(),
            InputError::Roster(RosterError::InvalidRegion {
                value: "Atlantis".into()
            })
        );
    }

    #[test]
    fn create_without_name_is_usage_error() {
        assert!(matches!(
            parse_line("create Europe UK").unwrap_err(),
            InputError::Usage(_)
        ));
    }

    #[test]
    fn rename_builds_partial_update() {
        assert_eq!(
            command("rename team_3 Night Owls"),
            UserCommand::UpdateTeam {
                id: TeamId::from("team_3"),
                update: TeamUpdate {
                    name: Some("Night Owls".into()),
                    region: None,
                    country: None,
                },
            }
        );
    }

    #[test]
    fn more_is_a_viewport_signal() {
        let expected = ViewportSignal {
            session: "2".parse().unwrap(),
        };
        assert_eq!(parse_line("more 2").unwrap(), Input::Viewport(expected));
        assert_eq!(parse_line("more session#2").unwrap(), Input::Viewport(expected));
    }

    #[test]
    fn browse_from_takes_cursor_and_search() {
        assert_eq!(
            command("browse-from 40 le bron"),
            UserCommand::OpenBrowser {
                search: Some("le bron".into()),
                from: Some(40),
            }
        );
        assert_eq!(
            command("browse"),
            UserCommand::OpenBrowser {
                search: None,
                from: None,
            }
        );
    }

    #[test]
    fn add_parses_ids() {
        assert_eq!(
            command("add team_1 1 237"),
            UserCommand::AddPlayer {
                team_id: TeamId::from("team_1"),
                session: "1".parse().unwrap(),
                player_id: 237,
            }
        );
        assert_eq!(
            parse_line("add team_1 1 lebron").unwrap_err(),
            InputError::BadNumber("lebron".into())
        );
    }

    #[test]
    fn unknown_verb_is_reported() {
        assert_eq!(
            parse_line("dunk").unwrap_err(),
            InputError::UnknownCommand("dunk".into())
        );
    }

    #[test]
    fn render_marks_assigned_rows_and_errors() {
        let player: Player = serde_json::from_value(serde_json::json!({
            "id": 9,
            "first_name": "Nikola",
            "last_name": "Jokic",
            "position": "C",
            "team": {"id": 8, "name": "Nuggets", "abbreviation": "DEN"}
        }))
        .unwrap();
        let view = BrowserView {
            session: "1".parse().unwrap(),
            status: SessionStatus::Error,
            rows: vec![BrowserRow {
                player,
                assigned_to: Some(TeamId::from("team_2")),
            }],
            has_more: true,
            has_previous: false,
            error: Some("catalog returned HTTP 503".into()),
        };

        let text = render(&UiUpdate::Browser(Box::new(view)));
        assert!(text.starts_with("session#1 (1 players, error)"));
        assert!(text.contains("#9 Nikola Jokic (C, DEN)  [on team_2]"));
        assert!(text.contains("retry session#1"));
    }

    #[test]
    fn render_empty_team_list() {
        assert_eq!(render(&UiUpdate::Teams(vec![])), "no teams");
    }
}
