// Message types exchanged between the front end and the app event loop.
//
// The front end never touches the roster store or the pagination engine
// directly: it sends `UserCommand`s and `ViewportSignal`s in and receives
// `UiUpdate`s back.

use courtside_core::pagination::{SessionId, SessionStatus};
use courtside_core::{Country, Player, Region, Team, TeamId, TeamUpdate};

// ---------------------------------------------------------------------------
// Front end -> app
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    /// Send the current team list.
    ListTeams,
    CreateTeam {
        name: String,
        region: Region,
        country: Country,
    },
    UpdateTeam {
        id: TeamId,
        update: TeamUpdate,
    },
    DeleteTeam {
        id: TeamId,
    },
    /// Add a player that is currently loaded in `session`'s listing.
    AddPlayer {
        team_id: TeamId,
        session: SessionId,
        player_id: u64,
    },
    RemovePlayer {
        team_id: TeamId,
        player_id: u64,
    },
    /// Open a player listing. `from` starts it mid-catalog so older pages
    /// can be loaded with `LoadOlder`.
    OpenBrowser {
        search: Option<String>,
        from: Option<u64>,
    },
    LoadOlder {
        session: SessionId,
    },
    Retry {
        session: SessionId,
    },
    CloseBrowser {
        session: SessionId,
    },
    /// Write the roster snapshot now, regardless of save policy.
    Save,
    Quit,
}

/// The bottom of a listing scrolled into view. Carries nothing but the
/// listing it belongs to; may arrive any number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSignal {
    pub session: SessionId,
}

// ---------------------------------------------------------------------------
// App -> front end
// ---------------------------------------------------------------------------

/// One row of a player listing.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserRow {
    pub player: Player,
    /// The team this player is on, if any. Rows with a team cannot be added.
    pub assigned_to: Option<TeamId>,
}

/// Everything a front end needs to render one listing.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserView {
    pub session: SessionId,
    pub status: SessionStatus,
    pub rows: Vec<BrowserRow>,
    pub has_more: bool,
    pub has_previous: bool,
    /// Message of the failure holding the session in error.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    /// Full team list, sent after every roster change and on `ListTeams`.
    Teams(Vec<Team>),
    BrowserOpened {
        session: SessionId,
    },
    Browser(Box<BrowserView>),
    BrowserClosed {
        session: SessionId,
    },
    Saved {
        teams: usize,
    },
    /// A command was rejected; nothing changed.
    CommandFailed {
        message: String,
    },
}
