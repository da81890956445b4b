// Application state and orchestration logic.
//
// The central event loop that owns the roster store and the pagination
// engine. Catalog fetches run on spawned tasks and only report back through
// the page event channel, so every mutation of roster or session state
// happens here, one message at a time.

use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use courtside_core::db::{Database, SnapshotStore};
use courtside_core::pagination::{Completion, PageEvent, PaginationEngine, SessionId, SessionStatus};
use courtside_core::{CatalogClient, CatalogQuery, Cursor, Player, RosterError, RosterStore};

use crate::config::{Config, SavePolicy};
use crate::protocol::{BrowserRow, BrowserView, UiUpdate, UserCommand, ViewportSignal};

/// Timer period used when the save policy has no interval. The tick branch
/// is disabled in that case; this only gives `interval()` a valid period.
const IDLE_FLUSH_PERIOD: Duration = Duration::from_secs(3600);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a user command was rejected.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("no open listing {0}")]
    UnknownSession(SessionId),

    #[error("player {player_id} is not loaded in {session}")]
    PlayerNotLoaded { session: SessionId, player_id: u64 },

    #[error("failed to save roster: {message}")]
    Save { message: String },
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// The complete application state.
pub struct AppState<C: CatalogClient<Item = Player>> {
    pub config: Config,
    pub roster: RosterStore,
    pub db: Database,
    pub engine: PaginationEngine<C>,
    /// The roster changed since the last successful save.
    pub dirty: bool,
}

impl<C> AppState<C>
where
    C: CatalogClient<Item = Player> + 'static,
{
    /// Create an AppState with an empty roster. Call `recover_from_db` to
    /// load the last saved one.
    pub fn new(config: Config, db: Database, engine: PaginationEngine<C>) -> Self {
        AppState {
            config,
            roster: RosterStore::new(),
            db,
            engine,
            dirty: false,
        }
    }

    /// Build a catalog query with the configured page size.
    pub fn query(&self, search: Option<String>) -> CatalogQuery {
        let query = CatalogQuery::new(self.config.catalog.per_page);
        match search {
            Some(s) if !s.trim().is_empty() => query.with_search(s.trim()),
            _ => query,
        }
    }

    /// Write the roster snapshot.
    pub fn save(&mut self) -> anyhow::Result<()> {
        self.db
            .save(&self.roster.snapshot())
            .context("failed to persist roster snapshot")?;
        self.dirty = false;
        Ok(())
    }

    /// Save if anything changed since the last save. Failures are logged and
    /// leave the state dirty so the next flush tries again.
    pub fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        match self.save() {
            Ok(()) => debug!("Flushed roster snapshot"),
            Err(e) => warn!("Roster flush failed: {:#}", e),
        }
    }

    fn roster_changed(&mut self) {
        self.dirty = true;
        if self.config.persistence.save_policy == SavePolicy::Immediate {
            self.flush();
        }
    }

    /// Render one listing, marking players that are already on a team.
    pub fn browser_view(&self, id: SessionId) -> Option<BrowserView> {
        let session = self.engine.session(id)?;
        let rows = session
            .flattened_items()
            .map(|player| BrowserRow {
                player: player.clone(),
                assigned_to: self.roster.assigned_team(player.id).cloned(),
            })
            .collect();
        Some(BrowserView {
            session: id,
            status: session.status(),
            rows,
            has_more: session.has_more(),
            has_previous: session.has_previous(),
            error: session.last_error().map(ToString::to_string),
        })
    }

    fn all_browser_views(&self) -> Vec<UiUpdate> {
        self.engine
            .session_ids()
            .into_iter()
            .filter_map(|id| self.browser_view(id))
            .map(|view| UiUpdate::Browser(Box::new(view)))
            .collect()
    }

    fn teams_update(&self) -> UiUpdate {
        UiUpdate::Teams(self.roster.list_teams().to_vec())
    }

    fn view_update(&self, id: SessionId) -> Result<UiUpdate, CommandError> {
        self.browser_view(id)
            .map(|view| UiUpdate::Browser(Box::new(view)))
            .ok_or(CommandError::UnknownSession(id))
    }

    /// Apply a command and return the updates it produces. `Quit` is a no-op
    /// here; the event loop handles it.
    pub fn apply_command(&mut self, cmd: UserCommand) -> Result<Vec<UiUpdate>, CommandError> {
        match cmd {
            UserCommand::ListTeams => Ok(vec![self.teams_update()]),
            UserCommand::CreateTeam {
                name,
                region,
                country,
            } => {
                self.roster.create_team(&name, region, country)?;
                self.roster_changed();
                Ok(vec![self.teams_update()])
            }
            UserCommand::UpdateTeam { id, update } => {
                self.roster.update_team(&id, update)?;
                self.roster_changed();
                Ok(vec![self.teams_update()])
            }
            UserCommand::DeleteTeam { id } => {
                self.roster.delete_team(&id)?;
                self.roster_changed();
                let mut updates = vec![self.teams_update()];
                updates.extend(self.all_browser_views());
                Ok(updates)
            }
            UserCommand::AddPlayer {
                team_id,
                session,
                player_id,
            } => {
                let player = self
                    .engine
                    .flattened_items(session)
                    .ok_or(CommandError::UnknownSession(session))?
                    .find(|p| p.id == player_id)
                    .cloned()
                    .ok_or(CommandError::PlayerNotLoaded { session, player_id })?;
                self.roster.add_player_to_team(&team_id, player)?;
                self.roster_changed();
                let mut updates = vec![self.teams_update()];
                updates.extend(self.all_browser_views());
                Ok(updates)
            }
            UserCommand::RemovePlayer { team_id, player_id } => {
                if self.roster.remove_player_from_team(&team_id, player_id)? {
                    self.roster_changed();
                }
                let mut updates = vec![self.teams_update()];
                updates.extend(self.all_browser_views());
                Ok(updates)
            }
            UserCommand::OpenBrowser { search, from } => {
                let query = self.query(search);
                let id = match from {
                    Some(cursor) => self.engine.start_at(query, Cursor::At(cursor)),
                    None => self.engine.start(query),
                };
                // A fresh listing is empty, so its bottom edge is in view.
                self.engine.advance(id);
                Ok(vec![UiUpdate::BrowserOpened { session: id }, self.view_update(id)?])
            }
            UserCommand::LoadOlder { session } => {
                if !self.engine.advance_backward(session) {
                    debug!("Older page not requested for {}", session);
                }
                Ok(vec![self.view_update(session)?])
            }
            UserCommand::Retry { session } => {
                if self.engine.retry(session) {
                    info!("Retrying failed fetch for {}", session);
                }
                Ok(vec![self.view_update(session)?])
            }
            UserCommand::CloseBrowser { session } => {
                if !self.engine.discard(session) {
                    return Err(CommandError::UnknownSession(session));
                }
                Ok(vec![UiUpdate::BrowserClosed { session }])
            }
            UserCommand::Save => {
                self.save().map_err(|e| CommandError::Save {
                    message: format!("{e:#}"),
                })?;
                Ok(vec![UiUpdate::Saved {
                    teams: self.roster.list_teams().len(),
                }])
            }
            UserCommand::Quit => Ok(vec![]),
        }
    }

    /// A listing's bottom edge came into view. Returns the refreshed view if
    /// a fetch was started.
    pub fn handle_viewport(&mut self, signal: ViewportSignal) -> Option<UiUpdate> {
        if !self.engine.advance(signal.session) {
            return None;
        }
        self.view_update(signal.session).ok()
    }

    /// Fold a finished fetch in. Stale results produce no update.
    pub fn handle_page_event(&mut self, event: PageEvent<Player>) -> Option<UiUpdate> {
        let session = event.session;
        match self.engine.handle_event(event) {
            Completion::Applied(status) => {
                if status == SessionStatus::Error {
                    if let Some(err) = self.engine.session(session).and_then(|s| s.last_error()) {
                        warn!("Fetch for {} failed: {}", session, err);
                    }
                }
                self.view_update(session).ok()
            }
            Completion::Stale => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop.
///
/// Listens on three channels using `tokio::select!`:
/// 1. Page events from catalog fetch tasks
/// 2. Viewport signals from the front end
/// 3. User commands from the front end
///
/// plus a flush timer when the save policy is `interval`. Pushes UI updates
/// through `ui_tx`. Returns after `Quit` or when the command channel closes,
/// saving any unsaved roster changes first.
pub async fn run<C>(
    mut page_rx: mpsc::Receiver<PageEvent<Player>>,
    mut viewport_rx: mpsc::Receiver<ViewportSignal>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState<C>,
) -> anyhow::Result<()>
where
    C: CatalogClient<Item = Player> + 'static,
{
    info!("Application event loop started");

    // Closed channels are switched off so tokio::select! never spins on them.
    let mut pages_open = true;
    let mut viewport_open = true;

    let flush_period = state.config.flush_interval();
    let mut flush_timer = tokio::time::interval(flush_period.unwrap_or(IDLE_FLUSH_PERIOD));
    // The first tick completes immediately; consume it so the first real
    // flush happens after one full interval.
    flush_timer.tick().await;

    loop {
        tokio::select! {
            // --- Catalog page results ---
            event = page_rx.recv(), if pages_open => {
                match event {
                    Some(event) => {
                        if let Some(update) = state.handle_page_event(event) {
                            let _ = ui_tx.send(update).await;
                        }
                    }
                    None => {
                        info!("Page event channel closed");
                        pages_open = false;
                    }
                }
            }

            // --- Viewport signals ---
            signal = viewport_rx.recv(), if viewport_open => {
                match signal {
                    Some(signal) => {
                        if let Some(update) = state.handle_viewport(signal) {
                            let _ = ui_tx.send(update).await;
                        }
                    }
                    None => {
                        info!("Viewport channel closed");
                        viewport_open = false;
                    }
                }
            }

            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        handle_user_command(&mut state, cmd, &ui_tx).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            // --- Batched roster saves ---
            _ = flush_timer.tick(), if flush_period.is_some() => {
                state.flush();
            }
        }
    }

    // Cleanup
    for id in state.engine.session_ids() {
        state.engine.discard(id);
    }
    state.flush();
    if state.dirty {
        warn!("Exiting with unsaved roster changes");
    }
    info!("Application event loop exiting");
    Ok(())
}

/// Handle a user command from the front end.
async fn handle_user_command<C>(
    state: &mut AppState<C>,
    cmd: UserCommand,
    ui_tx: &mpsc::Sender<UiUpdate>,
) where
    C: CatalogClient<Item = Player> + 'static,
{
    debug!("User command: {:?}", cmd);
    match state.apply_command(cmd) {
        Ok(updates) => {
            for update in updates {
                let _ = ui_tx.send(update).await;
            }
        }
        Err(e) => {
            info!("Command rejected: {}", e);
            let _ = ui_tx
                .send(UiUpdate::CommandFailed {
                    message: e.to_string(),
                })
                .await;
        }
    }
}

// ---------------------------------------------------------------------------
// Crash recovery
// ---------------------------------------------------------------------------

/// Restore the roster from the database after a restart.
///
/// Returns `Ok(false)` when nothing was saved yet. A saved snapshot that
/// fails validation is an error: starting empty would overwrite it on the
/// first save.
pub fn recover_from_db<C>(state: &mut AppState<C>) -> anyhow::Result<bool>
where
    C: CatalogClient<Item = Player> + 'static,
{
    let Some(snapshot) = state.db.load()? else {
        info!("No saved roster, starting fresh");
        return Ok(false);
    };

    let saved_at = snapshot.saved_at;
    state.roster = RosterStore::restore(snapshot).context("saved roster is inconsistent")?;
    state.dirty = false;
    info!(
        "Recovered {} teams saved at {}",
        state.roster.list_teams().len(),
        saved_at
    );
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
