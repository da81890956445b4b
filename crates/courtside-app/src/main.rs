// Courtside entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open database, restore the saved roster
// 4. Build the catalog client and pagination engine
// 5. Spawn app logic task and the update printer
// 6. Read commands from stdin until `quit` or EOF
// 7. Cleanup on exit

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use courtside_app::app::{self, AppState};
use courtside_app::cli::{self, Input};
use courtside_app::config;
use courtside_app::protocol::UserCommand;
use courtside_catalog::BallDontLieClient;
use courtside_core::db::Database;
use courtside_core::pagination::PaginationEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    let log_path = init_tracing()?;
    info!("Courtside starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: catalog={}, per_page={}, save_policy={:?}",
        config.catalog.base_url, config.catalog.per_page, config.persistence.save_policy
    );

    // 3. Open database
    let db = Database::open(&config.database.path).context("failed to open database")?;
    info!("Database opened at {}", config.database.path);

    // 4. Catalog client and engine
    if config.credentials.catalog_api_key.is_none() {
        warn!(
            "No catalog API key configured (credentials.toml or {}); requests may be rejected",
            config::API_KEY_ENV
        );
    }
    let client = BallDontLieClient::new(
        config.catalog.base_url.clone(),
        config.credentials.catalog_api_key.clone(),
        config.catalog_timeout(),
    )
    .context("failed to build catalog client")?;

    let (page_tx, page_rx) = mpsc::channel(64);
    let (viewport_tx, viewport_rx) = mpsc::channel(64);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, mut ui_rx) = mpsc::channel(256);

    let engine = PaginationEngine::new(Arc::new(client), page_tx);
    let mut app_state = AppState::new(config, db, engine);

    match app::recover_from_db(&mut app_state) {
        Ok(true) => info!("Roster restored from previous session"),
        Ok(false) => info!("Starting with an empty roster"),
        Err(e) => {
            error!("Roster recovery failed: {:#}", e);
            return Err(e.context("roster recovery failed"));
        }
    }

    // 5. Spawn app logic task and the printer
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(page_rx, viewport_rx, cmd_rx, ui_tx, app_state).await {
            error!("Application loop error: {:#}", e);
        }
    });
    let printer = tokio::spawn(async move {
        while let Some(update) = ui_rx.recv().await {
            println!("{}", cli::render(&update));
        }
    });

    println!(
        "courtside ready (log: {}). Type `help` for commands.",
        log_path.display()
    );

    // 6. Command loop
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            let _ = cmd_tx.send(UserCommand::Quit).await;
            break;
        };
        match cli::parse_line(&line) {
            Ok(Input::Empty) => {}
            Ok(Input::Help) => println!("{}", cli::HELP),
            Ok(Input::Viewport(signal)) => {
                let _ = viewport_tx.send(signal).await;
            }
            Ok(Input::Command(UserCommand::Quit)) => {
                let _ = cmd_tx.send(UserCommand::Quit).await;
                break;
            }
            Ok(Input::Command(cmd)) => {
                if cmd_tx.send(cmd).await.is_err() {
                    warn!("App loop is gone; leaving command loop");
                    break;
                }
            }
            Err(e) => println!("error: {e}"),
        }
    }

    // 7. Cleanup: the app task saves pending roster changes before exiting
    let _ = tokio::time::timeout(Duration::from_secs(5), app_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;

    info!("Courtside shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which carries the
/// command prompt). Returns the log file path.
fn init_tracing() -> anyhow::Result<PathBuf> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = match directories::ProjectDirs::from("", "", "courtside") {
        Some(dirs) => dirs.data_local_dir().join("logs"),
        None => std::env::current_dir()?.join("logs"),
    };
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let log_path = log_dir.join("courtside.log");
    let log_file = std::fs::File::create(&log_path)?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("courtside=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(log_path)
}
