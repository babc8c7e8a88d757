//! HORSEDGE: race-board edge finder and tip tracker.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the SQLite store and serves the dashboard API until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use horsedge::config::AppConfig;
use horsedge::dashboard::{self, DashboardState};
use horsedge::storage::{SqliteStore, Store};

const BANNER: &str = r#"
 _   _  ___  ____  ____  _____ ____   ____ _____
| | | |/ _ \|  _ \/ ___|| ____|  _ \ / ___| ____|
| |_| | | | | |_) \___ \|  _| | | | | |  _|  _|
|  _  | |_| |  _ < ___) | |___| |_| | |_| | |___
|_| |_|\___/|_| \_\____/|_____|____/ \____|_____|

  Race-board edge finder & tip tracker
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load_default()?;

    init_logging();

    println!("{BANNER}");
    info!(
        database = %cfg.database.url,
        books = cfg.bookmakers.enabled.join(","),
        default_min_edge = cfg.edge.default_min_edge,
        settle_on_read = cfg.settlement.settle_on_read,
        "HORSEDGE starting up"
    );

    let store = SqliteStore::connect(&cfg.database.url, cfg.database.max_connections)
        .await
        .with_context(|| format!("Failed to open database {}", cfg.database.url))?;
    let store: Arc<dyn Store> = Arc::new(store);

    if !cfg.server.enabled {
        warn!("Dashboard disabled in config; nothing to serve.");
        return Ok(());
    }

    let addr = cfg.bind_addr();
    let state = Arc::new(DashboardState::new(store, cfg)?);
    dashboard::serve(state, &addr, shutdown_signal()).await?;

    info!("HORSEDGE shut down cleanly.");
    Ok(())
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("horsedge=info"));

    let json_logging = std::env::var("HORSEDGE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
