//! Dashboard: Axum web server exposing the betting-edge API.
//!
//! Serves a JSON REST API over a shared store.
//! CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use routes::{AppState, DashboardState};

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve<F>(state: AppState, addr: &str, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard address {addr}"))?;
    info!(addr, "Dashboard server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Dashboard server error")
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/bookmakers", get(routes::list_bookmakers))
        // Race cards
        .route("/api/races", get(routes::list_races))
        .route("/api/tracks", get(routes::list_tracks))
        .route("/api/races/:id/board", get(routes::race_board))
        .route("/api/races/:id/results", post(routes::publish_results))
        .route("/api/race-signals", get(routes::race_signals))
        // Tips
        .route("/api/tips/daily", get(routes::daily_tips))
        .route("/api/tips/track", post(routes::track_tip))
        .route("/api/tips/tracked", get(routes::tracked_tips))
        .route("/api/tips/tracked/:id/update", post(routes::update_tip))
        .route("/api/tips/tracked/:id", delete(routes::delete_tip))
        .route("/api/tips/settle", post(routes::settle_tips))
        // User
        .route("/api/user/bets/:id/result", post(routes::correct_result))
        .route("/api/user/bets/analytics", get(routes::bet_analytics))
        .route(
            "/api/user/settings",
            get(routes::get_settings).post(routes::save_settings),
        )
        .route(
            "/api/user/profile",
            get(routes::get_profile).post(routes::update_profile),
        )
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
