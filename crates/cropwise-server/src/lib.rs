//! Authenticated HTTP API and dashboard for crop recommendations.
//!
//! [`AppState::initialize`] opens and migrates the SQLite database and loads
//! (or trains) the model; [`build_router`] wires the handlers; [`serve`] does
//! both and listens until Ctrl-C.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::{ConfigError, DEV_SECRET, Environment, ServeArgs, ServerConfig};
pub use error::{ApiError, FieldIssue, ServerError};
pub use state::{AppState, ModelSlot, SharedState};

/// Every route, with request tracing and permissive CORS.
pub fn build_router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/predict", post(routes::predict::predict))
        .route("/history", get(routes::history::history))
        .route("/stats", get(routes::stats::stats))
        .route("/model-comparison", get(routes::reports::model_comparison))
        .route("/ml-maturity-report", get(routes::reports::maturity_report))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh))
        .route("/auth/me", get(routes::auth::me));

    Router::new()
        .route("/", get(routes::index::index))
        .route("/dashboard", get(routes::dashboard::dashboard))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Initialize state and serve until Ctrl-C.
///
/// # Errors
///
/// Returns a [`ServerError`] if the database, the listener or the server fails.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::initialize(config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
