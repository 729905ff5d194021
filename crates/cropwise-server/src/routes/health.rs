use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::SharedState;

/// Liveness and model status.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` when the process answers.
    pub status: &'static str,
    /// A model is being served.
    pub model_loaded: bool,
    /// Its scaler is loaded; artifacts load together.
    pub scaler_loaded: bool,
    /// Reasons come from the explainer.
    pub explainer_enabled: bool,
    /// Server time.
    pub timestamp: DateTime<Utc>,
}

/// GET /api/v1/health
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let loaded = state.model.predictor().is_some();
    Json(HealthResponse {
        status: "healthy",
        model_loaded: loaded,
        scaler_loaded: loaded,
        explainer_enabled: state.config.enable_explainer,
        timestamp: Utc::now(),
    })
}
