use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::db::PredictionRepository;
use crate::error::ApiError;
use crate::state::SharedState;

/// Prediction counts.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Across all users.
    pub total_predictions: i64,
    /// Made by the caller.
    pub user_predictions: i64,
    /// Predictions per crop, across all users.
    pub crop_distribution: BTreeMap<String, i64>,
}

/// GET /api/v1/stats
pub async fn stats(State(state): State<SharedState>, user: AuthUser) -> Result<Json<StatsResponse>, ApiError> {
    let total_predictions = PredictionRepository::count(&state.pool).await?;
    let user_predictions = PredictionRepository::count_for_user(&state.pool, user.user_id()).await?;
    let crop_distribution = PredictionRepository::crop_distribution(&state.pool)
        .await?
        .into_iter()
        .map(|c| (c.predicted_crop, c.count))
        .collect();
    Ok(Json(StatsResponse {
        status: "success",
        total_predictions,
        user_predictions,
        crop_distribution,
    }))
}
