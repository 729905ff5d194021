use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::AuthUser;
use crate::db::{PredictionRecord, PredictionRepository};
use crate::error::ApiError;
use crate::state::SharedState;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

/// `?limit=N`; anything unparseable falls back to the default.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    limit: Option<String>,
}

impl HistoryQuery {
    fn limit(&self) -> i64 {
        self.limit
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT)
    }
}

/// One past prediction.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    /// Row id.
    pub id: i64,
    /// Request correlation id.
    pub request_id: String,
    /// Recommended crop.
    pub predicted_crop: String,
    /// Its probability.
    pub confidence: f64,
    /// When it was made.
    pub created_at: DateTime<Utc>,
    /// The measurements.
    pub input: Map<String, Value>,
}

impl From<PredictionRecord> for HistoryEntry {
    fn from(record: PredictionRecord) -> Self {
        Self {
            input: record.sample().to_map(),
            id: record.id,
            request_id: record.request_id,
            predicted_crop: record.predicted_crop,
            confidence: record.confidence,
            created_at: record.created_at,
        }
    }
}

/// Recent predictions of the caller.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Entries returned.
    pub count: usize,
    /// Newest first.
    pub data: Vec<HistoryEntry>,
}

/// GET /api/v1/history
pub async fn history(
    State(state): State<SharedState>,
    user: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let records = PredictionRepository::recent_for_user(&state.pool, user.user_id(), query.limit()).await?;
    let data: Vec<HistoryEntry> = records.into_iter().map(HistoryEntry::from).collect();
    Ok(Json(HistoryResponse {
        status: "success",
        count: data.len(),
        data,
    }))
}
