use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use cropwise_features::{CropSample, FeatureError};
use cropwise_ml::Alternative;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::parse_body;
use crate::auth::AuthUser;
use crate::db::{NewPrediction, PredictionRepository};
use crate::error::{ApiError, FieldIssue};
use crate::state::{ModelSlot, SharedState};

/// Body of a successful prediction.
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Correlates with the stored record and logs.
    pub request_id: String,
    /// Most probable crop.
    pub predicted_crop: String,
    /// Its probability.
    pub confidence: f64,
    /// Runners-up.
    pub alternatives: Vec<Alternative>,
    /// Validated measurements.
    pub input_data: Map<String, Value>,
    /// Why the crop was chosen.
    pub reasons: Vec<String>,
    /// Server time.
    pub timestamp: DateTime<Utc>,
}

/// POST /api/v1/predict
///
/// The request id is issued before validation so rejected bodies carry it
/// too. Saving the record is best-effort: a database failure is logged and
/// the recommendation is still returned.
#[instrument(skip_all, fields(user_id = user.user_id()))]
pub async fn predict(
    State(state): State<SharedState>,
    user: AuthUser,
    body: Bytes,
) -> Result<Json<PredictionResponse>, Response> {
    let request_id = Uuid::new_v4().to_string();
    let outcome = recommend_and_record(&state, &user, &body, &request_id).await;
    outcome.map(Json).map_err(|e| e.into_response_with_id(request_id))
}

async fn recommend_and_record(
    state: &SharedState,
    user: &AuthUser,
    body: &Bytes,
    request_id: &str,
) -> Result<PredictionResponse, ApiError> {
    let predictor = match &state.model {
        ModelSlot::Ready(predictor) => Arc::clone(predictor),
        ModelSlot::Unavailable(startup_error) => {
            return Err(ApiError::ModelUnavailable {
                startup_error: startup_error.clone(),
            });
        }
    };

    let body: Value = parse_body(body)?;
    let sample = CropSample::from_json(&body).map_err(|e| match e {
        FeatureError::Validation { errors } => ApiError::Validation {
            details: errors.into_iter().map(FieldIssue::from).collect(),
        },
        FeatureError::NotAnObject => ApiError::InvalidJson,
        other => ApiError::internal(other),
    })?;

    let recommendation = tokio::task::spawn_blocking(move || predictor.recommend(&sample))
        .await?
        .map_err(ApiError::internal)?;

    let saved = PredictionRepository::insert(
        &state.pool,
        NewPrediction {
            user_id: Some(user.user_id()),
            request_id,
            sample: &sample,
            predicted_crop: &recommendation.predicted_crop,
            confidence: recommendation.confidence,
        },
    )
    .await;
    if let Err(e) = saved {
        warn!(%request_id, error = %e, "prediction not saved");
    }

    info!(
        %request_id,
        crop = %recommendation.predicted_crop,
        confidence = recommendation.confidence,
        "prediction served"
    );
    Ok(PredictionResponse {
        status: "success",
        request_id: request_id.to_string(),
        predicted_crop: recommendation.predicted_crop,
        confidence: recommendation.confidence,
        alternatives: recommendation.alternatives,
        input_data: sample.to_map(),
        reasons: recommendation.reasons,
        timestamp: Utc::now(),
    })
}
