//! HTTP handlers.

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod history;
pub mod index;
pub mod predict;
pub mod reports;
pub mod stats;

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ApiError;

/// Decode a JSON body, mapping any failure to [`ApiError::InvalidJson`].
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "request body rejected");
        ApiError::InvalidJson
    })
}
