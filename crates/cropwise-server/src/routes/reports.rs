use axum::Json;
use axum::extract::State;
use cropwise_io::{ComparisonReport, DatasetReader, MaturityReport, ReportWriter};
use cropwise_ml::{MaturityOptions, compare_models, run_maturity_evaluation};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::SharedState;

/// Seed for reports computed on demand.
const REPORT_SEED: u64 = 42;

/// A report wrapped for the client.
#[derive(Debug, Serialize)]
pub struct ReportResponse<T> {
    /// Always `success`.
    pub status: &'static str,
    /// The report.
    pub data: T,
}

/// GET /api/v1/model-comparison
pub async fn model_comparison(
    State(state): State<SharedState>,
) -> Result<Json<ReportResponse<ComparisonReport>>, ApiError> {
    let writer = ReportWriter::new(&state.config.reports_dir);
    let dataset_path = state.config.dataset_path.clone();
    let report = tokio::task::spawn_blocking(move || -> Result<Option<ComparisonReport>, ApiError> {
        if let Some(report) = writer.read_comparison().map_err(ApiError::internal)? {
            return Ok(Some(report));
        }
        if !dataset_path.exists() {
            return Ok(None);
        }
        info!(dataset = %dataset_path.display(), "computing model comparison");
        let dataset = DatasetReader::new(&dataset_path).read().map_err(ApiError::internal)?;
        let report = compare_models(&dataset, REPORT_SEED).map_err(ApiError::internal)?;
        if let Err(e) = writer.write_comparison(&report) {
            warn!(error = %e, "comparison report not cached");
        }
        Ok(Some(report))
    })
    .await??
    .ok_or_else(|| ApiError::NotFound {
        message: "Model comparison results not found and dataset unavailable for training.".to_string(),
    })?;
    Ok(Json(ReportResponse {
        status: "success",
        data: report,
    }))
}

/// GET /api/v1/ml-maturity-report
///
/// A computed report is cached; the optimized model it trains is not served.
pub async fn maturity_report(
    State(state): State<SharedState>,
) -> Result<Json<ReportResponse<MaturityReport>>, ApiError> {
    let writer = ReportWriter::new(&state.config.reports_dir);
    let dataset_path = state.config.dataset_path.clone();
    let report = tokio::task::spawn_blocking(move || -> Result<Option<MaturityReport>, ApiError> {
        if let Some(report) = writer.read_maturity().map_err(ApiError::internal)? {
            return Ok(Some(report));
        }
        if !dataset_path.exists() {
            return Ok(None);
        }
        info!(dataset = %dataset_path.display(), "computing maturity report");
        let dataset = DatasetReader::new(&dataset_path).read().map_err(ApiError::internal)?;
        let options = MaturityOptions::default().with_seed(REPORT_SEED);
        let outcome = run_maturity_evaluation(&dataset, &options).map_err(ApiError::internal)?;
        if let Err(e) = writer.write_maturity(&outcome.report) {
            warn!(error = %e, "maturity report not cached");
        }
        Ok(Some(outcome.report))
    })
    .await??
    .ok_or_else(|| ApiError::NotFound {
        message: "ML maturity report not found and dataset unavailable for evaluation.".to_string(),
    })?;
    Ok(Json(ReportResponse {
        status: "success",
        data: report,
    }))
}
