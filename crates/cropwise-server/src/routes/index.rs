use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::SharedState;

/// GET / - service banner and endpoint list.
pub async fn index(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "Crop Recommendation API is running",
        "environment": state.config.environment.as_str(),
        "endpoints": {
            "health": "/api/v1/health",
            "predict": "/api/v1/predict",
            "history": "/api/v1/history",
            "stats": "/api/v1/stats",
            "model_comparison": "/api/v1/model-comparison",
            "ml_maturity_report": "/api/v1/ml-maturity-report",
            "register": "/api/v1/auth/register",
            "login": "/api/v1/auth/login",
            "refresh": "/api/v1/auth/refresh",
            "me": "/api/v1/auth/me",
            "dashboard": "/dashboard",
        },
    }))
}
