//! HTTP error responses and startup failures.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cropwise_features::{FieldError, FieldErrorKind};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, warn};
use uuid::Uuid;

/// One rejected request field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    /// Field name in the request body.
    pub field: String,
    /// Human-readable reason.
    pub message: String,
    /// Machine-readable reason, for measurement fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldErrorKind>,
}

impl FieldIssue {
    /// A problem with a non-measurement field.
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
            kind: None,
        }
    }
}

impl From<FieldError> for FieldIssue {
    fn from(e: FieldError) -> Self {
        Self {
            field: e.field,
            message: e.message,
            kind: Some(e.kind),
        }
    }
}

/// Everything a handler can fail with.
///
/// | Variant | Status | `error` |
/// |---|---|---|
/// | [`ApiError::Validation`] | 400 | `Validation Failed` |
/// | [`ApiError::InvalidJson`] | 400 | `Invalid JSON payload` |
/// | [`ApiError::AuthenticationRequired`] | 401 | `Authentication Required` |
/// | [`ApiError::InvalidToken`] | 401 | `Invalid Token` |
/// | [`ApiError::InvalidCredentials`] | 401 | `Invalid Credentials` |
/// | [`ApiError::InvalidRefreshToken`] | 401 | `Invalid Refresh Token` |
/// | [`ApiError::AccountDisabled`] | 403 | `Account Disabled` |
/// | [`ApiError::UserNotFound`] | 404 | `User Not Found` |
/// | [`ApiError::NotFound`] | 404 | `Not Found` |
/// | [`ApiError::EmailTaken`] | 409 | `Email Already Registered` |
/// | [`ApiError::UsernameTaken`] | 409 | `Username Already Taken` |
/// | [`ApiError::ModelUnavailable`] | 500 | `ML Integrity Check Failed` |
/// | [`ApiError::Internal`] | 500 | `Internal Server Error` |
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request fields failed validation.
    #[error("validation failed")]
    Validation {
        /// Every rejected field.
        details: Vec<FieldIssue>,
    },

    /// The body was not a JSON object.
    #[error("invalid JSON payload")]
    InvalidJson,

    /// No bearer token was supplied.
    #[error("authentication required")]
    AuthenticationRequired,

    /// The bearer token was malformed, expired or of the wrong type.
    #[error("invalid token")]
    InvalidToken,

    /// Unknown user or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The refresh token could not be used.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// The account exists but is inactive.
    #[error("account disabled")]
    AccountDisabled,

    /// The token names a user that no longer exists.
    #[error("user not found")]
    UserNotFound,

    /// A resource is unavailable.
    #[error("{message}")]
    NotFound {
        /// What is missing.
        message: String,
    },

    /// Registration with an email already in use.
    #[error("email already registered")]
    EmailTaken,

    /// Registration with a username already in use.
    #[error("username already taken")]
    UsernameTaken,

    /// The model failed to load at startup.
    #[error("model not initialized: {startup_error}")]
    ModelUnavailable {
        /// Why loading failed.
        startup_error: String,
    },

    /// Anything unexpected.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Wrap an unexpected error.
    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self::Internal(e.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::InvalidJson => StatusCode::BAD_REQUEST,
            Self::AuthenticationRequired
            | Self::InvalidToken
            | Self::InvalidCredentials
            | Self::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            Self::AccountDisabled => StatusCode::FORBIDDEN,
            Self::UserNotFound | Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::EmailTaken | Self::UsernameTaken => StatusCode::CONFLICT,
            Self::ModelUnavailable { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "Validation Failed",
            Self::InvalidJson => "Invalid JSON payload",
            Self::AuthenticationRequired => "Authentication Required",
            Self::InvalidToken => "Invalid Token",
            Self::InvalidCredentials => "Invalid Credentials",
            Self::InvalidRefreshToken => "Invalid Refresh Token",
            Self::AccountDisabled => "Account Disabled",
            Self::UserNotFound => "User Not Found",
            Self::NotFound { .. } => "Not Found",
            Self::EmailTaken => "Email Already Registered",
            Self::UsernameTaken => "Username Already Taken",
            Self::ModelUnavailable { .. } => "ML Integrity Check Failed",
            Self::Internal(_) => "Internal Server Error",
        }
    }

    fn body(&self) -> Value {
        let mut body = json!({ "status": "error", "error": self.title() });
        let fields = match self {
            Self::Validation { details } => json!({ "details": details }),
            Self::InvalidJson => json!({ "message": "Request body must be a JSON object of measurements." }),
            Self::AuthenticationRequired => {
                json!({ "message": "No token provided. Please include Authorization header." })
            }
            Self::InvalidToken => json!({ "message": "Token is invalid or expired. Please login again." }),
            Self::InvalidCredentials => json!({ "message": "Email/username or password is incorrect." }),
            Self::InvalidRefreshToken => {
                json!({ "message": "Refresh token is invalid or expired. Please login again." })
            }
            Self::AccountDisabled => json!({ "message": "This account has been disabled." }),
            Self::UserNotFound => json!({ "message": "The account for this token no longer exists." }),
            Self::NotFound { message } => json!({ "message": message }),
            Self::EmailTaken => json!({ "message": "An account with this email already exists." }),
            Self::UsernameTaken => json!({ "message": "This username is already in use." }),
            Self::ModelUnavailable { startup_error } => {
                json!({ "details": format!("Model not initialized. Startup error: {startup_error}") })
            }
            Self::Internal(detail) => json!({ "details": detail }),
        };
        if let (Value::Object(target), Value::Object(extra)) = (&mut body, fields) {
            target.extend(extra);
        }
        body
    }
}

impl ApiError {
    /// Respond with a correlation id the handler already issued.
    pub fn into_response_with_id(self, request_id: String) -> Response {
        self.render(Some(request_id))
    }

    fn render(self, request_id: Option<String>) -> Response {
        let status = self.status();
        let mut body = self.body();
        if status.is_server_error() {
            let request_id = request_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            error!(%request_id, error = %self, "request failed");
            body["request_id"] = Value::String(request_id);
        } else {
            warn!(status = status.as_u16(), request_id = request_id.as_deref(), error = %self, "request rejected");
            if let Some(request_id) = request_id {
                body["request_id"] = Value::String(request_id);
            }
        }
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.render(None)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::internal(e)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal(e)
    }
}

/// Reasons the server could not start.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Opening the database failed.
    #[error("cannot open database {url}")]
    Database {
        /// Connection URL.
        url: String,
        /// Underlying failure.
        #[source]
        source: sqlx::Error,
    },

    /// The database directory could not be created.
    #[error("cannot create database directory {path}")]
    DatabaseDir {
        /// Directory.
        path: std::path::PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// Applying migrations failed.
    #[error("database migration failed")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Binding the listener failed.
    #[error("cannot bind {addr}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("server error")]
    Serve(#[source] std::io::Error),

    /// A blocking startup task panicked.
    #[error("startup task failed")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_and_titles() {
        assert_eq!(ApiError::InvalidJson.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::AccountDisabled.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::EmailTaken.title(), "Email Already Registered");
        let unavailable = ApiError::ModelUnavailable {
            startup_error: "missing dataset".into(),
        };
        assert_eq!(unavailable.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            unavailable.body()["details"],
            "Model not initialized. Startup error: missing dataset"
        );
    }

    #[test]
    fn validation_body_lists_fields() {
        let err = ApiError::Validation {
            details: vec![FieldIssue::new("username", "too short")],
        };
        let body = err.body();
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Validation Failed");
        assert_eq!(body["details"][0]["field"], "username");
        assert!(body["details"][0].get("kind").is_none());
    }

    #[tokio::test]
    async fn issued_request_id_reaches_client_errors() {
        use http_body_util::BodyExt;

        let response = ApiError::InvalidJson.into_response_with_id("req-1".into());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["request_id"], "req-1");

        let plain = ApiError::InvalidJson.into_response();
        let bytes = plain.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body.get("request_id").is_none());
    }
}
