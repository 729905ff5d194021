use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::parse_body;
use crate::auth::{
    AuthUser, TokenKind, hash_password, normalize_email, validate_registration, verify_password,
};
use crate::db::{NewUser, User, UserRepository};
use crate::error::{ApiError, FieldIssue};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// `email` may hold either the email or the username.
#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: Option<String>,
    username: Option<String>,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    #[serde(default)]
    refresh_token: String,
}

/// A user with a fresh token pair.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Human-readable outcome.
    pub message: &'static str,
    /// The account.
    pub user: User,
    /// Short-lived token.
    pub access_token: String,
    /// Long-lived token.
    pub refresh_token: String,
}

/// A new access token.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// Always `success`.
    pub status: &'static str,
    /// Short-lived token.
    pub access_token: String,
}

/// The caller's account.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    /// Always `success`.
    pub status: &'static str,
    /// The account.
    pub user: User,
}

fn session(state: &SharedState, user: User, message: &'static str) -> Result<SessionResponse, ApiError> {
    let access_token = state
        .tokens
        .issue(user.id, &user.email, TokenKind::Access)
        .map_err(ApiError::internal)?;
    let refresh_token = state
        .tokens
        .issue(user.id, &user.email, TokenKind::Refresh)
        .map_err(ApiError::internal)?;
    Ok(SessionResponse {
        status: "success",
        message,
        user,
        access_token,
        refresh_token,
    })
}

/// POST /api/v1/auth/register
#[instrument(skip_all)]
pub async fn register(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let request: RegisterRequest = parse_body(&body)?;
    validate_registration(&request.email, &request.username, &request.password)
        .map_err(|details| ApiError::Validation { details })?;

    let email = normalize_email(&request.email);
    let username = request.username.trim().to_string();
    if UserRepository::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(ApiError::EmailTaken);
    }
    if UserRepository::find_by_username(&state.pool, &username).await?.is_some() {
        return Err(ApiError::UsernameTaken);
    }

    let cost = state.config.bcrypt_cost;
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await?
        .map_err(ApiError::internal)?;

    let created = UserRepository::create(
        &state.pool,
        NewUser {
            email: &email,
            username: &username,
            password_hash: &password_hash,
        },
    )
    .await;
    let user = match created {
        Ok(user) => user,
        // A concurrent registration won the race past the lookups above.
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Err(if db.message().contains("email") {
                ApiError::EmailTaken
            } else {
                ApiError::UsernameTaken
            });
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(session(&state, user, "User registered successfully")?),
    ))
}

/// POST /api/v1/auth/login
#[instrument(skip_all)]
pub async fn login(State(state): State<SharedState>, body: Bytes) -> Result<Json<SessionResponse>, ApiError> {
    let request: LoginRequest = parse_body(&body)?;
    let non_blank = |value: Option<String>| value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let identifier = non_blank(request.email)
        .or_else(|| non_blank(request.username))
        .unwrap_or_default();
    let mut missing = Vec::new();
    if identifier.is_empty() {
        missing.push(FieldIssue::new("email", "Email or username is required"));
    }
    if request.password.is_empty() {
        missing.push(FieldIssue::new("password", "Password is required"));
    }
    if !missing.is_empty() {
        return Err(ApiError::Validation { details: missing });
    }

    let user = UserRepository::find_by_login(&state.pool, &identifier)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    let password = request.password;
    let hash = user.password_hash.clone();
    if !tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await? {
        return Err(ApiError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(ApiError::AccountDisabled);
    }

    let user = UserRepository::touch_last_login(&state.pool, user.id).await?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(session(&state, user, "Login successful")?))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(State(state): State<SharedState>, body: Bytes) -> Result<Json<RefreshResponse>, ApiError> {
    let request: RefreshRequest = parse_body(&body)?;
    let claims = state
        .tokens
        .verify(&request.refresh_token, TokenKind::Refresh)
        .map_err(|_| ApiError::InvalidRefreshToken)?;
    let user = UserRepository::find_by_id(&state.pool, claims.user_id)
        .await?
        .ok_or(ApiError::InvalidRefreshToken)?;
    if !user.is_active {
        return Err(ApiError::AccountDisabled);
    }
    let access_token = state
        .tokens
        .issue(user.id, &user.email, TokenKind::Access)
        .map_err(ApiError::internal)?;
    Ok(Json(RefreshResponse {
        status: "success",
        access_token,
    }))
}

/// GET /api/v1/auth/me
pub async fn me(State(state): State<SharedState>, user: AuthUser) -> Result<Json<MeResponse>, ApiError> {
    let user = UserRepository::find_by_id(&state.pool, user.user_id())
        .await?
        .ok_or(ApiError::UserNotFound)?;
    Ok(Json(MeResponse {
        status: "success",
        user,
    }))
}
