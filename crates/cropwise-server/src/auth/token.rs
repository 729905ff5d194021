use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which of the two token lifetimes a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived, sent with API calls.
    Access,
    /// Long-lived, exchanged for new access tokens.
    Refresh,
}

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User row id.
    pub user_id: i64,
    /// User email at issue time.
    pub email: String,
    /// Access or refresh.
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Expires at, Unix seconds.
    pub exp: i64,
}

/// Token verification failures.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, malformed token or past expiry.
    #[error(transparent)]
    Invalid(#[from] jsonwebtoken::errors::Error),

    /// A valid token of the other kind.
    #[error("expected a {expected:?} token, got {found:?}")]
    WrongKind {
        /// Kind the caller required.
        expected: TokenKind,
        /// Kind in the token.
        found: TokenKind,
    },
}

/// Issues and verifies HS256 tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Sign with `secret`; lifetimes are in seconds.
    #[must_use]
    pub fn new(secret: &str, access_ttl: i64, refresh_ttl: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issue a token of `kind` for a user.
    ///
    /// # Errors
    ///
    /// Returns the signing error, which HS256 with an in-memory key does not produce in practice.
    pub fn issue(&self, user_id: i64, email: &str, kind: TokenKind) -> Result<String, TokenError> {
        let iat = Utc::now().timestamp();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            user_id,
            email: email.to_string(),
            kind,
            iat,
            exp: iat + ttl,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Check the signature, expiry and kind of `token`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TokenError::Invalid`] | malformed, badly signed or expired |
    /// | [`TokenError::WrongKind`] | valid but of the other kind |
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
        if claims.kind != expected {
            debug!(?expected, found = ?claims.kind, "token kind mismatch");
            return Err(TokenError::WrongKind {
                expected,
                found: claims.kind,
            });
        }
        Ok(claims)
    }
}
