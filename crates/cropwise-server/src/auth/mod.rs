//! Password hashing, signed tokens and the bearer-token extractor.

mod extract;
mod password;
mod token;
mod validate;

pub use extract::AuthUser;
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenError, TokenKind, TokenService};
pub use validate::{normalize_email, validate_registration};
