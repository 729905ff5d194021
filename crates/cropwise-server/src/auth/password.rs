use tracing::error;

/// Salt and hash `password` with bcrypt at `cost`.
///
/// # Errors
///
/// Returns the bcrypt error for an invalid cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// `true` when `password` matches `hash`; a malformed hash never matches.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or_else(|e| {
        error!(error = %e, "password hash could not be checked");
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("TestPassword123", 4).unwrap();
        assert_ne!(hash, "TestPassword123");
        assert!(verify_password("TestPassword123", &hash));
        assert!(!verify_password("WrongPassword", &hash));
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }
}
