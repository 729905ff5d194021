use crate::error::FieldIssue;

/// Trim and lowercase an email for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Check a registration form, returning every problem found.
///
/// # Errors
///
/// One [`FieldIssue`] per failing rule, in field order.
pub fn validate_registration(email: &str, username: &str, password: &str) -> Result<(), Vec<FieldIssue>> {
    let mut issues = Vec::new();
    if !is_email(email.trim()) {
        issues.push(FieldIssue::new("email", "Invalid email address"));
    }
    if let Err(message) = check_username(username) {
        issues.push(FieldIssue::new("username", message));
    }
    if let Err(message) = check_password(password) {
        issues.push(FieldIssue::new("password", message));
    }
    if issues.is_empty() { Ok(()) } else { Err(issues) }
}

fn is_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

fn check_username(username: &str) -> Result<(), &'static str> {
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err("Username must be between 3 and 50 characters");
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err("Username may only contain letters, digits, underscores and hyphens");
    }
    Ok(())
}

fn check_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long");
    }
    if !password.chars().any(char::is_uppercase) {
        return Err("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(char::is_lowercase) {
        return Err("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_form() {
        assert!(validate_registration("new.user@example.com", "new_user-1", "SecurePass123").is_ok());
        assert_eq!(normalize_email("  Test@Example.COM "), "test@example.com");
    }

    #[test]
    fn email_shapes() {
        for bad in ["not-an-email", "@example.com", "a@b", "a@@b.com", "a b@c.com", "a@.com", "a@b."] {
            assert!(!is_email(bad), "{bad} accepted");
        }
        assert!(is_email("a@b.co"));
    }

    #[test]
    fn username_rules() {
        assert!(check_username("ab").is_err());
        assert!(check_username(&"x".repeat(51)).is_err());
        assert!(check_username("test@user!").is_err());
        assert!(check_username("farmer_joe").is_ok());
    }

    #[test]
    fn password_rules_report_first_failure() {
        assert_eq!(check_password("weak"), Err("Password must be at least 8 characters long"));
        assert_eq!(check_password("alllowercase1"), Err("Password must contain at least one uppercase letter"));
        assert_eq!(check_password("ALLUPPERCASE1"), Err("Password must contain at least one lowercase letter"));
        assert_eq!(check_password("NoDigitsHere"), Err("Password must contain at least one digit"));
    }

    #[test]
    fn every_failing_field_listed() {
        let issues = validate_registration("bad", "x", "weak").unwrap_err();
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, ["email", "username", "password"]);
    }
}
