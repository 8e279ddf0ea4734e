use crate::error::{MailError, Result};

/// Check an address and return its domain part
pub fn validate_email(email: &str) -> Result<&str> {
    if email.is_empty() {
        return Err(MailError::InvalidEmail("Email is empty".to_string()));
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| MailError::InvalidEmail("Email must contain @".to_string()))?;

    if local.is_empty() || domain.is_empty() {
        return Err(MailError::InvalidEmail(
            "Email parts cannot be empty".to_string(),
        ));
    }

    if domain.contains('@') {
        return Err(MailError::InvalidEmail("Invalid email format".to_string()));
    }

    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(MailError::InvalidEmail(
            "Email contains whitespace or control characters".to_string(),
        ));
    }

    Ok(domain)
}

/// True if `email` belongs to one of `allowed` (case-insensitive).
/// An empty allow-list accepts every domain.
pub fn is_allowed_domain(email: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }

    match validate_email(email) {
        Ok(domain) => allowed
            .iter()
            .map(|d| d.trim())
            .any(|d| !d.is_empty() && d.eq_ignore_ascii_case(domain)),
        Err(_) => false,
    }
}
