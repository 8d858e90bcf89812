use crate::error::{IdentityError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Input validation utilities for identity service

// Patterns are literals; a failure here is a source bug, not a runtime condition
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("hardcoded email regex is invalid - fix source code")
});

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]{3,32}$")
        .expect("hardcoded username regex is invalid - fix source code")
});

/// Validate email format (RFC 5322 simplified)
pub fn validate_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Validate username format (3-32 characters, alphanumeric with - and _)
pub fn validate_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}

/// Canonical form used for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Check registration input, returning the normalized email
pub fn validate_registration(username: &str, email: &str) -> Result<String> {
    if !validate_username(username) {
        return Err(IdentityError::Validation(
            "Username must be 3-32 characters of letters, digits, '-' or '_'".to_string(),
        ));
    }

    let email = normalize_email(email);
    if !validate_email(&email) {
        return Err(IdentityError::Validation("Invalid email address".to_string()));
    }

    Ok(email)
}
