//! Pre-flight validation of login input, before any auth service call.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;

// Requires a dotted TLD of at least two characters, so "a@b" is rejected.
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,})+$").expect("email pattern compiles")
});

/// Check login fields locally. Missing fields are reported before a
/// malformed address.
pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationError> {
    if email.is_empty() || password.is_empty() {
        return Err(ValidationError::MissingFields);
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(ValidationError::MalformedEmail);
    }
    Ok(())
}
