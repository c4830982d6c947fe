//! Input validation utilities.
//!
//! Centralized validation helpers used across API routes.

use validator::{Validate, ValidationError};

use crate::error::BanterError;

/// Validate a request body, returning a BanterError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), BanterError> {
    body.validate().map_err(|e| BanterError::Validation {
        message: format_validation_errors(e),
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    let mut messages = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect::<Vec<_>>();
    messages.sort();
    messages.join("; ")
}

/// Passwords need at least one upper-case letter, one lower-case letter and one digit.
/// Length is checked separately with `#[validate(length(...))]`.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let upper = password.chars().any(|c| c.is_uppercase());
    let lower = password.chars().any(|c| c.is_lowercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());

    if upper && lower && digit {
        Ok(())
    } else {
        Err(ValidationError::new("password_strength").with_message(
            "Password must contain an upper-case letter, a lower-case letter, and a digit".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("Hunter22").is_ok());
        assert!(validate_password_strength("hunter22").is_err());
        assert!(validate_password_strength("HUNTER22").is_err());
        assert!(validate_password_strength("Hunterxx").is_err());
    }
}
