//! Request field validators.
//!
//! These run before any database or network work, so a malformed request
//! never leaves the process.

use crate::{Error, Result};

/// Reject empty or whitespace-only values for a required field.
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Minimal email shape check: one `@`, non-empty local part and domain,
/// no whitespace. Deliverability is the mail provider's problem.
pub fn validate_email(email: &str) -> Result<()> {
    require_non_empty("email", email)?;

    if email.chars().any(char::is_whitespace) {
        return Err(Error::Validation(
            "email must not contain whitespace".to_string(),
        ));
    }

    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(Error::Validation(format!(
            "'{}' is not a valid email address",
            email
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("name", "Jane").is_ok());
        assert!(require_non_empty("name", "").is_err());
        assert!(require_non_empty("name", "   ").is_err());
    }

    #[test]
    fn test_valid_emails() {
        for email in ["jane@example.com", "j.doe+legal@firm.co.uk", "a@b"] {
            assert!(validate_email(email).is_ok(), "{} should be valid", email);
        }
    }

    #[test]
    fn test_invalid_emails() {
        for email in ["", "jane", "@example.com", "jane@", "jane doe@example.com"] {
            assert!(validate_email(email).is_err(), "{} should be invalid", email);
        }
    }

    #[test]
    fn test_double_at_rejected() {
        assert!(validate_email("jane@doe@example.com").is_err());
    }
}
