//! Field-format checks for signup and profile updates.

use regex::Regex;
use std::sync::OnceLock;

/// A rejected input field. `field` names the offending form field so the
/// frontend can send the user back to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        FieldError {
            field,
            message: message.into(),
        }
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
            .expect("email regex compiles")
    })
}

fn mobile_regex() -> &'static Regex {
    static MOBILE_REGEX: OnceLock<Regex> = OnceLock::new();
    MOBILE_REGEX.get_or_init(|| Regex::new(r"^\+?\d{7,15}$").expect("mobile regex compiles"))
}

pub fn validate_name(field: &'static str, value: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError::new(field, "must not be empty"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), FieldError> {
    if email.is_empty() {
        return Err(FieldError::new("email", "must not be empty"));
    }
    if !email_regex().is_match(email) {
        return Err(FieldError::new("email", "must look like name@domain.tld"));
    }
    Ok(())
}

pub fn validate_mobile(mobile: &str) -> Result<(), FieldError> {
    if !mobile_regex().is_match(mobile) {
        return Err(FieldError::new(
            "mobile",
            "must be 7-15 digits, optionally prefixed with +",
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), FieldError> {
    if password.len() < 6 {
        return Err(FieldError::new(
            "password",
            "must be at least 6 characters",
        ));
    }
    Ok(())
}
