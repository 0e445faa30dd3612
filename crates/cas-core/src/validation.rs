//! Custom field validators shared by request DTOs

use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

pub const MAX_FORM_NAME_LENGTH: usize = 64;
pub const MIN_PASSWORD_LENGTH: usize = 8;

static FORM_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("form name pattern is a valid regex")
});

/// Form names tag submissions and feed lead-source routing: lowercase
/// identifiers only.
pub fn validate_form_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.len() > MAX_FORM_NAME_LENGTH || !FORM_NAME_RE.is_match(name) {
        let mut err = ValidationError::new("form_name");
        err.message = Some(
            "Form name must be 1-64 characters of lowercase letters, digits, '-' or '_'".into(),
        );
        return Err(err);
    }
    Ok(())
}

pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LENGTH;
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(long_enough && has_letter && has_digit) {
        let mut err = ValidationError::new("password_strength");
        err.message =
            Some("Password must be at least 8 characters and contain letters and digits".into());
        return Err(err);
    }
    Ok(())
}

/// Submission payloads must be JSON objects so fields can be mapped by name.
pub fn validate_json_object(value: &serde_json::Value) -> Result<(), ValidationError> {
    match value.as_object() {
        Some(map) if !map.is_empty() => Ok(()),
        _ => {
            let mut err = ValidationError::new("data");
            err.message = Some("Submission data must be a non-empty JSON object".into());
            Err(err)
        }
    }
}
