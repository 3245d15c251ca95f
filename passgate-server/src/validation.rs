//! Request validation module
//!
//! Checks the identifiers carried in ceremony requests before they reach the
//! relying party core.

use crate::error::ApiError;

/// Maximum length of a user id in bytes (WebAuthn caps user handles at 64)
pub const MAX_USER_ID_BYTES: usize = 64;

/// Maximum length of a display name in bytes
pub const MAX_USER_NAME_BYTES: usize = 256;

/// Validates a required `user_id`
///
/// Rejects missing, blank, oversized and control-character values.
pub fn validate_user_id(user_id: Option<&str>) -> Result<&str, ApiError> {
    validate_field("user_id", user_id, MAX_USER_ID_BYTES)
}

/// Validates a required `user_name`
pub fn validate_user_name(user_name: Option<&str>) -> Result<&str, ApiError> {
    validate_field("user_name", user_name, MAX_USER_NAME_BYTES)
}

fn validate_field<'a>(
    field: &str,
    value: Option<&'a str>,
    max_bytes: usize,
) -> Result<&'a str, ApiError> {
    let value = match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Err(ApiError::bad_request(format!("{} is required", field))),
    };

    if value.len() > max_bytes {
        return Err(ApiError::bad_request(format!(
            "{} too long: {} bytes exceeds maximum of {} bytes",
            field,
            value.len(),
            max_bytes
        )));
    }

    if value.chars().any(char::is_control) {
        return Err(ApiError::bad_request(format!(
            "{} must not contain control characters",
            field
        )));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id_required() {
        assert!(validate_user_id(None).is_err());
        assert!(validate_user_id(Some("")).is_err());
        assert!(validate_user_id(Some("   ")).is_err());
        assert_eq!(validate_user_id(Some("user-42")).unwrap(), "user-42");
    }

    #[test]
    fn test_validate_user_id_length() {
        let max = "a".repeat(MAX_USER_ID_BYTES);
        assert!(validate_user_id(Some(&max)).is_ok());

        let over = "a".repeat(MAX_USER_ID_BYTES + 1);
        let err = validate_user_id(Some(&over)).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_validate_user_name_control_chars() {
        assert!(validate_user_name(Some("alice\n")).is_err());
        assert!(validate_user_name(Some("Alice Liddell")).is_ok());
    }
}
