//! API error handling module
//!
//! Maps ceremony failures onto HTTP statuses and stable error codes. Clients
//! get a sanitised message; the full internal reason goes to the log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use passgate_core::{CeremonyError, VerificationError};
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Service unavailable - required service is not configured or available
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Ceremony error from the relying party core
    #[error("Ceremony error: {0}")]
    Ceremony(#[from] CeremonyError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Ceremony(ref e) => match e {
                CeremonyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                CeremonyError::UserNotFound => StatusCode::NOT_FOUND,
                CeremonyError::NoCeremonyInProgress
                | CeremonyError::AlreadyRegistered
                | CeremonyError::Superseded => StatusCode::CONFLICT,
                CeremonyError::VerificationFailed(_) | CeremonyError::StaleCounter { .. } => {
                    StatusCode::UNAUTHORIZED
                }
                CeremonyError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,

                // Retryable; says nothing about the credential itself
                CeremonyError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Ceremony(ref e) => match e {
                CeremonyError::InvalidInput(_) => "INVALID_INPUT",
                CeremonyError::UserNotFound => "USER_NOT_FOUND",
                CeremonyError::NoCeremonyInProgress => "NO_CEREMONY_IN_PROGRESS",
                CeremonyError::AlreadyRegistered => "ALREADY_REGISTERED",
                CeremonyError::Superseded => "CEREMONY_SUPERSEDED",
                CeremonyError::VerificationFailed(VerificationError::ChallengeExpired) => {
                    "CHALLENGE_EXPIRED"
                }
                CeremonyError::VerificationFailed(_) => "VERIFICATION_FAILED",
                CeremonyError::StaleCounter { .. } => "STALE_COUNTER",
                CeremonyError::Backend(_) => "BACKEND_ERROR",
                CeremonyError::Storage(_) => "STORAGE_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // Never echo verifier or storage internals to the client
            Self::Ceremony(ref e) => match e {
                CeremonyError::InvalidInput(message) => message.clone(),
                CeremonyError::UserNotFound => "User not found or has no credential".to_string(),
                CeremonyError::NoCeremonyInProgress => {
                    "No matching ceremony in progress, request new options".to_string()
                }
                CeremonyError::AlreadyRegistered => {
                    "User already has a registered credential".to_string()
                }
                CeremonyError::Superseded => {
                    "Another ceremony for this user started concurrently".to_string()
                }
                CeremonyError::VerificationFailed(VerificationError::ChallengeExpired) => {
                    "Challenge expired, request new options".to_string()
                }
                CeremonyError::VerificationFailed(_) => "Credential verification failed".to_string(),
                CeremonyError::StaleCounter { .. } => "Authentication failed".to_string(),
                CeremonyError::Backend(_) => "Could not generate ceremony options".to_string(),
                CeremonyError::Storage(_) => {
                    "Credential storage unavailable, retry later".to_string()
                }
            },
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Ceremony(_) => "ceremony",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "status": "error",
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passgate_core::StorageError;

    #[test]
    fn test_ceremony_status_mapping() {
        let cases = [
            (CeremonyError::UserNotFound, StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            (
                CeremonyError::NoCeremonyInProgress,
                StatusCode::CONFLICT,
                "NO_CEREMONY_IN_PROGRESS",
            ),
            (
                CeremonyError::StaleCounter { stored: 5, presented: 5 },
                StatusCode::UNAUTHORIZED,
                "STALE_COUNTER",
            ),
            (
                CeremonyError::Storage(StorageError::Connection("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
                "STORAGE_ERROR",
            ),
        ];

        for (error, status, code) in cases {
            let api = ApiError::from(error);
            assert_eq!(api.status_code(), status);
            assert_eq!(api.error_code(), code);
        }
    }

    #[test]
    fn test_verification_reason_not_leaked() {
        let api = ApiError::from(CeremonyError::VerificationFailed(
            VerificationError::OriginMismatch {
                expected: "http://localhost:8501".into(),
                actual: "https://evil.example".into(),
            },
        ));
        assert_eq!(api.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(api.client_message(), "Credential verification failed");
        assert!(api.to_string().contains("evil.example"));
    }

    #[test]
    fn test_expired_challenge_has_own_code() {
        let api = ApiError::from(CeremonyError::VerificationFailed(
            VerificationError::ChallengeExpired,
        ));
        assert_eq!(api.error_code(), "CHALLENGE_EXPIRED");
    }

    #[test]
    fn test_plain_variants() {
        let missing = ApiError::not_found("No route for /nope");
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing.error_code(), "NOT_FOUND");

        let down = ApiError::service_unavailable("Credential storage unreachable");
        assert_eq!(down.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(down.error_code(), "SERVICE_UNAVAILABLE");
        assert!(down.client_message().contains("unreachable"));
    }

    #[test]
    fn test_storage_details_hidden() {
        let api = ApiError::from(CeremonyError::Storage(StorageError::Query(
            "relation credential_records does not exist".into(),
        )));
        assert!(!api.client_message().contains("credential_records"));
    }
}
