//! Ceremony request/response types
//!
//! Field names follow the original deployment: `user_id`, `user_name` and
//! `response_data`. Every field is optional at the serde level so that a
//! missing field surfaces as a 400 `INVALID_INPUT` rather than a generic
//! extractor rejection.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request for registration options
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RegisterOptionsRequest {
    /// Opaque application user identifier
    #[schema(example = "user-42")]
    #[serde(default)]
    pub user_id: Option<String>,
    /// Display name shown by the authenticator
    #[schema(example = "alice")]
    #[serde(default)]
    pub user_name: Option<String>,
}

/// Request for login options
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LoginOptionsRequest {
    /// Opaque application user identifier
    #[schema(example = "user-42")]
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Client response to a registration or login challenge
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CeremonyResponseRequest {
    /// Opaque application user identifier
    #[schema(example = "user-42")]
    #[serde(default)]
    pub user_id: Option<String>,
    /// `PublicKeyCredential` JSON from `navigator.credentials.create()` / `.get()`,
    /// either as an object or as a JSON-encoded string
    #[schema(value_type = Object)]
    #[serde(default)]
    pub response_data: Option<serde_json::Value>,
}

/// Successful registration
#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationResponse {
    #[schema(example = "success")]
    pub status: &'static str,
    #[schema(example = "Registration successful!")]
    pub message: &'static str,
    /// Registered credential id (base64url)
    pub credential_id: String,
}

/// Successful login
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthenticationResponse {
    #[schema(example = "success")]
    pub status: &'static str,
    #[schema(example = "Authentication successful!")]
    pub message: &'static str,
    /// Credential id that produced the assertion (base64url)
    pub credential_id: String,
    /// Signature counter now stored for the credential
    pub sign_count: u32,
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "error")]
    pub status: String,
    /// Sanitised, human-readable message
    pub error: String,
    /// Stable machine-readable code
    #[schema(example = "NO_CEREMONY_IN_PROGRESS")]
    pub code: String,
}
