//! Contract of the WebAuthn verification library.
//!
//! The ceremony code never touches signatures, COSE keys or attestation
//! statements itself. It asks a [`WebAuthnBackend`] for options and hands the
//! client response back to it together with the challenge it issued.

use serde::{Deserialize, Serialize};

use crate::config::RelyingPartyConfig;
use crate::error::VerificationError;
use crate::record::{Base64UrlBytes, CredentialDescriptor, PendingChallenge, UserIdentity};

/// Raw credential JSON posted by the browser
/// (`PublicKeyCredential` from `navigator.credentials.create()` / `.get()`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientResponse(pub serde_json::Value);

impl ClientResponse {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Output of option generation.
#[derive(Debug, Clone)]
pub struct IssuedChallenge {
    /// Challenge bytes embedded in `public_key`
    pub challenge: Vec<u8>,
    /// Client-facing options object
    pub public_key: serde_json::Value,
    /// Opaque state the library needs to verify the response; stays server-side
    pub verifier_state: serde_json::Value,
}

/// Outcome of a verified assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionResult {
    pub credential_id: Base64UrlBytes,
    /// Signature counter reported by the authenticator
    pub sign_count: u32,
    /// Replacement key material when the library tracks state inside it
    pub updated_public_key: Option<serde_json::Value>,
}

/// Error generating options (as opposed to rejecting a response)
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// The external verification library.
///
/// Calls are synchronous and bounded; implementations must be thread-safe.
pub trait WebAuthnBackend: Send + Sync {
    fn generate_registration_options(
        &self,
        rp: &RelyingPartyConfig,
        user: &UserIdentity,
    ) -> Result<IssuedChallenge, BackendError>;

    fn generate_authentication_options(
        &self,
        rp: &RelyingPartyConfig,
        user: &UserIdentity,
        allow_credentials: &[CredentialDescriptor],
    ) -> Result<IssuedChallenge, BackendError>;

    /// Check signature, origin, RP ID, challenge equality and attestation policy.
    fn verify_registration_response(
        &self,
        rp: &RelyingPartyConfig,
        response: &ClientResponse,
        pending: &PendingChallenge,
    ) -> Result<CredentialDescriptor, VerificationError>;

    /// Check an assertion against the issued challenge and the allowed credentials.
    fn verify_authentication_response(
        &self,
        rp: &RelyingPartyConfig,
        response: &ClientResponse,
        pending: &PendingChallenge,
        allow_credentials: &[CredentialDescriptor],
    ) -> Result<AssertionResult, VerificationError>;
}
