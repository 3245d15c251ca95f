//! Passgate Core - WebAuthn ceremony state machine for relying parties
//!
//! This crate drives the two-phase registration and authentication ceremonies
//! of a WebAuthn relying party and manages the lifecycle of the resulting
//! credentials. Cryptographic verification is delegated to a
//! [`WebAuthnBackend`]; persistence to a [`CredentialStore`].
//!
//! # Lifecycle
//!
//! ```text
//! NoCredential          --begin_registration-->    PendingRegistration
//! PendingRegistration   --verify ok-->             Registered
//! PendingRegistration   --verify fail-->           NoCredential
//! Registered            --begin_authentication-->  PendingAuthentication
//! PendingAuthentication --verify ok, counter up--> Registered
//! PendingAuthentication --verify fail / stale-->   Registered
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use passgate_core::{
//!     MemoryCredentialStore, MockAuthenticator, MockResponse, RelyingParty, RelyingPartyConfig,
//! };
//!
//! # async fn example() -> passgate_core::Result<()> {
//! let origin = url::Url::parse("http://localhost:8501").unwrap();
//! let config = RelyingPartyConfig::new("localhost", "Example", &origin).unwrap();
//! let rp = RelyingParty::new(
//!     config.clone(),
//!     Arc::new(MemoryCredentialStore::new()),
//!     Arc::new(MockAuthenticator::new()),
//! );
//!
//! let descriptor = rp.begin_registration("u1", "Alice").await?;
//! let response = MockResponse::registration(&descriptor, &config, b"credential-1").into_response();
//! rp.complete_registration("u1", &response).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod ceremony;
pub mod config;
pub mod error;
mod issuer;
pub mod locks;
#[cfg(feature = "mock")]
pub mod mock;
pub mod record;
pub mod store;
mod verifier;

// Re-export main types for convenience
pub use backend::{AssertionResult, BackendError, ClientResponse, IssuedChallenge, WebAuthnBackend};
pub use ceremony::RelyingParty;
pub use config::{ConfigError, RelyingPartyConfig, DEFAULT_CHALLENGE_TTL_SECS};
pub use error::{CeremonyError, Result, StorageError, VerificationError};
pub use locks::UserLocks;
pub use record::{
    Base64UrlBytes, CeremonyKind, CeremonyState, ChallengeDescriptor, CredentialDescriptor,
    CredentialRecord, PendingChallenge, UserIdentity, MIN_CHALLENGE_BYTES,
};
pub use store::{CredentialStore, MemoryCredentialStore};

#[cfg(feature = "mock")]
pub use mock::{MockAuthenticator, MockResponse};
