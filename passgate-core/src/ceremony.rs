//! Relying party ceremony service
//!
//! Owns the collaborators shared by the challenge issuer (`issuer.rs`) and the
//! ceremony verifier (`verifier.rs`): RP configuration, the credential store,
//! the verification library and the per-user lock registry.

use std::sync::Arc;

use chrono::Utc;

use crate::backend::{IssuedChallenge, WebAuthnBackend};
use crate::config::RelyingPartyConfig;
use crate::error::{CeremonyError, Result};
use crate::locks::UserLocks;
use crate::record::{
    Base64UrlBytes, CeremonyKind, ChallengeDescriptor, CredentialRecord, PendingChallenge,
    MIN_CHALLENGE_BYTES,
};
use crate::store::CredentialStore;

/// Registration and authentication ceremonies for one relying party.
pub struct RelyingParty {
    pub(crate) config: RelyingPartyConfig,
    pub(crate) store: Arc<dyn CredentialStore>,
    pub(crate) backend: Arc<dyn WebAuthnBackend>,
    pub(crate) locks: UserLocks,
}

impl RelyingParty {
    pub fn new(
        config: RelyingPartyConfig,
        store: Arc<dyn CredentialStore>,
        backend: Arc<dyn WebAuthnBackend>,
    ) -> Self {
        Self {
            config,
            store,
            backend,
            locks: UserLocks::new(),
        }
    }

    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Read the current record for `user_id`.
    pub async fn record(&self, user_id: &str) -> Result<Option<CredentialRecord>> {
        self.store.get(user_id).await.map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Credential store read failed");
            CeremonyError::Storage(e)
        })
    }

    /// Write `next` if the stored record is still at `expected_version`.
    ///
    /// Returns `Ok(false)` when another writer got there first.
    pub(crate) async fn commit(
        &self,
        next: &CredentialRecord,
        expected_version: Option<u64>,
    ) -> Result<bool> {
        let committed = self.store.swap(next, expected_version).await.map_err(|e| {
            tracing::error!(user_id = %next.user_id, error = %e, "Credential store write failed");
            CeremonyError::Storage(e)
        })?;

        if !committed {
            tracing::warn!(
                user_id = %next.user_id,
                expected_version = ?expected_version,
                "Lost compare-and-swap on credential record"
            );
        }
        Ok(committed)
    }

    /// Wrap freshly generated options into a pending challenge.
    pub(crate) fn pending_challenge(
        &self,
        kind: CeremonyKind,
        user_id: &str,
        issued: IssuedChallenge,
    ) -> Result<PendingChallenge> {
        if issued.challenge.len() < MIN_CHALLENGE_BYTES {
            return Err(CeremonyError::Backend(format!(
                "challenge of {} bytes is below the {} byte minimum",
                issued.challenge.len(),
                MIN_CHALLENGE_BYTES
            )));
        }

        let issued_at = Utc::now();
        Ok(PendingChallenge {
            descriptor: ChallengeDescriptor {
                ceremony: kind,
                user_id: user_id.to_string(),
                challenge: Base64UrlBytes::new(issued.challenge),
                issued_at,
                expires_at: issued_at + self.config.challenge_ttl,
                public_key: issued.public_key,
            },
            verifier_state: issued.verifier_state,
        })
    }
}

impl std::fmt::Debug for RelyingParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelyingParty")
            .field("rp_id", &self.config.rp_id)
            .field("origin", &self.config.origin_str())
            .field("persistent_store", &self.store.is_persistent())
            .field("locks", &self.locks)
            .finish()
    }
}
