//! Challenge issuer
//!
//! Produces registration / authentication descriptors and records them as the
//! user's single outstanding challenge.

use crate::ceremony::RelyingParty;
use crate::error::{CeremonyError, Result};
use crate::record::{CeremonyKind, ChallengeDescriptor, CredentialRecord, UserIdentity};

impl RelyingParty {
    /// Start registering a credential for `user_id`.
    ///
    /// Supersedes any challenge still outstanding for the user. Users that
    /// already hold a confirmed credential get [`CeremonyError::AlreadyRegistered`].
    pub async fn begin_registration(
        &self,
        user_id: &str,
        user_name: &str,
    ) -> Result<ChallengeDescriptor> {
        let identity = UserIdentity::new(user_id, user_name)?;
        let _guard = self.locks.lock(user_id).await;

        let (current, expected_version) = match self.record(user_id).await? {
            Some(record) => {
                if record.state.has_credential() {
                    return Err(CeremonyError::AlreadyRegistered);
                }
                if record.user_name != identity.user_name {
                    return Err(CeremonyError::InvalidInput(
                        "user_name does not match the existing user".into(),
                    ));
                }
                let version = record.version;
                (record, Some(version))
            }
            None => (CredentialRecord::new(&identity), None),
        };

        let issued = self
            .backend
            .generate_registration_options(&self.config, &identity)
            .map_err(|e| CeremonyError::Backend(e.to_string()))?;
        let pending = self.pending_challenge(CeremonyKind::Registration, user_id, issued)?;
        let descriptor = pending.descriptor.clone();

        let next = current.with_pending(pending);
        if !self.commit(&next, expected_version).await? {
            return Err(CeremonyError::Superseded);
        }

        tracing::info!(
            user_id = %user_id,
            superseded = current.pending.is_some(),
            expires_at = %descriptor.expires_at,
            "Registration ceremony started"
        );
        Ok(descriptor)
    }

    /// Start an authentication ceremony against the user's registered credential.
    pub async fn begin_authentication(&self, user_id: &str) -> Result<ChallengeDescriptor> {
        if user_id.trim().is_empty() {
            return Err(CeremonyError::InvalidInput("user_id is required".into()));
        }
        let _guard = self.locks.lock(user_id).await;

        let record = self
            .record(user_id)
            .await?
            .ok_or(CeremonyError::UserNotFound)?;
        let credential = match (&record.credential, record.state.has_credential()) {
            (Some(credential), true) => credential,
            _ => return Err(CeremonyError::UserNotFound),
        };

        let issued = self
            .backend
            .generate_authentication_options(
                &self.config,
                &record.identity(),
                std::slice::from_ref(credential),
            )
            .map_err(|e| CeremonyError::Backend(e.to_string()))?;
        let pending = self.pending_challenge(CeremonyKind::Authentication, user_id, issued)?;
        let descriptor = pending.descriptor.clone();

        let next = record.with_pending(pending);
        if !self.commit(&next, Some(record.version)).await? {
            return Err(CeremonyError::Superseded);
        }

        tracing::info!(
            user_id = %user_id,
            credential_id = %credential.credential_id.encode(),
            superseded = record.pending.is_some(),
            "Authentication ceremony started"
        );
        Ok(descriptor)
    }
}
