//! Ceremony verifier
//!
//! Completes a ceremony in two commits. The first consumes the pending
//! challenge by writing the failure outcome, so a crash, a storage error or a
//! rejected response all leave the user in the safe state and the challenge
//! can never be verified twice. Only a verified response is then promoted to
//! the success outcome by a second compare-and-swap.

use chrono::Utc;

use crate::backend::ClientResponse;
use crate::ceremony::RelyingParty;
use crate::error::{CeremonyError, Result, VerificationError};
use crate::record::{CeremonyKind, CredentialDescriptor, CredentialRecord, PendingChallenge};

impl RelyingParty {
    /// Verify an attestation against the user's pending registration challenge.
    ///
    /// Success confirms the credential (`Registered`). Any failure reverts the
    /// user to `NoCredential`; registration then restarts from scratch.
    pub async fn complete_registration(
        &self,
        user_id: &str,
        response: &ClientResponse,
    ) -> Result<CredentialDescriptor> {
        let _guard = self.locks.lock(user_id).await;

        // No record means no registration was ever started for this user.
        let record = self
            .record(user_id)
            .await?
            .ok_or(CeremonyError::NoCeremonyInProgress)?;
        let pending = take_pending(&record, CeremonyKind::Registration)?;

        let consumed = record.registration_failed();
        if !self.commit(&consumed, Some(record.version)).await? {
            return Err(CeremonyError::NoCeremonyInProgress);
        }

        let verified = if pending.descriptor.is_expired_at(Utc::now()) {
            Err(VerificationError::ChallengeExpired)
        } else {
            self.backend
                .verify_registration_response(&self.config, response, &pending)
        };

        let credential = match verified {
            Ok(credential) => credential,
            Err(reason) => {
                tracing::warn!(
                    user_id = %user_id,
                    reason = %reason,
                    "Registration rejected, credential record reset"
                );
                return Err(CeremonyError::VerificationFailed(reason));
            }
        };

        let next = consumed.registered(credential.clone());
        if !self.commit(&next, Some(consumed.version)).await? {
            return Err(CeremonyError::NoCeremonyInProgress);
        }

        tracing::info!(
            user_id = %user_id,
            credential_id = %credential.credential_id.encode(),
            sign_count = credential.sign_count,
            "Registration ceremony completed"
        );
        Ok(credential)
    }

    /// Verify an assertion against the user's pending authentication challenge.
    ///
    /// The signature counter must strictly advance past the stored value. On
    /// any failure the user returns to `Registered` with the credential and
    /// its counter unchanged.
    pub async fn complete_authentication(
        &self,
        user_id: &str,
        response: &ClientResponse,
    ) -> Result<CredentialDescriptor> {
        let _guard = self.locks.lock(user_id).await;

        let record = self
            .record(user_id)
            .await?
            .ok_or(CeremonyError::UserNotFound)?;
        let pending = take_pending(&record, CeremonyKind::Authentication)?;
        let stored = record
            .credential
            .clone()
            .ok_or(CeremonyError::UserNotFound)?;

        let consumed = record.authentication_finished(None);
        if !self.commit(&consumed, Some(record.version)).await? {
            return Err(CeremonyError::NoCeremonyInProgress);
        }

        let updated = match self.check_assertion(&pending, &stored, response) {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(user_id = %user_id, reason = %e, "Authentication rejected");
                return Err(e);
            }
        };

        let next = consumed.authentication_finished(Some(updated.clone()));
        if !self.commit(&next, Some(consumed.version)).await? {
            return Err(CeremonyError::NoCeremonyInProgress);
        }

        tracing::info!(
            user_id = %user_id,
            credential_id = %updated.credential_id.encode(),
            sign_count = updated.sign_count,
            "Authentication ceremony completed"
        );
        Ok(updated)
    }

    /// Run the external verification and the counter policy.
    fn check_assertion(
        &self,
        pending: &PendingChallenge,
        stored: &CredentialDescriptor,
        response: &ClientResponse,
    ) -> Result<CredentialDescriptor> {
        if pending.descriptor.is_expired_at(Utc::now()) {
            return Err(VerificationError::ChallengeExpired.into());
        }

        let assertion = self.backend.verify_authentication_response(
            &self.config,
            response,
            pending,
            std::slice::from_ref(stored),
        )?;

        if assertion.credential_id != stored.credential_id {
            return Err(VerificationError::UnknownCredential.into());
        }

        // Anti-cloning: a counter that does not advance means two authenticators
        // may hold this key.
        if assertion.sign_count <= stored.sign_count {
            tracing::warn!(
                credential_id = %stored.credential_id.encode(),
                stored = stored.sign_count,
                presented = assertion.sign_count,
                "Signature counter did not advance, possible cloned credential"
            );
            return Err(CeremonyError::StaleCounter {
                stored: stored.sign_count,
                presented: assertion.sign_count,
            });
        }

        let mut updated = stored.clone();
        updated.sign_count = assertion.sign_count;
        updated.last_used_at = Some(Utc::now());
        if let Some(public_key) = assertion.updated_public_key {
            updated.public_key = public_key;
        }
        Ok(updated)
    }
}

/// The outstanding challenge, if it belongs to a ceremony of `kind`.
fn take_pending(record: &CredentialRecord, kind: CeremonyKind) -> Result<PendingChallenge> {
    let expected_state = kind.pending_state();
    match &record.pending {
        Some(pending) if record.state == expected_state && pending.kind() == kind => {
            Ok(pending.clone())
        }
        _ => {
            tracing::debug!(
                user_id = %record.user_id,
                state = %record.state,
                expected = %expected_state,
                "No matching ceremony in progress"
            );
            Err(CeremonyError::NoCeremonyInProgress)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Base64UrlBytes, CeremonyState, ChallengeDescriptor, UserIdentity};

    fn record_with(state: CeremonyState, kind: Option<CeremonyKind>) -> CredentialRecord {
        let mut record = CredentialRecord::new(&UserIdentity::new("u1", "Alice").unwrap());
        record.state = state;
        record.pending = kind.map(|ceremony| {
            let now = Utc::now();
            PendingChallenge {
                descriptor: ChallengeDescriptor {
                    ceremony,
                    user_id: "u1".into(),
                    challenge: Base64UrlBytes::new(vec![3u8; 32]),
                    issued_at: now,
                    expires_at: now + chrono::Duration::minutes(5),
                    public_key: serde_json::Value::Null,
                },
                verifier_state: serde_json::Value::Null,
            }
        });
        record
    }

    #[test]
    fn test_take_pending_matches_kind() {
        let record = record_with(
            CeremonyState::PendingRegistration,
            Some(CeremonyKind::Registration),
        );
        assert!(take_pending(&record, CeremonyKind::Registration).is_ok());
        assert!(matches!(
            take_pending(&record, CeremonyKind::Authentication),
            Err(CeremonyError::NoCeremonyInProgress)
        ));
    }

    #[test]
    fn test_take_pending_requires_challenge() {
        let record = record_with(CeremonyState::Registered, None);
        assert!(matches!(
            take_pending(&record, CeremonyKind::Authentication),
            Err(CeremonyError::NoCeremonyInProgress)
        ));
    }

    #[test]
    fn test_take_pending_rejects_state_mismatch() {
        // A challenge left behind with an inconsistent state is not honoured.
        let record = record_with(CeremonyState::Registered, Some(CeremonyKind::Authentication));
        assert!(take_pending(&record, CeremonyKind::Authentication).is_err());
    }
}
