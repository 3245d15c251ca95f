//! Mock authenticator for testing.
//!
//! Stands in for both sides of a ceremony: as a [`WebAuthnBackend`] it issues
//! random challenges and checks responses, and [`MockResponse`] plays the
//! browser/authenticator producing those responses. There is no real
//! cryptography here; "signature validity" is a flag on the response.
//! WARNING: Do not use in production.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::{
    AssertionResult, BackendError, ClientResponse, IssuedChallenge, WebAuthnBackend,
};
use crate::config::RelyingPartyConfig;
use crate::error::VerificationError;
use crate::record::{
    Base64UrlBytes, ChallengeDescriptor, CredentialDescriptor, PendingChallenge, UserIdentity,
};

const CREATE_TYPE: &str = "webauthn.create";
const GET_TYPE: &str = "webauthn.get";

/// Software authenticator implementing the verification-library contract
#[derive(Debug, Clone)]
pub struct MockAuthenticator {
    challenge_len: usize,
}

impl MockAuthenticator {
    pub fn new() -> Self {
        Self { challenge_len: 32 }
    }

    /// Issue challenges of `len` bytes (lets tests exercise the minimum length check)
    pub fn with_challenge_len(len: usize) -> Self {
        Self { challenge_len: len }
    }

    fn random_challenge(&self) -> Vec<u8> {
        (0..self.challenge_len).map(|_| rand::random::<u8>()).collect()
    }
}

impl Default for MockAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

/// Client data as the mock authenticator encodes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Base64UrlBytes,
    pub challenge: Base64UrlBytes,
    pub origin: String,
    pub rp_id: String,
    pub counter: u32,
    pub signature_valid: bool,
}

impl MockResponse {
    /// Attestation for `descriptor`, counter starting at 0
    pub fn registration(
        descriptor: &ChallengeDescriptor,
        rp: &RelyingPartyConfig,
        credential_id: &[u8],
    ) -> Self {
        Self::build(CREATE_TYPE, descriptor, rp, credential_id, 0)
    }

    /// Assertion for `descriptor` reporting `counter`
    pub fn authentication(
        descriptor: &ChallengeDescriptor,
        rp: &RelyingPartyConfig,
        credential_id: &[u8],
        counter: u32,
    ) -> Self {
        Self::build(GET_TYPE, descriptor, rp, credential_id, counter)
    }

    fn build(
        kind: &str,
        descriptor: &ChallengeDescriptor,
        rp: &RelyingPartyConfig,
        credential_id: &[u8],
        counter: u32,
    ) -> Self {
        Self {
            kind: kind.to_string(),
            id: Base64UrlBytes::new(credential_id.to_vec()),
            challenge: descriptor.challenge.clone(),
            origin: rp.origin_str(),
            rp_id: rp.rp_id.clone(),
            counter,
            signature_valid: true,
        }
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.to_string();
        self
    }

    pub fn with_rp_id(mut self, rp_id: &str) -> Self {
        self.rp_id = rp_id.to_string();
        self
    }

    pub fn with_invalid_signature(mut self) -> Self {
        self.signature_valid = false;
        self
    }

    pub fn into_response(self) -> ClientResponse {
        ClientResponse::new(serde_json::to_value(self).unwrap_or_default())
    }

    /// Common checks for both ceremony types
    fn check(
        &self,
        expected_kind: &str,
        rp: &RelyingPartyConfig,
        pending: &PendingChallenge,
    ) -> Result<(), VerificationError> {
        if self.kind != expected_kind {
            return Err(VerificationError::MalformedResponse(format!(
                "unexpected client data type {}",
                self.kind
            )));
        }
        if self.rp_id != rp.rp_id {
            return Err(VerificationError::RpIdMismatch);
        }
        let expected_origin = rp.origin_str();
        if self.origin != expected_origin {
            return Err(VerificationError::OriginMismatch {
                expected: expected_origin,
                actual: self.origin.clone(),
            });
        }
        if self.challenge.as_bytes() != pending.challenge() {
            return Err(VerificationError::ChallengeMismatch);
        }
        if !self.signature_valid {
            return Err(VerificationError::InvalidSignature);
        }
        Ok(())
    }
}

fn parse(response: &ClientResponse) -> Result<MockResponse, VerificationError> {
    serde_json::from_value(response.as_json().clone())
        .map_err(|e| VerificationError::MalformedResponse(e.to_string()))
}

impl WebAuthnBackend for MockAuthenticator {
    fn generate_registration_options(
        &self,
        rp: &RelyingPartyConfig,
        user: &UserIdentity,
    ) -> Result<IssuedChallenge, BackendError> {
        let challenge = self.random_challenge();
        let encoded = Base64UrlBytes::new(challenge.clone()).encode();
        let public_key = json!({
            "rp": { "id": rp.rp_id, "name": rp.rp_name },
            "user": {
                "id": Base64UrlBytes::new(user.user_id.as_bytes().to_vec()).encode(),
                "name": user.user_name,
                "displayName": user.user_name,
            },
            "challenge": encoded,
            "pubKeyCredParams": [
                { "type": "public-key", "alg": -7 },
                { "type": "public-key", "alg": -257 },
            ],
            "timeout": rp.challenge_ttl.num_milliseconds(),
            "attestation": "none",
        });

        Ok(IssuedChallenge {
            challenge,
            public_key,
            verifier_state: json!({ "challenge": encoded }),
        })
    }

    fn generate_authentication_options(
        &self,
        rp: &RelyingPartyConfig,
        _user: &UserIdentity,
        allow_credentials: &[CredentialDescriptor],
    ) -> Result<IssuedChallenge, BackendError> {
        if allow_credentials.is_empty() {
            return Err(BackendError("no credentials to authenticate with".into()));
        }
        let challenge = self.random_challenge();
        let encoded = Base64UrlBytes::new(challenge.clone()).encode();
        let allow: Vec<_> = allow_credentials
            .iter()
            .map(|c| json!({ "type": "public-key", "id": c.credential_id.encode() }))
            .collect();
        let public_key = json!({
            "challenge": encoded,
            "rpId": rp.rp_id,
            "allowCredentials": allow,
            "timeout": rp.challenge_ttl.num_milliseconds(),
            "userVerification": "preferred",
        });

        Ok(IssuedChallenge {
            challenge,
            public_key,
            verifier_state: json!({ "challenge": encoded }),
        })
    }

    fn verify_registration_response(
        &self,
        rp: &RelyingPartyConfig,
        response: &ClientResponse,
        pending: &PendingChallenge,
    ) -> Result<CredentialDescriptor, VerificationError> {
        let data = parse(response)?;
        data.check(CREATE_TYPE, rp, pending)?;

        Ok(CredentialDescriptor {
            credential_id: data.id.clone(),
            public_key: json!({ "kty": "EC", "crv": "P-256", "mock": true }),
            sign_count: data.counter,
            registered_at: Utc::now(),
            last_used_at: None,
        })
    }

    fn verify_authentication_response(
        &self,
        rp: &RelyingPartyConfig,
        response: &ClientResponse,
        pending: &PendingChallenge,
        allow_credentials: &[CredentialDescriptor],
    ) -> Result<AssertionResult, VerificationError> {
        let data = parse(response)?;
        data.check(GET_TYPE, rp, pending)?;

        if !allow_credentials
            .iter()
            .any(|c| c.credential_id == data.id)
        {
            return Err(VerificationError::UnknownCredential);
        }

        Ok(AssertionResult {
            credential_id: data.id,
            sign_count: data.counter,
            updated_public_key: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn rp() -> RelyingPartyConfig {
        RelyingPartyConfig::new(
            "localhost",
            "Test",
            &Url::parse("http://localhost:8501").unwrap(),
        )
        .unwrap()
    }

    fn pending_for(issued: &IssuedChallenge) -> PendingChallenge {
        let now = Utc::now();
        PendingChallenge {
            descriptor: ChallengeDescriptor {
                ceremony: crate::record::CeremonyKind::Registration,
                user_id: "u1".into(),
                challenge: Base64UrlBytes::new(issued.challenge.clone()),
                issued_at: now,
                expires_at: now + chrono::Duration::minutes(5),
                public_key: issued.public_key.clone(),
            },
            verifier_state: issued.verifier_state.clone(),
        }
    }

    #[test]
    fn test_challenges_are_fresh() {
        let mock = MockAuthenticator::new();
        let user = UserIdentity::new("u1", "Alice").unwrap();
        let a = mock.generate_registration_options(&rp(), &user).unwrap();
        let b = mock.generate_registration_options(&rp(), &user).unwrap();
        assert_eq!(a.challenge.len(), 32);
        assert_ne!(a.challenge, b.challenge);
        assert_eq!(
            a.public_key["challenge"],
            Base64UrlBytes::new(a.challenge.clone()).encode()
        );
    }

    #[test]
    fn test_registration_checks_origin_and_signature() {
        let mock = MockAuthenticator::new();
        let rp = rp();
        let user = UserIdentity::new("u1", "Alice").unwrap();
        let issued = mock.generate_registration_options(&rp, &user).unwrap();
        let pending = pending_for(&issued);

        let ok = MockResponse::registration(&pending.descriptor, &rp, b"cred").into_response();
        let cred = mock.verify_registration_response(&rp, &ok, &pending).unwrap();
        assert_eq!(cred.credential_id.as_bytes(), b"cred");
        assert_eq!(cred.sign_count, 0);

        let wrong_origin = MockResponse::registration(&pending.descriptor, &rp, b"cred")
            .with_origin("https://evil.example")
            .into_response();
        assert!(matches!(
            mock.verify_registration_response(&rp, &wrong_origin, &pending),
            Err(VerificationError::OriginMismatch { .. })
        ));

        let forged = MockResponse::registration(&pending.descriptor, &rp, b"cred")
            .with_invalid_signature()
            .into_response();
        assert_eq!(
            mock.verify_registration_response(&rp, &forged, &pending),
            Err(VerificationError::InvalidSignature)
        );
    }

    #[test]
    fn test_malformed_response_is_rejected() {
        let mock = MockAuthenticator::new();
        let rp = rp();
        let user = UserIdentity::new("u1", "Alice").unwrap();
        let pending = pending_for(&mock.generate_registration_options(&rp, &user).unwrap());

        let garbage = ClientResponse::new(json!({ "hello": "world" }));
        assert!(matches!(
            mock.verify_registration_response(&rp, &garbage, &pending),
            Err(VerificationError::MalformedResponse(_))
        ));
    }
}
