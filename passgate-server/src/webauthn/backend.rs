//! `webauthn-rs` verification backend
//!
//! Wraps a [`Webauthn`] instance built from the relying party configuration
//! and translates between its passkey ceremony types and the JSON carried in
//! passgate records.

use passgate_core::{
    AssertionResult, BackendError, Base64UrlBytes, ClientResponse, CredentialDescriptor,
    IssuedChallenge, PendingChallenge, RelyingPartyConfig, UserIdentity, VerificationError,
    WebAuthnBackend,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;
use url::Url;
use webauthn_rs::prelude::*;

/// Passkey ceremonies through `webauthn-rs`
pub struct WebauthnRsBackend {
    webauthn: Webauthn,
    rp_id: String,
    origin: Url,
}

impl WebauthnRsBackend {
    /// Build the backend for one relying party.
    pub fn new(config: &RelyingPartyConfig) -> Result<Self, WebauthnError> {
        let builder = WebauthnBuilder::new(&config.rp_id, &config.origin)?
            .rp_name(&config.rp_name)
            .allow_subdomains(false);

        Ok(Self {
            webauthn: builder.build()?,
            rp_id: config.rp_id.clone(),
            origin: config.origin.clone(),
        })
    }

    /// The `Webauthn` instance is bound to one RP; refuse to verify for another.
    fn ensure_rp(&self, rp: &RelyingPartyConfig) -> Result<(), VerificationError> {
        if rp.rp_id != self.rp_id {
            return Err(VerificationError::RpIdMismatch);
        }
        if rp.origin != self.origin {
            return Err(VerificationError::OriginMismatch {
                expected: rp.origin_str(),
                actual: self.origin.origin().ascii_serialization(),
            });
        }
        Ok(())
    }

    fn map_error(&self, error: WebauthnError, response: &ClientResponse) -> VerificationError {
        match error {
            WebauthnError::MismatchedChallenge => VerificationError::ChallengeMismatch,
            WebauthnError::InvalidRPOrigin => VerificationError::OriginMismatch {
                expected: self.origin.origin().ascii_serialization(),
                actual: reported_origin(response).unwrap_or_else(|| "unknown".to_string()),
            },
            WebauthnError::InvalidRPIDHash => VerificationError::RpIdMismatch,
            other => VerificationError::Rejected(format!("{:?}", other)),
        }
    }
}

impl std::fmt::Debug for WebauthnRsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebauthnRsBackend")
            .field("rp_id", &self.rp_id)
            .field("origin", &self.origin.as_str())
            .field("webauthn", &"<Webauthn instance>")
            .finish()
    }
}

impl WebAuthnBackend for WebauthnRsBackend {
    fn generate_registration_options(
        &self,
        rp: &RelyingPartyConfig,
        user: &UserIdentity,
    ) -> Result<IssuedChallenge, BackendError> {
        self.ensure_rp(rp).map_err(|e| BackendError(e.to_string()))?;

        let (options, state) = self
            .webauthn
            .start_passkey_registration(
                user_handle(&user.user_id),
                &user.user_name,
                &user.user_name,
                None,
            )
            .map_err(|e| BackendError(format!("failed to start registration: {:?}", e)))?;

        issued(&options, &state)
    }

    fn generate_authentication_options(
        &self,
        rp: &RelyingPartyConfig,
        _user: &UserIdentity,
        allow_credentials: &[CredentialDescriptor],
    ) -> Result<IssuedChallenge, BackendError> {
        self.ensure_rp(rp).map_err(|e| BackendError(e.to_string()))?;

        let passkeys = allow_credentials
            .iter()
            .map(|credential| from_json::<Passkey>(&credential.public_key))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError(format!("stored passkey is unreadable: {}", e)))?;

        let (options, state) = self
            .webauthn
            .start_passkey_authentication(&passkeys)
            .map_err(|e| BackendError(format!("failed to start authentication: {:?}", e)))?;

        issued(&options, &state)
    }

    fn verify_registration_response(
        &self,
        rp: &RelyingPartyConfig,
        response: &ClientResponse,
        pending: &PendingChallenge,
    ) -> Result<CredentialDescriptor, VerificationError> {
        self.ensure_rp(rp)?;

        let credential: RegisterPublicKeyCredential = from_json(response.as_json())
            .map_err(|e| VerificationError::MalformedResponse(e.to_string()))?;
        let state: PasskeyRegistration = from_json(&pending.verifier_state)
            .map_err(|e| VerificationError::Rejected(format!("unreadable registration state: {}", e)))?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&credential, &state)
            .map_err(|e| self.map_error(e, response))?;

        let credential_id: &[u8] = passkey.cred_id();
        let public_key = key_material(&passkey)?;
        let sign_count = stored_counter(&public_key);

        Ok(CredentialDescriptor {
            credential_id: Base64UrlBytes::new(credential_id.to_vec()),
            public_key,
            sign_count,
            registered_at: chrono::Utc::now(),
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
        self.ensure_rp(rp)?;

        let credential: PublicKeyCredential = from_json(response.as_json())
            .map_err(|e| VerificationError::MalformedResponse(e.to_string()))?;
        let state: PasskeyAuthentication = from_json(&pending.verifier_state).map_err(|e| {
            VerificationError::Rejected(format!("unreadable authentication state: {}", e))
        })?;

        let result = self
            .webauthn
            .finish_passkey_authentication(&credential, &state)
            .map_err(|e| self.map_error(e, response))?;

        let credential_id: &[u8] = result.cred_id();
        let allowed = allow_credentials
            .iter()
            .find(|c| c.credential_id.as_bytes() == credential_id)
            .ok_or(VerificationError::UnknownCredential)?;

        // Keep the passkey's internal counter in step with the record.
        let mut passkey: Passkey = from_json(&allowed.public_key)
            .map_err(|e| VerificationError::Rejected(format!("stored passkey is unreadable: {}", e)))?;
        passkey.update_credential(&result);

        Ok(AssertionResult {
            credential_id: Base64UrlBytes::new(credential_id.to_vec()),
            sign_count: result.counter(),
            updated_public_key: Some(key_material(&passkey)?),
        })
    }
}

/// Stable WebAuthn user handle for an opaque application user id.
pub fn user_handle(user_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, user_id.as_bytes())
}

fn from_json<T: DeserializeOwned>(value: &serde_json::Value) -> Result<T, serde_json::Error> {
    T::deserialize(value)
}

/// Serialise a `Passkey` for storage. A passkey that cannot be stored rejects
/// the ceremony rather than leaving the record's key material behind.
fn key_material<T: Serialize>(passkey: &T) -> Result<serde_json::Value, VerificationError> {
    serde_json::to_value(passkey)
        .map_err(|e| VerificationError::Rejected(format!("passkey not serialisable: {}", e)))
}

/// Split a `webauthn-rs` challenge response into client options and server state.
fn issued<O: Serialize, S: Serialize>(options: &O, state: &S) -> Result<IssuedChallenge, BackendError> {
    let options = serde_json::to_value(options)
        .map_err(|e| BackendError(format!("options not serialisable: {}", e)))?;
    let public_key = options
        .get("publicKey")
        .cloned()
        .ok_or_else(|| BackendError("options carry no publicKey member".into()))?;

    let challenge = public_key
        .get("challenge")
        .and_then(|c| c.as_str())
        .ok_or_else(|| BackendError("options carry no challenge".into()))?;
    let challenge = Base64UrlBytes::decode(challenge)
        .map_err(|e| BackendError(format!("challenge is not base64url: {}", e)))?;

    let verifier_state = serde_json::to_value(state)
        .map_err(|e| BackendError(format!("ceremony state not serialisable: {}", e)))?;

    Ok(IssuedChallenge {
        challenge: challenge.as_bytes().to_vec(),
        public_key,
        verifier_state,
    })
}

/// Counter recorded inside a serialised `Passkey`, 0 when absent.
fn stored_counter(passkey: &serde_json::Value) -> u32 {
    passkey
        .pointer("/cred/counter")
        .and_then(|c| c.as_u64())
        .and_then(|c| u32::try_from(c).ok())
        .unwrap_or(0)
}

/// Origin the browser wrote into `clientDataJSON`, for diagnostics.
fn reported_origin(response: &ClientResponse) -> Option<String> {
    let encoded = response
        .as_json()
        .pointer("/response/clientDataJSON")?
        .as_str()?;
    let client_data = Base64UrlBytes::decode(encoded).ok()?;
    let client_data: serde_json::Value = serde_json::from_slice(client_data.as_bytes()).ok()?;
    client_data
        .get("origin")
        .and_then(|o| o.as_str())
        .map(str::to_string)
}
