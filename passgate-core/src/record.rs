//! Credential records and ceremony descriptors.
//!
//! A [`CredentialRecord`] is the single unit of storage: one per user, fully
//! replaced on every write. The [`CeremonyState`] field together with the
//! presence of `pending` and `credential` encodes where the user is in the
//! registration / authentication lifecycle.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CeremonyError;

/// Minimum challenge length accepted from the verification library.
pub const MIN_CHALLENGE_BYTES: usize = 16;

/// Opaque user identifier plus a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub user_name: String,
}

impl UserIdentity {
    /// Build an identity, rejecting empty fields.
    pub fn new(user_id: &str, user_name: &str) -> Result<Self, CeremonyError> {
        if user_id.trim().is_empty() {
            return Err(CeremonyError::InvalidInput("user_id is required".into()));
        }
        if user_name.trim().is_empty() {
            return Err(CeremonyError::InvalidInput("user_name is required".into()));
        }
        Ok(Self {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
        })
    }
}

/// Where a user currently is in the credential lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeremonyState {
    #[default]
    NoCredential,
    PendingRegistration,
    Registered,
    PendingAuthentication,
}

impl CeremonyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::PendingRegistration => "pending_registration",
            Self::Registered => "registered",
            Self::PendingAuthentication => "pending_authentication",
        }
    }

    /// Parse the stored column value; unknown values are treated as corrupt.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "no_credential" => Some(Self::NoCredential),
            "pending_registration" => Some(Self::PendingRegistration),
            "registered" => Some(Self::Registered),
            "pending_authentication" => Some(Self::PendingAuthentication),
            _ => None,
        }
    }

    /// States in which a confirmed credential descriptor is held
    pub fn has_credential(&self) -> bool {
        matches!(self, Self::Registered | Self::PendingAuthentication)
    }
}

impl std::fmt::Display for CeremonyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two ceremony types a challenge can be issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

impl CeremonyKind {
    /// State a record is in while a challenge of this kind is outstanding
    pub fn pending_state(&self) -> CeremonyState {
        match self {
            Self::Registration => CeremonyState::PendingRegistration,
            Self::Authentication => CeremonyState::PendingAuthentication,
        }
    }
}

impl std::fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registration => f.write_str("registration"),
            Self::Authentication => f.write_str("authentication"),
        }
    }
}

/// Raw bytes carried on the wire as unpadded base64url.
///
/// Used for challenges and credential ids. The encoding is canonical, so
/// decoding what was encoded always yields the identical byte sequence.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Base64UrlBytes(Vec<u8>);

impl Base64UrlBytes {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.0)
    }

    /// Decode unpadded base64url. Trailing `=` padding is tolerated.
    pub fn decode(encoded: &str) -> Result<Self, base64::DecodeError> {
        URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map(Self)
    }
}

impl From<Vec<u8>> for Base64UrlBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Base64UrlBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Byte contents stay out of logs.
impl std::fmt::Debug for Base64UrlBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Base64UrlBytes({} bytes)", self.0.len())
    }
}

impl Serialize for Base64UrlBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Base64UrlBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::decode(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Challenge descriptor handed to the client.
///
/// `public_key` is the options object for `navigator.credentials.create()` /
/// `navigator.credentials.get()`; it embeds the same challenge as `challenge`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeDescriptor {
    pub ceremony: CeremonyKind,
    pub user_id: String,
    pub challenge: Base64UrlBytes,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub public_key: serde_json::Value,
}

impl ChallengeDescriptor {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Server-side half of an outstanding challenge.
///
/// `verifier_state` is whatever the verification library needs to check the
/// response later. It never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChallenge {
    pub descriptor: ChallengeDescriptor,
    pub verifier_state: serde_json::Value,
}

impl PendingChallenge {
    pub fn kind(&self) -> CeremonyKind {
        self.descriptor.ceremony
    }

    pub fn challenge(&self) -> &[u8] {
        self.descriptor.challenge.as_bytes()
    }
}

/// A confirmed public-key credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialDescriptor {
    pub credential_id: Base64UrlBytes,
    /// Public key material in whatever form the verification library keeps it
    pub public_key: serde_json::Value,
    pub sign_count: u32,
    pub registered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Everything the store keeps for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user_id: String,
    pub user_name: String,
    pub state: CeremonyState,
    pub pending: Option<PendingChallenge>,
    pub credential: Option<CredentialDescriptor>,
    /// Incremented on every committed write; used for compare-and-swap
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Fresh record with no credential and no outstanding challenge.
    pub fn new(identity: &UserIdentity) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            user_name: identity.user_name.clone(),
            state: CeremonyState::NoCredential,
            pending: None,
            credential: None,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
        }
    }

    /// Store `pending` as the only outstanding challenge, superseding any
    /// earlier one.
    pub fn with_pending(&self, pending: PendingChallenge) -> Self {
        let mut next = self.next_version();
        next.state = pending.kind().pending_state();
        if next.state == CeremonyState::PendingRegistration {
            next.credential = None;
        }
        next.pending = Some(pending);
        next
    }

    /// Successful registration: the verified credential replaces anything held.
    pub fn registered(&self, credential: CredentialDescriptor) -> Self {
        let mut next = self.next_version();
        next.state = CeremonyState::Registered;
        next.pending = None;
        next.credential = Some(credential);
        next
    }

    /// Failed registration: nothing confirmed survives.
    pub fn registration_failed(&self) -> Self {
        let mut next = self.next_version();
        next.state = CeremonyState::NoCredential;
        next.pending = None;
        next.credential = None;
        next
    }

    /// End of a login attempt. The credential is kept either way; `credential`
    /// carries the advanced counter on success.
    pub fn authentication_finished(&self, credential: Option<CredentialDescriptor>) -> Self {
        let mut next = self.next_version();
        next.state = CeremonyState::Registered;
        next.pending = None;
        if let Some(credential) = credential {
            next.credential = Some(credential);
        }
        next
    }

    fn next_version(&self) -> Self {
        let mut next = self.clone();
        next.version = self.version + 1;
        next.updated_at = Utc::now();
        next
    }
}
