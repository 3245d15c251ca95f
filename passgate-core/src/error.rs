use thiserror::Error;

/// Failures of the credential store itself.
///
/// A `StorageError` never means "no credential": callers treat it as a failed
/// ceremony that may be retried once the store is reachable again.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Reasons the verification library rejected a client response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("challenge does not match the issued challenge")]
    ChallengeMismatch,

    #[error("challenge expired")]
    ChallengeExpired,

    #[error("origin mismatch: expected {expected}, got {actual}")]
    OriginMismatch { expected: String, actual: String },

    #[error("relying party id mismatch")]
    RpIdMismatch,

    #[error("credential is not allowed for this ceremony")]
    UnknownCredential,

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("malformed client response: {0}")]
    MalformedResponse(String),

    #[error("rejected by verifier: {0}")]
    Rejected(String),
}

/// Terminal outcome of a failed ceremony step.
///
/// None of these are retried internally; the client restarts from
/// `begin_registration` / `begin_authentication`.
#[derive(Error, Debug)]
pub enum CeremonyError {
    #[error("user not found")]
    UserNotFound,

    #[error("no ceremony in progress")]
    NoCeremonyInProgress,

    #[error("verification failed: {0}")]
    VerificationFailed(#[from] VerificationError),

    #[error("signature counter did not advance (stored {stored}, presented {presented})")]
    StaleCounter { stored: u32, presented: u32 },

    #[error("user already has a registered credential")]
    AlreadyRegistered,

    #[error("ceremony state changed concurrently")]
    Superseded,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("verification backend error: {0}")]
    Backend(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CeremonyError {
    /// Whether the failure came from the store rather than the ceremony itself
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, CeremonyError>;
