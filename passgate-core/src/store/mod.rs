//! Credential store contract
//!
//! One record per user, single-record atomicity. The ceremony code always
//! commits through [`CredentialStore::swap`] so that a write based on a stale
//! read is refused instead of silently overwriting a newer transition.

mod memory;

pub use memory::MemoryCredentialStore;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::CredentialRecord;

/// Durable mapping from `user_id` to [`CredentialRecord`].
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the record for `user_id`, `Ok(None)` if there is none.
    async fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>, StorageError>;

    /// Unconditionally replace the record for `record.user_id`.
    async fn put(&self, record: &CredentialRecord) -> Result<(), StorageError>;

    /// Replace the record only if the stored version equals `expected_version`.
    ///
    /// `None` means the record must not exist yet. Returns `Ok(false)` when the
    /// stored record moved on (or appeared) in the meantime.
    async fn swap(
        &self,
        record: &CredentialRecord,
        expected_version: Option<u64>,
    ) -> Result<bool, StorageError>;

    /// Check backend connectivity (always Ok for memory)
    async fn check_health(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Whether records survive a process restart
    fn is_persistent(&self) -> bool;
}
