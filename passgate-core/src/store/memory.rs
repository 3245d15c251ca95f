//! In-memory credential store
//!
//! Development and test backend. Records are lost on restart.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::CredentialStore;
use crate::error::StorageError;
use crate::record::CredentialRecord;

/// Thread-safe in-memory credential storage
#[derive(Default)]
pub struct MemoryCredentialStore {
    records: DashMap<String, CredentialRecord>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>, StorageError> {
        Ok(self.records.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn put(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        self.records.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn swap(
        &self,
        record: &CredentialRecord,
        expected_version: Option<u64>,
    ) -> Result<bool, StorageError> {
        // The entry guard holds the shard lock for the whole compare-and-replace.
        match (self.records.entry(record.user_id.clone()), expected_version) {
            (Entry::Vacant(slot), None) => {
                slot.insert(record.clone());
                Ok(true)
            }
            (Entry::Occupied(mut slot), Some(expected)) if slot.get().version == expected => {
                slot.insert(record.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCredentialStore")
            .field("records", &self.records.len())
            .finish()
    }
}
