//! SQL credential stores
//!
//! Both backends keep one row per user in `credential_records`. The pending
//! challenge and the credential descriptor are stored as JSON text; the
//! `version` column carries the compare-and-swap token.
//!
//! If `DATABASE_URL` is not set, the server falls back to the in-memory store
//! from `passgate-core` (useful for development, but credentials are lost on
//! restart).

mod postgres;
mod sqlite;

pub use postgres::PostgresCredentialStore;
pub use sqlite::SqliteCredentialStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use passgate_core::{
    CeremonyState, CredentialRecord, CredentialStore, MemoryCredentialStore, StorageError,
};

/// Open the store selected by `database_url`.
///
/// `postgres://` / `postgresql://` select PostgreSQL, `sqlite:` selects SQLite
/// and `None` (or an empty string) selects the in-memory store. Migrations are
/// run before the store is returned.
pub async fn connect(
    database_url: Option<&str>,
    max_connections: u32,
) -> Result<Arc<dyn CredentialStore>, StorageError> {
    match database_url {
        Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {
            tracing::info!("Using PostgreSQL credential storage");
            let store = PostgresCredentialStore::new(url, max_connections).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        Some(url) if url.starts_with("sqlite:") => {
            tracing::info!("Using SQLite credential storage");
            let store = SqliteCredentialStore::new(url, max_connections).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        Some(url) if !url.is_empty() => Err(StorageError::Connection(format!(
            "unsupported DATABASE_URL scheme: {}",
            url.split(':').next().unwrap_or_default()
        ))),
        _ => {
            tracing::warn!(
                "DATABASE_URL not set, using in-memory storage - credentials will be lost on restart!"
            );
            Ok(Arc::new(MemoryCredentialStore::new()))
        }
    }
}

/// Database row for credential records
#[derive(sqlx::FromRow)]
struct RecordRow {
    user_id: String,
    user_name: String,
    ceremony_state: String,
    pending_challenge: Option<String>,
    credential: Option<String>,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl RecordRow {
    fn into_record(self) -> Result<CredentialRecord, StorageError> {
        let state = CeremonyState::parse(&self.ceremony_state).ok_or_else(|| {
            StorageError::Serialization(format!(
                "unknown ceremony state '{}' for user {}",
                self.ceremony_state, self.user_id
            ))
        })?;
        let pending = self
            .pending_challenge
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let credential = self
            .credential
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let version = u64::try_from(self.version)
            .map_err(|_| StorageError::Serialization(format!("negative version {}", self.version)))?;

        Ok(CredentialRecord {
            user_id: self.user_id,
            user_name: self.user_name,
            state,
            pending,
            credential,
            version,
            updated_at: self.updated_at,
        })
    }
}

/// Column values for writing a record
struct RecordColumns<'a> {
    user_id: &'a str,
    user_name: &'a str,
    ceremony_state: &'static str,
    pending_challenge: Option<String>,
    credential: Option<String>,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl<'a> RecordColumns<'a> {
    fn from_record(record: &'a CredentialRecord) -> Result<Self, StorageError> {
        let pending_challenge = record
            .pending
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let credential = record
            .credential
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let version = i64::try_from(record.version)
            .map_err(|_| StorageError::Serialization(format!("version {} overflows", record.version)))?;

        Ok(Self {
            user_id: &record.user_id,
            user_name: &record.user_name,
            ceremony_state: record.state.as_str(),
            pending_challenge,
            credential,
            version,
            updated_at: record.updated_at,
        })
    }
}

fn to_version(expected: u64) -> Result<i64, StorageError> {
    i64::try_from(expected)
        .map_err(|_| StorageError::Serialization(format!("version {} overflows", expected)))
}
