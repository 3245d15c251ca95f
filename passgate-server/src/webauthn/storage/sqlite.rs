//! SQLite credential store
//!
//! The single-file deployment option. `sqlite::memory:` works for tests as
//! long as the pool keeps exactly one connection alive.

use std::str::FromStr;

use async_trait::async_trait;
use passgate_core::{CredentialRecord, CredentialStore, StorageError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use super::{to_version, RecordColumns, RecordRow};

const SELECT_RECORD: &str = r#"
    SELECT user_id, user_name, ceremony_state, pending_challenge, credential,
           version, updated_at
    FROM credential_records
    WHERE user_id = ?1
"#;

/// SQLite-backed credential storage
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Open (creating if missing) the database at `database_url`.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .create_if_missing(true);

        // Every connection to `:memory:` is a separate database.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::info!(max_connections, "Opened SQLite database");
        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>, StorageError> {
        let row = sqlx::query_as::<_, RecordRow>(SELECT_RECORD)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        row.map(RecordRow::into_record).transpose()
    }

    async fn put(&self, record: &CredentialRecord) -> Result<(), StorageError> {
        let columns = RecordColumns::from_record(record)?;

        sqlx::query(
            r#"
            INSERT INTO credential_records
                (user_id, user_name, ceremony_state, pending_challenge, credential,
                 version, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (user_id) DO UPDATE SET
                user_name = excluded.user_name,
                ceremony_state = excluded.ceremony_state,
                pending_challenge = excluded.pending_challenge,
                credential = excluded.credential,
                version = excluded.version,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(columns.user_id)
        .bind(columns.user_name)
        .bind(columns.ceremony_state)
        .bind(columns.pending_challenge)
        .bind(columns.credential)
        .bind(columns.version)
        .bind(columns.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    async fn swap(
        &self,
        record: &CredentialRecord,
        expected_version: Option<u64>,
    ) -> Result<bool, StorageError> {
        let columns = RecordColumns::from_record(record)?;

        let result = match expected_version {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO credential_records
                        (user_id, user_name, ceremony_state, pending_challenge, credential,
                         version, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT (user_id) DO NOTHING
                    "#,
                )
                .bind(columns.user_id)
                .bind(columns.user_name)
                .bind(columns.ceremony_state)
                .bind(columns.pending_challenge)
                .bind(columns.credential)
                .bind(columns.version)
                .bind(columns.updated_at)
                .execute(&self.pool)
                .await
            }
            Some(expected) => {
                sqlx::query(
                    r#"
                    UPDATE credential_records
                    SET user_name = ?2, ceremony_state = ?3, pending_challenge = ?4,
                        credential = ?5, version = ?6, updated_at = ?7
                    WHERE user_id = ?1 AND version = ?8
                    "#,
                )
                .bind(columns.user_id)
                .bind(columns.user_name)
                .bind(columns.ceremony_state)
                .bind(columns.pending_challenge)
                .bind(columns.credential)
                .bind(columns.version)
                .bind(columns.updated_at)
                .bind(to_version(expected)?)
                .execute(&self.pool)
                .await
            }
        }
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for SqliteCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCredentialStore")
            .field("pool", &"<SqlitePool>")
            .finish()
    }
}
