//! PostgreSQL credential store
//!
//! Persistent storage for multi-process deployments. The compare-and-swap is a
//! single `UPDATE ... WHERE version = $n`, so concurrent server processes see
//! exactly one winner per transition.

use async_trait::async_trait;
use passgate_core::{CredentialRecord, CredentialStore, StorageError};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{to_version, RecordColumns, RecordRow};

const SELECT_RECORD: &str = r#"
    SELECT user_id, user_name, ceremony_state, pending_challenge, credential,
           version, updated_at
    FROM credential_records
    WHERE user_id = $1
"#;

/// PostgreSQL-backed credential storage
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    /// Create a new PostgreSQL credential store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::info!(max_connections, "Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations/postgres")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
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
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                user_name = EXCLUDED.user_name,
                ceremony_state = EXCLUDED.ceremony_state,
                pending_challenge = EXCLUDED.pending_challenge,
                credential = EXCLUDED.credential,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
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
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
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
                    SET user_name = $2, ceremony_state = $3, pending_challenge = $4,
                        credential = $5, version = $6, updated_at = $7
                    WHERE user_id = $1 AND version = $8
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

impl std::fmt::Debug for PostgresCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresCredentialStore")
            .field("pool", &"<PgPool>")
            .finish()
    }
}
