use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AuthResult;

/// Persistent proof that a refresh token was legitimately issued and not
/// yet revoked. Only the SHA-256 fingerprint of the token is stored.
///
/// One active record per user: issuing a new pair overwrites the previous
/// record, which invalidates the old refresh token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in the model
// =============================================================================

impl RefreshTokenRecord {
    /// Upsert the single record for the user (rotation overwrites).
    pub async fn upsert(&self, pool: &PgPool) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, issued_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                issued_at = EXCLUDED.issued_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(self.user_id)
        .bind(&self.token_hash)
        .bind(self.issued_at)
        .bind(self.expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find a live record by fingerprint.
    pub async fn find_valid(token_hash: &str, pool: &PgPool) -> AuthResult<Option<Self>> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT * FROM refresh_tokens WHERE token_hash = $1 AND expires_at > NOW()",
        )
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;
        Ok(record)
    }

    pub async fn delete_for_user(user_id: Uuid, pool: &PgPool) -> AuthResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete_by_hash(token_hash: &str, pool: &PgPool) -> AuthResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Store abstraction
// =============================================================================

#[async_trait]
pub trait BaseRefreshTokenStore: Send + Sync {
    /// Store/overwrite the record for the user.
    async fn put(&self, record: RefreshTokenRecord) -> AuthResult<()>;

    /// Find a non-revoked, non-expired record matching the fingerprint.
    async fn find_valid(&self, token_hash: &str) -> AuthResult<Option<RefreshTokenRecord>>;

    /// Revoke all records for the user. Idempotent.
    async fn revoke_user(&self, user_id: Uuid) -> AuthResult<()>;

    /// Revoke only the record with this fingerprint. Idempotent.
    async fn revoke_fingerprint(&self, token_hash: &str) -> AuthResult<()>;
}

/// Postgres-backed refresh token store (canonical deployment).
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseRefreshTokenStore for PgRefreshTokenStore {
    async fn put(&self, record: RefreshTokenRecord) -> AuthResult<()> {
        record.upsert(&self.pool).await
    }

    async fn find_valid(&self, token_hash: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        RefreshTokenRecord::find_valid(token_hash, &self.pool).await
    }

    async fn revoke_user(&self, user_id: Uuid) -> AuthResult<()> {
        RefreshTokenRecord::delete_for_user(user_id, &self.pool).await
    }

    async fn revoke_fingerprint(&self, token_hash: &str) -> AuthResult<()> {
        RefreshTokenRecord::delete_by_hash(token_hash, &self.pool).await
    }
}

/// In-memory refresh token store for tests and single-process development.
#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    records: RwLock<HashMap<Uuid, RefreshTokenRecord>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseRefreshTokenStore for MemoryRefreshTokenStore {
    async fn put(&self, record: RefreshTokenRecord) -> AuthResult<()> {
        let mut records = self.records.write().await;
        records.insert(record.user_id, record);
        Ok(())
    }

    async fn find_valid(&self, token_hash: &str) -> AuthResult<Option<RefreshTokenRecord>> {
        let records = self.records.read().await;
        let now = Utc::now();
        let record = records
            .values()
            .find(|r| r.token_hash == token_hash && !r.is_expired(now))
            .cloned();
        Ok(record)
    }

    async fn revoke_user(&self, user_id: Uuid) -> AuthResult<()> {
        let mut records = self.records.write().await;
        records.remove(&user_id);
        Ok(())
    }

    async fn revoke_fingerprint(&self, token_hash: &str) -> AuthResult<()> {
        let mut records = self.records.write().await;
        records.retain(|_, r| r.token_hash != token_hash);
        Ok(())
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// One-way fingerprint of a token string (SHA-256 hex).
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
