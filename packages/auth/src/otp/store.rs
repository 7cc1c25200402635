use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::AuthResult;

/// One pending verification challenge for a subject.
///
/// Subjects are keyed by the SHA-256 hash of the phone number - the raw
/// number is never used as a storage key.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpRecord {
    pub phone_hash: String,
    pub code: String,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in the model
// =============================================================================

impl OtpRecord {
    /// Insert the record, overwriting any existing challenge for the subject.
    pub async fn upsert(&self, pool: &PgPool) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_codes (phone_hash, code, attempts, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (phone_hash) DO UPDATE
            SET code = EXCLUDED.code,
                attempts = EXCLUDED.attempts,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&self.phone_hash)
        .bind(&self.code)
        .bind(self.attempts)
        .bind(self.created_at)
        .bind(self.expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find the unexpired record for a subject; expired rows are invisible.
    pub async fn find_active(phone_hash: &str, pool: &PgPool) -> AuthResult<Option<Self>> {
        let record = sqlx::query_as::<_, OtpRecord>(
            "SELECT * FROM otp_codes WHERE phone_hash = $1 AND expires_at > NOW()",
        )
        .bind(phone_hash)
        .fetch_optional(pool)
        .await?;
        Ok(record)
    }

    /// Atomically bump the attempt counter, preserving the remaining TTL.
    /// Returns the count after increment, or None if the record is gone.
    pub async fn increment_attempts(phone_hash: &str, pool: &PgPool) -> AuthResult<Option<i32>> {
        let attempts = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE otp_codes SET attempts = attempts + 1
            WHERE phone_hash = $1 AND expires_at > NOW()
            RETURNING attempts
            "#,
        )
        .bind(phone_hash)
        .fetch_optional(pool)
        .await?;
        Ok(attempts)
    }

    /// Delete the record if the code matches and it is still live.
    ///
    /// The conditional DELETE is the one-time-use guarantee: concurrent
    /// verifies for the same subject serialize on this row, and exactly one
    /// caller observes `true`.
    pub async fn consume(phone_hash: &str, code: &str, pool: &PgPool) -> AuthResult<bool> {
        let result = sqlx::query(
            "DELETE FROM otp_codes WHERE phone_hash = $1 AND code = $2 AND expires_at > NOW()",
        )
        .bind(phone_hash)
        .bind(code)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(phone_hash: &str, pool: &PgPool) -> AuthResult<()> {
        sqlx::query("DELETE FROM otp_codes WHERE phone_hash = $1")
            .bind(phone_hash)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Delete expired rows. Reads already filter on `expires_at`, so this
    /// only reclaims storage; the table would otherwise grow unbounded.
    pub async fn purge_expired(pool: &PgPool) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Store abstraction
// =============================================================================

#[async_trait]
pub trait BaseOtpStore: Send + Sync {
    /// Persist a challenge, superseding any existing one for the subject.
    async fn put(&self, record: OtpRecord) -> AuthResult<()>;

    /// Fetch the live challenge for a subject. Expiry and absence are
    /// indistinguishable to callers.
    async fn get(&self, phone_hash: &str) -> AuthResult<Option<OtpRecord>>;

    /// Record a failed attempt; returns the count after increment, or None
    /// if the challenge expired in the meantime.
    async fn record_failed_attempt(&self, phone_hash: &str) -> AuthResult<Option<i32>>;

    /// One-shot consume: delete the challenge iff the code matches.
    async fn consume(&self, phone_hash: &str, code: &str) -> AuthResult<bool>;

    async fn delete(&self, phone_hash: &str) -> AuthResult<()>;

    /// Drop expired challenges; returns how many were removed. Intended
    /// for periodic housekeeping.
    async fn purge_expired(&self) -> AuthResult<u64>;
}

/// Postgres-backed OTP store (canonical deployment).
#[derive(Clone)]
pub struct PgOtpStore {
    pool: PgPool,
}

impl PgOtpStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseOtpStore for PgOtpStore {
    async fn put(&self, record: OtpRecord) -> AuthResult<()> {
        record.upsert(&self.pool).await
    }

    async fn get(&self, phone_hash: &str) -> AuthResult<Option<OtpRecord>> {
        OtpRecord::find_active(phone_hash, &self.pool).await
    }

    async fn record_failed_attempt(&self, phone_hash: &str) -> AuthResult<Option<i32>> {
        OtpRecord::increment_attempts(phone_hash, &self.pool).await
    }

    async fn consume(&self, phone_hash: &str, code: &str) -> AuthResult<bool> {
        OtpRecord::consume(phone_hash, code, &self.pool).await
    }

    async fn delete(&self, phone_hash: &str) -> AuthResult<()> {
        OtpRecord::delete(phone_hash, &self.pool).await
    }

    async fn purge_expired(&self) -> AuthResult<u64> {
        OtpRecord::purge_expired(&self.pool).await
    }
}

/// In-memory OTP store for tests and single-process development.
#[derive(Default)]
pub struct MemoryOtpStore {
    records: RwLock<HashMap<String, OtpRecord>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseOtpStore for MemoryOtpStore {
    async fn put(&self, record: OtpRecord) -> AuthResult<()> {
        let mut records = self.records.write().await;
        records.insert(record.phone_hash.clone(), record);
        Ok(())
    }

    async fn get(&self, phone_hash: &str) -> AuthResult<Option<OtpRecord>> {
        let records = self.records.read().await;
        let record = records
            .get(phone_hash)
            .filter(|r| !r.is_expired(Utc::now()))
            .cloned();
        Ok(record)
    }

    async fn record_failed_attempt(&self, phone_hash: &str) -> AuthResult<Option<i32>> {
        let mut records = self.records.write().await;
        match records.get_mut(phone_hash) {
            Some(record) if !record.is_expired(Utc::now()) => {
                record.attempts += 1;
                Ok(Some(record.attempts))
            }
            _ => Ok(None),
        }
    }

    async fn consume(&self, phone_hash: &str, code: &str) -> AuthResult<bool> {
        let mut records = self.records.write().await;
        let matches = records
            .get(phone_hash)
            .is_some_and(|r| r.code == code && !r.is_expired(Utc::now()));
        if matches {
            records.remove(phone_hash);
        }
        Ok(matches)
    }

    async fn delete(&self, phone_hash: &str) -> AuthResult<()> {
        let mut records = self.records.write().await;
        records.remove(phone_hash);
        Ok(())
    }

    async fn purge_expired(&self) -> AuthResult<u64> {
        let mut records = self.records.write().await;
        let now = Utc::now();
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Hash a phone number using SHA256.
///
/// Phone numbers are hashed before use as storage keys - raw numbers only
/// appear on the user row and inside signed claims.
pub fn hash_phone_number(phone_number: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(phone_number.as_bytes());
    format!("{:x}", hasher.finalize())
}
