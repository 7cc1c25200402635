//! Canonical identity keyed by phone number.
//!
//! The auth core treats users as an external collaborator behind
//! [`BaseUserDirectory`]; `PgUserDirectory` is the stock implementation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::AuthResult;
use crate::kernel::traits::BaseUserDirectory;

/// Identity resolved (or created) for a verified phone number.
#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub user_id: Uuid,
    pub phone_number: String,
    pub is_new_user: bool,
    pub profile_exists: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub phone_number: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

// =============================================================================
// SQL Queries - ALL queries must be in the model
// =============================================================================

impl User {
    pub async fn find_by_phone(phone_number: &str, pool: &PgPool) -> AuthResult<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE phone_number = $1")
            .bind(phone_number)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    /// Create a user marked verified - callers only reach this after a
    /// successful OTP check.
    pub async fn create_verified(phone_number: &str, pool: &PgPool) -> AuthResult<Self> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (phone_number, is_verified, last_login)
            VALUES ($1, TRUE, NOW())
            RETURNING *
            "#,
        )
        .bind(phone_number)
        .fetch_one(pool)
        .await?;
        Ok(user)
    }

    pub async fn touch_last_login(user_id: Uuid, pool: &PgPool) -> AuthResult<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn profile_exists(user_id: Uuid, pool: &PgPool) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_profiles WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }
}

/// Postgres-backed user directory.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseUserDirectory for PgUserDirectory {
    async fn find_or_create(&self, phone_number: &str) -> Result<ResolvedUser> {
        match User::find_by_phone(phone_number, &self.pool).await? {
            Some(user) => {
                User::touch_last_login(user.user_id, &self.pool).await?;
                let profile_exists = User::profile_exists(user.user_id, &self.pool).await?;
                Ok(ResolvedUser {
                    user_id: user.user_id,
                    phone_number: user.phone_number,
                    is_new_user: false,
                    profile_exists,
                })
            }
            None => {
                let user = User::create_verified(phone_number, &self.pool).await?;
                info!("New user created: {}", user.user_id);
                Ok(ResolvedUser {
                    user_id: user.user_id,
                    phone_number: user.phone_number,
                    is_new_user: true,
                    profile_exists: false,
                })
            }
        }
    }
}
