//! Dependency container for the auth core (using traits for testability)
//!
//! Every external collaborator and store sits behind a trait so tests can
//! swap in the mocks from `test_dependencies`.

use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::kernel::traits::{BaseOtpDelivery, BaseUserDirectory};
use crate::otp::store::{BaseOtpStore, MemoryOtpStore, PgOtpStore};
use crate::rate_limit::{BaseRateLimitStore, MemoryRateLimitStore, PgRateLimitStore};
use crate::token::store::{BaseRefreshTokenStore, MemoryRefreshTokenStore, PgRefreshTokenStore};
use crate::user::PgUserDirectory;

/// Dependencies wired into [`crate::service::AuthService`].
#[derive(Clone)]
pub struct AuthDeps {
    pub otp_store: Arc<dyn BaseOtpStore>,
    pub rate_limits: Arc<dyn BaseRateLimitStore>,
    pub refresh_tokens: Arc<dyn BaseRefreshTokenStore>,
    pub delivery: Arc<dyn BaseOtpDelivery>,
    pub users: Arc<dyn BaseUserDirectory>,
    pub config: AuthConfig,
}

impl AuthDeps {
    pub fn new(
        otp_store: Arc<dyn BaseOtpStore>,
        rate_limits: Arc<dyn BaseRateLimitStore>,
        refresh_tokens: Arc<dyn BaseRefreshTokenStore>,
        delivery: Arc<dyn BaseOtpDelivery>,
        users: Arc<dyn BaseUserDirectory>,
        config: AuthConfig,
    ) -> Self {
        Self {
            otp_store,
            rate_limits,
            refresh_tokens,
            delivery,
            users,
            config,
        }
    }

    /// Canonical deployment: every store and the user directory on Postgres.
    pub fn postgres(pool: PgPool, delivery: Arc<dyn BaseOtpDelivery>, config: AuthConfig) -> Self {
        Self {
            otp_store: Arc::new(PgOtpStore::new(pool.clone())),
            rate_limits: Arc::new(PgRateLimitStore::new(pool.clone())),
            refresh_tokens: Arc::new(PgRefreshTokenStore::new(pool.clone())),
            delivery,
            users: Arc::new(PgUserDirectory::new(pool)),
            config,
        }
    }

    /// In-memory stores with a pluggable directory and delivery channel.
    /// Single-process development and tests.
    pub fn in_memory(
        delivery: Arc<dyn BaseOtpDelivery>,
        users: Arc<dyn BaseUserDirectory>,
        config: AuthConfig,
    ) -> Self {
        Self {
            otp_store: Arc::new(MemoryOtpStore::new()),
            rate_limits: Arc::new(MemoryRateLimitStore::new()),
            refresh_tokens: Arc::new(MemoryRefreshTokenStore::new()),
            delivery,
            users,
            config,
        }
    }
}
