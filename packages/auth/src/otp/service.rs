use rand::rngs::OsRng;
use rand::Rng;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::kernel::traits::BaseOtpDelivery;
use crate::otp::store::{hash_phone_number, BaseOtpStore, OtpRecord};
use crate::rate_limit::RateLimiter;
use crate::types::OtpIssued;

/// Rate-limiter operation key for OTP sends.
const OTP_SEND_OPERATION: &str = "otp-send";

/// Orchestrates OTP generation, delivery dispatch, and verification.
pub struct OtpService {
    store: Arc<dyn BaseOtpStore>,
    limiter: RateLimiter,
    delivery: Arc<dyn BaseOtpDelivery>,
    config: AuthConfig,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn BaseOtpStore>,
        limiter: RateLimiter,
        delivery: Arc<dyn BaseOtpDelivery>,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            limiter,
            delivery,
            config,
        }
    }

    /// Generate and dispatch a new OTP for the subject.
    ///
    /// A new challenge supersedes any unexpired one. Delivery failure is
    /// logged but does not fail the request - the stored code stays
    /// verifiable and delivery can be retried out of band.
    pub async fn request_otp(&self, phone_number: &str) -> AuthResult<OtpIssued> {
        let decision = self
            .limiter
            .admit(
                phone_number,
                OTP_SEND_OPERATION,
                self.config.rate_limit_window,
                self.config.rate_limit_max_requests,
            )
            .await?;
        if !decision.allowed {
            info!("OTP request rate limited for {}", phone_number);
            // The hint tracks the denying window, not the send cooldown:
            // retrying sooner would just be denied again.
            return Err(AuthError::RateLimited {
                retry_after_seconds: decision.retry_after_seconds,
            });
        }

        let code = generate_code(self.config.otp_length);
        let now = chrono::Utc::now();
        let record = OtpRecord {
            phone_hash: hash_phone_number(phone_number),
            code: code.clone(),
            attempts: 0,
            created_at: now,
            expires_at: now + self.config.otp_ttl,
        };
        self.store.put(record).await?;

        if let Err(e) = self.delivery.send_code(phone_number, &code).await {
            // Intentional fail-open: the code remains valid even if the
            // provider rejected the dispatch.
            error!("Failed to send OTP to {}: {}", phone_number, e);
        } else {
            info!("OTP sent successfully to {}", phone_number);
        }

        Ok(OtpIssued {
            expires_in: self.config.otp_ttl.num_seconds() as u64,
            retry_after: self.config.otp_cooldown.num_seconds() as u64,
        })
    }

    /// Verify a submitted code against the subject's pending challenge.
    ///
    /// Success consumes the challenge; replaying the same code afterwards
    /// fails as expired/not-found.
    pub async fn verify_otp(&self, phone_number: &str, code: &str) -> AuthResult<()> {
        let phone_hash = hash_phone_number(phone_number);

        let record = self
            .store
            .get(&phone_hash)
            .await?
            .ok_or(AuthError::OtpExpired)?;

        // Attempt ceiling is enforced before the code is even looked at.
        if record.attempts >= self.config.max_otp_attempts {
            self.store.delete(&phone_hash).await?;
            warn!("Max OTP attempts exceeded for {}", phone_number);
            return Err(AuthError::MaxAttemptsExceeded);
        }

        if record.code != code {
            let attempts = self
                .store
                .record_failed_attempt(&phone_hash)
                .await?
                .ok_or(AuthError::OtpExpired)?;
            let attempts_remaining = (self.config.max_otp_attempts - attempts).max(0);
            warn!(
                "Invalid OTP for {} ({} attempts remaining)",
                phone_number, attempts_remaining
            );
            return Err(AuthError::InvalidOtp { attempts_remaining });
        }

        // Challenge may have expired or been consumed since the read; the
        // store's conditional delete decides the winner.
        if !self.store.consume(&phone_hash, code).await? {
            return Err(AuthError::OtpExpired);
        }

        info!("OTP verified successfully for {}", phone_number);
        Ok(())
    }

    /// Reclaim storage: drop expired challenges and elapsed rate-limit
    /// windows. Reads never see either, so this can run on any schedule.
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        let challenges = self.store.purge_expired().await?;
        let windows = self
            .limiter
            .purge_stale(self.config.rate_limit_window)
            .await?;
        if challenges + windows > 0 {
            info!(
                "Purged {} expired OTP challenges and {} stale rate-limit windows",
                challenges, windows
            );
        }
        Ok(challenges + windows)
    }
}

/// Generate a fixed-length numeric code from the OS CSPRNG.
fn generate_code(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
