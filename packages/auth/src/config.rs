use anyhow::{Context, Result};
use chrono::Duration;
use dotenvy::dotenv;
use std::env;

/// Authentication configuration loaded from environment variables.
///
/// All knobs default to the reference values; only `AUTH_JWT_SECRET`
/// is required.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub otp_ttl: Duration,
    pub otp_length: usize,
    pub max_otp_attempts: i32,
    /// Cooldown reported to callers as `retry_after` after a send.
    pub otp_cooldown: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: i64,
}

impl AuthConfig {
    /// Config with the reference defaults for the given signing secret.
    pub fn new(jwt_secret: impl Into<String>, jwt_issuer: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            jwt_issuer: jwt_issuer.into(),
            access_token_ttl: Duration::minutes(30),
            refresh_token_ttl: Duration::days(7),
            otp_ttl: Duration::minutes(5),
            otp_length: 6,
            max_otp_attempts: 3,
            otp_cooldown: Duration::seconds(60),
            rate_limit_window: Duration::minutes(15),
            rate_limit_max_requests: 1,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let mut config = Self::new(
            env::var("AUTH_JWT_SECRET").context("AUTH_JWT_SECRET must be set")?,
            env::var("AUTH_JWT_ISSUER").unwrap_or_else(|_| "auth-core".to_string()),
        );

        if let Some(minutes) = env_i64("AUTH_ACCESS_TOKEN_EXPIRE_MINUTES")? {
            config.access_token_ttl = Duration::minutes(minutes);
        }
        if let Some(days) = env_i64("AUTH_REFRESH_TOKEN_EXPIRE_DAYS")? {
            config.refresh_token_ttl = Duration::days(days);
        }
        if let Some(minutes) = env_i64("AUTH_OTP_EXPIRE_MINUTES")? {
            config.otp_ttl = Duration::minutes(minutes);
        }
        if let Some(length) = env_i64("AUTH_OTP_LENGTH")? {
            config.otp_length = length as usize;
        }
        if let Some(attempts) = env_i64("AUTH_MAX_OTP_ATTEMPTS")? {
            config.max_otp_attempts = attempts as i32;
        }
        if let Some(seconds) = env_i64("AUTH_OTP_COOLDOWN_SECONDS")? {
            config.otp_cooldown = Duration::seconds(seconds);
        }
        if let Some(minutes) = env_i64("AUTH_RATE_LIMIT_WINDOW_MINUTES")? {
            config.rate_limit_window = Duration::minutes(minutes);
        }
        if let Some(max) = env_i64("AUTH_RATE_LIMIT_MAX_REQUESTS")? {
            config.rate_limit_max_requests = max;
        }

        Ok(config)
    }
}

fn env_i64(name: &str) -> Result<Option<i64>> {
    match env::var(name) {
        Ok(value) => {
            let parsed = value
                .parse::<i64>()
                .with_context(|| format!("{name} must be a valid number"))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_defaults() {
        let config = AuthConfig::new("secret", "issuer");
        assert_eq!(config.access_token_ttl, Duration::minutes(30));
        assert_eq!(config.refresh_token_ttl, Duration::days(7));
        assert_eq!(config.otp_ttl, Duration::minutes(5));
        assert_eq!(config.otp_length, 6);
        assert_eq!(config.max_otp_attempts, 3);
        assert_eq!(config.rate_limit_max_requests, 1);
    }
}
