use thiserror::Error;

/// Result alias for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Domain errors for the authentication core.
///
/// Every variant maps to a stable machine-readable code via [`AuthError::code`];
/// the `Display` text is the human message. External callers test against the
/// (code, message) pair, never against HTTP status numbers.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Too many OTP requests. Please wait before requesting another OTP.")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Failed to send OTP. Please try again.")]
    OtpSendFailed,

    #[error("OTP expired or not found. Please request a new OTP.")]
    OtpExpired,

    #[error("Invalid OTP. {attempts_remaining} attempts remaining.")]
    InvalidOtp { attempts_remaining: i32 },

    #[error("Maximum OTP attempts exceeded. Please request a new OTP.")]
    MaxAttemptsExceeded,

    #[error("Failed to create or retrieve user.")]
    UserCreationFailed,

    #[error("Failed to generate authentication tokens.")]
    TokenGenerationFailed,

    #[error("Token has expired.")]
    TokenExpired,

    #[error("Invalid token.")]
    InvalidToken,

    #[error("Refresh token has expired.")]
    RefreshTokenExpired,

    #[error("Invalid or expired refresh token.")]
    InvalidRefreshToken,

    #[error("Authentication required: supply a refresh token or a bearer access token.")]
    MissingAuth,

    #[error("Malformed Authorization header.")]
    InvalidAuthHeader,

    #[error("Unauthorized.")]
    Unauthorized,

    #[error("Storage backend unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Stable error code surfaced to the API layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            Self::OtpSendFailed => "OTP_SEND_FAILED",
            Self::OtpExpired => "OTP_EXPIRED",
            Self::InvalidOtp { .. } => "INVALID_OTP",
            Self::MaxAttemptsExceeded => "MAX_ATTEMPTS_EXCEEDED",
            Self::UserCreationFailed => "USER_CREATION_FAILED",
            Self::TokenGenerationFailed => "TOKEN_GENERATION_FAILED",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::RefreshTokenExpired => "REFRESH_TOKEN_EXPIRED",
            Self::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            Self::MissingAuth => "MISSING_AUTH",
            Self::InvalidAuthHeader => "INVALID_AUTH_HEADER",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Transient failures the caller may retry as-is. Domain failures
    /// (wrong code, expired token) are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            AuthError::RateLimited {
                retry_after_seconds: 60
            }
            .code(),
            "RATE_LIMIT_EXCEEDED"
        );
        assert_eq!(AuthError::OtpExpired.code(), "OTP_EXPIRED");
        assert_eq!(
            AuthError::InvalidOtp {
                attempts_remaining: 2
            }
            .code(),
            "INVALID_OTP"
        );
        assert_eq!(AuthError::MaxAttemptsExceeded.code(), "MAX_ATTEMPTS_EXCEEDED");
        assert_eq!(AuthError::InvalidRefreshToken.code(), "INVALID_REFRESH_TOKEN");
    }

    #[test]
    fn test_messages_carry_attempts_remaining() {
        let err = AuthError::InvalidOtp {
            attempts_remaining: 2,
        };
        assert_eq!(err.to_string(), "Invalid OTP. 2 attempts remaining.");
    }

    #[test]
    fn test_store_errors_are_transient() {
        let err = AuthError::StoreUnavailable(sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
        assert!(!AuthError::OtpExpired.is_transient());
    }
}
