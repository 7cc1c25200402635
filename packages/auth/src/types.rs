//! Response types surfaced to the API layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata returned after an OTP send. Never carries the code itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpIssued {
    /// Seconds until the code expires.
    pub expires_in: u64,
    /// Seconds the caller should wait before requesting another code.
    pub retry_after: u64,
}

/// A freshly signed access/refresh pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Seconds until the access token expires.
    pub expires_in: u64,
}

/// Identity carried by a verified token.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub user_id: Uuid,
    pub phone_number: String,
}

/// Result of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user_id: Uuid,
    pub is_new_user: bool,
    pub profile_exists: bool,
}

/// Result of a successful token refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user_id: Uuid,
}
