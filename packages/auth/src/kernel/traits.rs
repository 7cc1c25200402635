// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic. The OTP and
// token state machines live in their services; these traits cover the
// external collaborators the core depends on but does not own.
//
// Naming convention: Base* for trait names (e.g., BaseOtpDelivery)

use anyhow::Result;
use async_trait::async_trait;

use crate::user::ResolvedUser;

// =============================================================================
// OTP Delivery Channel (Infrastructure - SMS or other out-of-band transport)
// =============================================================================

#[async_trait]
pub trait BaseOtpDelivery: Send + Sync {
    /// Deliver a one-time code to the subject's phone number.
    ///
    /// Failures here are logged and swallowed by the OTP service: the code
    /// stays stored and verifiable, and the provider can retry out of band.
    async fn send_code(&self, phone_number: &str, code: &str) -> Result<()>;
}

// =============================================================================
// User Directory (Infrastructure - identity keyed by phone number)
// =============================================================================

#[async_trait]
pub trait BaseUserDirectory: Send + Sync {
    /// Fetch the user for a verified phone number, creating one on first login.
    ///
    /// Returned ids are opaque to the core; `is_new_user` / `profile_exists`
    /// flow through to the login response untouched.
    async fn find_or_create(&self, phone_number: &str) -> Result<ResolvedUser>;
}
