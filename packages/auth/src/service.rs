//! Auth orchestrator: composes the OTP service, token service, and user
//! directory into the login / refresh / logout flows the API layer calls.

use std::sync::Arc;
use tracing::{error, info};

use crate::error::{AuthError, AuthResult};
use crate::kernel::deps::AuthDeps;
use crate::kernel::traits::BaseUserDirectory;
use crate::otp::service::OtpService;
use crate::rate_limit::RateLimiter;
use crate::token::jwt::JwtService;
use crate::token::service::TokenService;
use crate::types::{LoginOutcome, OtpIssued, RefreshOutcome};

pub struct AuthService {
    otp: OtpService,
    tokens: TokenService,
    users: Arc<dyn BaseUserDirectory>,
}

impl AuthService {
    pub fn new(deps: AuthDeps) -> Self {
        let limiter = RateLimiter::new(deps.rate_limits.clone());
        let otp = OtpService::new(
            deps.otp_store.clone(),
            limiter,
            deps.delivery.clone(),
            deps.config.clone(),
        );
        let jwt = JwtService::new(&deps.config.jwt_secret, deps.config.jwt_issuer.clone());
        let tokens = TokenService::new(jwt, deps.refresh_tokens.clone(), deps.config.clone());

        Self {
            otp,
            tokens,
            users: deps.users,
        }
    }

    /// Generate and dispatch an OTP for the phone number.
    pub async fn request_otp(&self, phone_number: &str) -> AuthResult<OtpIssued> {
        self.otp.request_otp(phone_number).await
    }

    /// Standalone OTP verification (consumes the challenge on success).
    pub async fn verify_otp(&self, phone_number: &str, code: &str) -> AuthResult<()> {
        self.otp.verify_otp(phone_number, code).await
    }

    /// Full login: verify OTP, resolve-or-create the user, issue tokens,
    /// persist the refresh fingerprint.
    pub async fn login(&self, phone_number: &str, code: &str) -> AuthResult<LoginOutcome> {
        self.otp.verify_otp(phone_number, code).await?;

        let user = self
            .users
            .find_or_create(phone_number)
            .await
            .map_err(|e| {
                error!("Failed to resolve user for {}: {}", phone_number, e);
                AuthError::UserCreationFailed
            })?;

        let tokens = self.tokens.issue_pair(user.user_id, phone_number)?;
        // Fail-open by design: a storage error here is logged inside and
        // does not roll back the issued tokens.
        self.tokens
            .persist_refresh_token(user.user_id, &tokens.refresh_token)
            .await;

        info!("Login completed for user {}", user.user_id);
        Ok(LoginOutcome {
            tokens,
            user_id: user.user_id,
            is_new_user: user.is_new_user,
            profile_exists: user.profile_exists,
        })
    }

    /// Rotate a refresh token into a new pair. The stored fingerprint is
    /// overwritten, so the presented token becomes unusable.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshOutcome> {
        let identity = self.tokens.verify_refresh_token(refresh_token).await?;

        let tokens = self
            .tokens
            .issue_pair(identity.user_id, &identity.phone_number)?;
        self.tokens
            .persist_refresh_token(identity.user_id, &tokens.refresh_token)
            .await;

        Ok(RefreshOutcome {
            tokens,
            user_id: identity.user_id,
        })
    }

    /// Revoke refresh tokens. With an explicit refresh token only that
    /// record is revoked; with a bearer access token every session for the
    /// resolved user is revoked.
    pub async fn logout(
        &self,
        refresh_token: Option<&str>,
        authorization: Option<&str>,
    ) -> AuthResult<()> {
        if let Some(token) = refresh_token {
            self.tokens.revoke_specific(token).await
        } else if let Some(header) = authorization {
            let token = bearer_token(header)?;
            let identity = self
                .tokens
                .verify_access_token(token)
                .map_err(|_| AuthError::Unauthorized)?;
            self.tokens.revoke_all_for_user(identity.user_id).await
        } else {
            Err(AuthError::MissingAuth)
        }
    }

    /// Housekeeping: drop expired OTP challenges and elapsed rate-limit
    /// windows. Reads filter both out already, so hosts can schedule this
    /// however they like; returns the number of rows reclaimed.
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        self.otp.purge_expired().await
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
fn bearer_token(header: &str) -> AuthResult<&str> {
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or(AuthError::InvalidAuthHeader)?;
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}
