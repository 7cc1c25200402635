use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::token::jwt::{Claims, JwtService, TokenKind};
use crate::token::store::{fingerprint, BaseRefreshTokenStore, RefreshTokenRecord};
use crate::types::{TokenIdentity, TokenPair};

/// Issues, verifies, and revokes access/refresh token pairs.
///
/// Access tokens are stateless; refresh tokens are additionally checked
/// against the persisted fingerprint record, which is what makes
/// revocation possible despite JWTs being otherwise stateless.
pub struct TokenService {
    jwt: JwtService,
    store: Arc<dyn BaseRefreshTokenStore>,
    config: AuthConfig,
}

impl TokenService {
    pub fn new(jwt: JwtService, store: Arc<dyn BaseRefreshTokenStore>, config: AuthConfig) -> Self {
        Self { jwt, store, config }
    }

    /// Build a signed access/refresh pair for the user.
    pub fn issue_pair(&self, user_id: Uuid, phone_number: &str) -> AuthResult<TokenPair> {
        let access_token =
            self.jwt
                .sign(user_id, phone_number, TokenKind::Access, self.config.access_token_ttl)?;
        let refresh_token = self.jwt.sign(
            user_id,
            phone_number,
            TokenKind::Refresh,
            self.config.refresh_token_ttl,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
            expires_in: self.config.access_token_ttl.num_seconds() as u64,
        })
    }

    /// Persist the fingerprint record for a freshly issued refresh token.
    ///
    /// Fails open: a storage error is logged and swallowed, since the
    /// already-issued access token remains valid either way.
    pub async fn persist_refresh_token(&self, user_id: Uuid, refresh_token: &str) {
        let now = Utc::now();
        let record = RefreshTokenRecord {
            user_id,
            token_hash: fingerprint(refresh_token),
            issued_at: now,
            expires_at: now + self.config.refresh_token_ttl,
        };

        if let Err(e) = self.store.put(record).await {
            error!("Failed to store refresh token for user {}: {}", user_id, e);
        }
    }

    /// Verify an access token. Pure signature/expiry/kind check.
    pub fn verify_access_token(&self, token: &str) -> AuthResult<TokenIdentity> {
        let claims = self.jwt.verify(token, TokenKind::Access)?;
        identity_from(&claims, AuthError::InvalidToken)
    }

    /// Verify a refresh token: signature/expiry/kind, then the fingerprint
    /// record. The store check always runs; a signed token whose record was
    /// rotated away or revoked is rejected.
    pub async fn verify_refresh_token(&self, token: &str) -> AuthResult<TokenIdentity> {
        let claims = self.jwt.verify(token, TokenKind::Refresh)?;
        let identity = identity_from(&claims, AuthError::InvalidRefreshToken)?;

        let record = self
            .store
            .find_valid(&fingerprint(token))
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        if record.user_id != identity.user_id {
            return Err(AuthError::InvalidRefreshToken);
        }

        Ok(identity)
    }

    /// Revoke every refresh token for the user. Idempotent.
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> AuthResult<()> {
        self.store.revoke_user(user_id).await?;
        info!("Revoked refresh tokens for user {}", user_id);
        Ok(())
    }

    /// Revoke only the given refresh token by fingerprint. Idempotent.
    pub async fn revoke_specific(&self, refresh_token: &str) -> AuthResult<()> {
        self.store.revoke_fingerprint(&fingerprint(refresh_token)).await
    }
}

fn identity_from(claims: &Claims, invalid: AuthError) -> AuthResult<TokenIdentity> {
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| invalid)?;
    Ok(TokenIdentity {
        user_id,
        phone_number: claims.phone_number.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::store::MemoryRefreshTokenStore;

    fn service() -> TokenService {
        let config = AuthConfig::new("test-secret", "test-issuer");
        TokenService::new(
            JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()),
            Arc::new(MemoryRefreshTokenStore::new()),
            config,
        )
    }

    #[tokio::test]
    async fn test_issue_verify_round_trip() {
        let service = service();
        let user_id = Uuid::new_v4();

        let pair = service.issue_pair(user_id, "+15551234567").unwrap();
        assert_eq!(pair.token_type, "bearer");
        assert_eq!(pair.expires_in, 30 * 60);

        let identity = service.verify_access_token(&pair.access_token).unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.phone_number, "+15551234567");

        service.persist_refresh_token(user_id, &pair.refresh_token).await;
        let identity = service.verify_refresh_token(&pair.refresh_token).await.unwrap();
        assert_eq!(identity.user_id, user_id);
    }

    #[tokio::test]
    async fn test_refresh_token_without_record_is_invalid() {
        let service = service();
        let pair = service.issue_pair(Uuid::new_v4(), "+15551234567").unwrap();

        // Signature and expiry alone would pass; the missing record rejects it
        let result = service.verify_refresh_token(&pair.refresh_token).await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_revoke_all_invalidates_persisted_refresh_token() {
        let service = service();
        let user_id = Uuid::new_v4();

        let pair = service.issue_pair(user_id, "+15551234567").unwrap();
        service.persist_refresh_token(user_id, &pair.refresh_token).await;
        service.verify_refresh_token(&pair.refresh_token).await.unwrap();

        service.revoke_all_for_user(user_id).await.unwrap();
        let result = service.verify_refresh_token(&pair.refresh_token).await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_revoke_specific_only_hits_matching_token() {
        let service = service();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();

        let pair_a = service.issue_pair(user_a, "+15551234567").unwrap();
        let pair_b = service.issue_pair(user_b, "+15559876543").unwrap();
        service.persist_refresh_token(user_a, &pair_a.refresh_token).await;
        service.persist_refresh_token(user_b, &pair_b.refresh_token).await;

        service.revoke_specific(&pair_a.refresh_token).await.unwrap();

        assert!(service.verify_refresh_token(&pair_a.refresh_token).await.is_err());
        assert!(service.verify_refresh_token(&pair_b.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_access_token_cannot_act_as_refresh_token() {
        let service = service();
        let user_id = Uuid::new_v4();
        let pair = service.issue_pair(user_id, "+15551234567").unwrap();
        service.persist_refresh_token(user_id, &pair.refresh_token).await;

        let result = service.verify_refresh_token(&pair.access_token).await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));

        let result = service.verify_access_token(&pair.refresh_token);
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }
}
