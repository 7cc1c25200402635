use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Discriminates access from refresh tokens.
///
/// The claim is mandatory and checked on every verification so an access
/// token can never be replayed as a refresh token or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims - data stored in the token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,          // Subject (user_id as string)
    pub phone_number: String, // Phone number (round-tripped into responses)
    pub kind: TokenKind,      // access | refresh
    pub exp: i64,             // Expiration timestamp
    pub iat: i64,             // Issued at timestamp
    pub iss: String,          // Issuer
}

/// Signs and verifies JWTs with one shared HS256 secret for both kinds.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtService {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Sign a token of the given kind expiring after `ttl`.
    pub fn sign(
        &self,
        user_id: Uuid,
        phone_number: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> AuthResult<String> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            phone_number: phone_number.to_string(),
            kind,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGenerationFailed)
    }

    /// Verify signature, expiry, issuer, and kind.
    ///
    /// Pure function of the token and secret - no store lookup. Failures map
    /// to the error family of the expected kind, so an expired refresh token
    /// reads as `RefreshTokenExpired`, never `TokenExpired`.
    pub fn verify(&self, token: &str, expected_kind: TokenKind) -> AuthResult<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let claims = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                return Err(match (e.kind(), expected_kind) {
                    (ErrorKind::ExpiredSignature, TokenKind::Access) => AuthError::TokenExpired,
                    (ErrorKind::ExpiredSignature, TokenKind::Refresh) => {
                        AuthError::RefreshTokenExpired
                    }
                    (_, TokenKind::Access) => AuthError::InvalidToken,
                    (_, TokenKind::Refresh) => AuthError::InvalidRefreshToken,
                })
            }
        };

        if claims.kind != expected_kind {
            return Err(match expected_kind {
                TokenKind::Access => AuthError::InvalidToken,
                TokenKind::Refresh => AuthError::InvalidRefreshToken,
            });
        }

        Ok(claims)
    }
}
