//! Access/refresh JWT lifecycle: issuance, verification, and store-backed
//! revocation of refresh tokens.

pub mod jwt;
pub mod service;
pub mod store;

pub use jwt::{Claims, JwtService, TokenKind};
pub use service::TokenService;
pub use store::{
    fingerprint, BaseRefreshTokenStore, MemoryRefreshTokenStore, PgRefreshTokenStore,
    RefreshTokenRecord,
};
