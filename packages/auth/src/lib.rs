//! Phone-number authentication core.
//!
//! Implements OTP issuance and verification with rate limiting, user
//! resolution by phone number, and JWT access/refresh lifecycle with
//! store-backed revocation. The HTTP layer, SMS provider, and profile
//! data live outside this crate and plug in through the `Base*` traits
//! in [`kernel::traits`].

pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod kernel;
pub mod otp;
pub mod rate_limit;
pub mod service;
pub mod token;
pub mod types;
pub mod user;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use kernel::deps::AuthDeps;
pub use service::AuthService;
