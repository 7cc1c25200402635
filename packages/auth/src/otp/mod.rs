//! OTP challenge lifecycle: one active code per subject, attempt-limited,
//! expiring, consumed exactly once.

pub mod service;
pub mod store;

pub use service::OtpService;
pub use store::{hash_phone_number, BaseOtpStore, MemoryOtpStore, OtpRecord, PgOtpStore};
