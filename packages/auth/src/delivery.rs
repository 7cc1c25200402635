//! Development delivery channel. Real SMS transport plugs in behind
//! [`BaseOtpDelivery`] from the hosting application.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::kernel::traits::BaseOtpDelivery;

/// Logs the code instead of sending it. Local development only.
#[derive(Debug, Default, Clone)]
pub struct LoggingOtpDelivery;

impl LoggingOtpDelivery {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BaseOtpDelivery for LoggingOtpDelivery {
    async fn send_code(&self, phone_number: &str, code: &str) -> Result<()> {
        info!("OTP for {}: {}", phone_number, code);
        Ok(())
    }
}
