// Mock implementations of the collaborator traits for tests.
//
// Mocks record calls and return scripted responses; integration tests
// read the captured OTP codes back out of MockOtpDelivery.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::traits::{BaseOtpDelivery, BaseUserDirectory};
use crate::user::ResolvedUser;

// =============================================================================
// Mock OTP Delivery
// =============================================================================

/// A code captured from a send_code call
#[derive(Debug, Clone)]
pub struct SentCode {
    pub phone_number: String,
    pub code: String,
}

#[derive(Default)]
pub struct MockOtpDelivery {
    sent: Arc<Mutex<Vec<SentCode>>>,
    fail_sends: bool,
}

impl MockOtpDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send_code call will return an error (the code is still
    /// captured first, mirroring a provider-side rejection).
    pub fn with_send_failure(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// All codes dispatched so far.
    pub fn sent(&self) -> Vec<SentCode> {
        self.sent.lock().unwrap().clone()
    }

    /// The most recent code dispatched to a phone number.
    pub fn last_code_for(&self, phone_number: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.phone_number == phone_number)
            .map(|s| s.code.clone())
    }
}

#[async_trait]
impl BaseOtpDelivery for MockOtpDelivery {
    async fn send_code(&self, phone_number: &str, code: &str) -> Result<()> {
        self.sent.lock().unwrap().push(SentCode {
            phone_number: phone_number.to_string(),
            code: code.to_string(),
        });
        if self.fail_sends {
            bail!("simulated delivery failure");
        }
        Ok(())
    }
}

// =============================================================================
// Mock User Directory
// =============================================================================

#[derive(Default)]
pub struct MockUserDirectory {
    users: Arc<Mutex<HashMap<String, Uuid>>>,
    profiles: Arc<Mutex<HashSet<String>>>,
    fail_lookups: bool,
}

impl MockUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register a user so find_or_create reports is_new_user = false.
    pub fn with_user(self, phone_number: &str) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(phone_number.to_string(), Uuid::new_v4());
        self
    }

    /// Mark a pre-registered phone number as having a profile.
    pub fn with_profile(self, phone_number: &str) -> Self {
        self.profiles.lock().unwrap().insert(phone_number.to_string());
        self
    }

    /// Every find_or_create call will return an error.
    pub fn with_failure(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    pub fn user_id_for(&self, phone_number: &str) -> Option<Uuid> {
        self.users.lock().unwrap().get(phone_number).copied()
    }
}

#[async_trait]
impl BaseUserDirectory for MockUserDirectory {
    async fn find_or_create(&self, phone_number: &str) -> Result<ResolvedUser> {
        if self.fail_lookups {
            bail!("simulated user directory failure");
        }

        let mut users = self.users.lock().unwrap();
        if let Some(&user_id) = users.get(phone_number) {
            let profile_exists = self.profiles.lock().unwrap().contains(phone_number);
            Ok(ResolvedUser {
                user_id,
                phone_number: phone_number.to_string(),
                is_new_user: false,
                profile_exists,
            })
        } else {
            let user_id = Uuid::new_v4();
            users.insert(phone_number.to_string(), user_id);
            Ok(ResolvedUser {
                user_id,
                phone_number: phone_number.to_string(),
                is_new_user: true,
                profile_exists: false,
            })
        }
    }
}
