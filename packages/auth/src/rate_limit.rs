//! Fixed-window rate limiting keyed by (subject, operation).
//!
//! The limiter has no HTTP semantics; denial is signaled by the `allowed`
//! flag on [`RateDecision`], never by an error.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::AuthResult;

/// Counter state observed by an increment.
#[derive(Debug, Clone, Copy)]
pub struct WindowUsage {
    pub count: i64,
    pub window_start: DateTime<Utc>,
}

/// Outcome of counting a request against a window.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    /// Seconds until the denying window resets. Zero when allowed.
    pub retry_after_seconds: u64,
}

#[async_trait]
pub trait BaseRateLimitStore: Send + Sync {
    /// Atomically increment the counter for (subject, operation), first
    /// resetting it if the window has elapsed. Returns the count after the
    /// increment together with the window start. Must be a single
    /// read-modify-write on the backing store: two concurrent callers must
    /// never both observe count == 1.
    async fn increment(
        &self,
        subject: &str,
        operation: &str,
        window: Duration,
    ) -> AuthResult<WindowUsage>;

    /// Drop counters whose window has elapsed. Idempotent; a deleted
    /// counter and a reset counter are indistinguishable to `increment`.
    async fn purge_stale(&self, window: Duration) -> AuthResult<u64>;
}

/// Window-based request limiter over an atomic counter store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn BaseRateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn BaseRateLimitStore>) -> Self {
        Self { store }
    }

    /// Count this request and report whether it fits inside the window.
    /// On denial the decision carries the seconds left until the window
    /// that denied the request resets.
    pub async fn admit(
        &self,
        subject: &str,
        operation: &str,
        window: Duration,
        max_requests: i64,
    ) -> AuthResult<RateDecision> {
        let usage = self.store.increment(subject, operation, window).await?;
        let allowed = usage.count <= max_requests;
        let retry_after_seconds = if allowed {
            0
        } else {
            (usage.window_start + window - Utc::now())
                .num_seconds()
                .max(0) as u64
        };
        Ok(RateDecision {
            allowed,
            retry_after_seconds,
        })
    }

    /// Drop counters whose window has elapsed. Intended for periodic
    /// housekeeping alongside the OTP purge.
    pub async fn purge_stale(&self, window: Duration) -> AuthResult<u64> {
        self.store.purge_stale(window).await
    }
}

// =============================================================================
// Postgres store
// =============================================================================

/// Counter store backed by a single upsert-returning statement, so the
/// increment is atomic across processes.
#[derive(Clone)]
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseRateLimitStore for PgRateLimitStore {
    async fn increment(
        &self,
        subject: &str,
        operation: &str,
        window: Duration,
    ) -> AuthResult<WindowUsage> {
        let (count, window_start) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            r#"
            INSERT INTO rate_limits (subject, operation, count, window_start)
            VALUES ($1, $2, 1, NOW())
            ON CONFLICT (subject, operation) DO UPDATE
            SET count = CASE
                    WHEN rate_limits.window_start <= NOW() - make_interval(secs => $3)
                    THEN 1
                    ELSE rate_limits.count + 1
                END,
                window_start = CASE
                    WHEN rate_limits.window_start <= NOW() - make_interval(secs => $3)
                    THEN NOW()
                    ELSE rate_limits.window_start
                END
            RETURNING count, window_start
            "#,
        )
        .bind(subject)
        .bind(operation)
        .bind(window.num_seconds() as f64)
        .fetch_one(&self.pool)
        .await?;
        Ok(WindowUsage {
            count,
            window_start,
        })
    }

    async fn purge_stale(&self, window: Duration) -> AuthResult<u64> {
        let result = sqlx::query(
            "DELETE FROM rate_limits WHERE window_start <= NOW() - make_interval(secs => $1)",
        )
        .bind(window.num_seconds() as f64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// In-memory store
// =============================================================================

struct WindowCounter {
    count: i64,
    window_start: DateTime<Utc>,
}

/// In-memory counter store for tests and single-process development.
/// The single mutex makes the increment atomic.
#[derive(Default)]
pub struct MemoryRateLimitStore {
    counters: Mutex<HashMap<(String, String), WindowCounter>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseRateLimitStore for MemoryRateLimitStore {
    async fn increment(
        &self,
        subject: &str,
        operation: &str,
        window: Duration,
    ) -> AuthResult<WindowUsage> {
        let mut counters = self.counters.lock().expect("rate limit mutex poisoned");
        let now = Utc::now();
        let counter = counters
            .entry((subject.to_string(), operation.to_string()))
            .or_insert(WindowCounter {
                count: 0,
                window_start: now,
            });

        if counter.window_start + window <= now {
            counter.count = 0;
            counter.window_start = now;
        }
        counter.count += 1;
        Ok(WindowUsage {
            count: counter.count,
            window_start: counter.window_start,
        })
    }

    async fn purge_stale(&self, window: Duration) -> AuthResult<u64> {
        let mut counters = self.counters.lock().expect("rate limit mutex poisoned");
        let now = Utc::now();
        let before = counters.len();
        counters.retain(|_, c| c.window_start + window > now);
        Ok((before - counters.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> (RateLimiter, Arc<MemoryRateLimitStore>) {
        let store = Arc::new(MemoryRateLimitStore::new());
        (RateLimiter::new(store.clone()), store)
    }

    async fn admit(limiter: &RateLimiter, subject: &str, operation: &str, max: i64) -> RateDecision {
        limiter
            .admit(subject, operation, Duration::minutes(15), max)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_admits_up_to_max_then_denies() {
        let (limiter, _) = limiter();

        assert!(admit(&limiter, "+15551234567", "otp-send", 2).await.allowed);
        assert!(admit(&limiter, "+15551234567", "otp-send", 2).await.allowed);
        assert!(!admit(&limiter, "+15551234567", "otp-send", 2).await.allowed);
        assert!(!admit(&limiter, "+15551234567", "otp-send", 2).await.allowed);
    }

    #[tokio::test]
    async fn test_denial_reports_remaining_window_time() {
        let (limiter, _) = limiter();

        let first = admit(&limiter, "+15551234567", "otp-send", 1).await;
        assert!(first.allowed);
        assert_eq!(first.retry_after_seconds, 0);

        let denied = admit(&limiter, "+15551234567", "otp-send", 1).await;
        assert!(!denied.allowed);
        // The window just opened, so nearly all 15 minutes remain
        assert!(denied.retry_after_seconds <= 15 * 60);
        assert!(denied.retry_after_seconds > 14 * 60);
    }

    #[tokio::test]
    async fn test_denial_hint_shrinks_as_the_window_ages() {
        let (limiter, store) = limiter();
        let window = Duration::minutes(15);

        limiter.admit("+15551234567", "otp-send", window, 1).await.unwrap();
        {
            let mut counters = store.counters.lock().unwrap();
            let counter = counters
                .get_mut(&("+15551234567".to_string(), "otp-send".to_string()))
                .unwrap();
            counter.window_start = Utc::now() - Duration::minutes(14);
        }

        let denied = limiter
            .admit("+15551234567", "otp-send", window, 1)
            .await
            .unwrap();
        assert!(!denied.allowed);
        assert!(denied.retry_after_seconds <= 60);
    }

    #[tokio::test]
    async fn test_subjects_and_operations_are_independent() {
        let (limiter, _) = limiter();

        assert!(admit(&limiter, "+15551234567", "otp-send", 1).await.allowed);
        assert!(!admit(&limiter, "+15551234567", "otp-send", 1).await.allowed);

        assert!(admit(&limiter, "+15559876543", "otp-send", 1).await.allowed);
        assert!(admit(&limiter, "+15551234567", "otp-verify", 1).await.allowed);
    }

    #[tokio::test]
    async fn test_counter_resets_when_window_elapses() {
        let (limiter, store) = limiter();

        assert!(admit(&limiter, "+15551234567", "otp-send", 1).await.allowed);
        assert!(!admit(&limiter, "+15551234567", "otp-send", 1).await.allowed);

        // Age the window out
        {
            let mut counters = store.counters.lock().unwrap();
            let counter = counters
                .get_mut(&("+15551234567".to_string(), "otp-send".to_string()))
                .unwrap();
            counter.window_start = Utc::now() - Duration::minutes(16);
        }

        assert!(admit(&limiter, "+15551234567", "otp-send", 1).await.allowed);
    }

    #[tokio::test]
    async fn test_count_is_monotonic_within_window() {
        let (_, store) = limiter();
        let window = Duration::minutes(15);

        let mut last = 0;
        for _ in 0..5 {
            let usage = store.increment("subject", "op", window).await.unwrap();
            assert_eq!(usage.count, last + 1);
            last = usage.count;
        }
    }

    #[tokio::test]
    async fn test_purge_drops_only_elapsed_windows() {
        let (limiter, store) = limiter();
        let window = Duration::minutes(15);

        limiter.admit("stale", "otp-send", window, 1).await.unwrap();
        limiter.admit("live", "otp-send", window, 1).await.unwrap();
        {
            let mut counters = store.counters.lock().unwrap();
            let counter = counters
                .get_mut(&("stale".to_string(), "otp-send".to_string()))
                .unwrap();
            counter.window_start = Utc::now() - Duration::minutes(16);
        }

        assert_eq!(limiter.purge_stale(window).await.unwrap(), 1);

        // The live window still counts; the purged one starts fresh
        let live = limiter.admit("live", "otp-send", window, 1).await.unwrap();
        assert!(!live.allowed);
        let fresh = limiter.admit("stale", "otp-send", window, 1).await.unwrap();
        assert!(fresh.allowed);
    }
}
