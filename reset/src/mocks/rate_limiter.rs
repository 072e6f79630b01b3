//! In-memory rate limiter.

use crate::error::{ResetError, Result};
use crate::providers::RateLimiter;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Sliding window kept per key in process memory.
///
/// Same contract as `RedisRateLimiter`: rejected attempts are not recorded
/// and `retry_after` is the time until the oldest attempt ages out.
#[derive(Debug, Clone, Default)]
pub struct MockRateLimiter {
    windows: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl MockRateLimiter {
    /// Empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn windows(&self) -> Result<MutexGuard<'_, HashMap<String, VecDeque<Instant>>>> {
        self.windows
            .lock()
            .map_err(|_| ResetError::InternalError("Mutex lock failed".into()))
    }
}

impl RateLimiter for MockRateLimiter {
    async fn check_and_record(&self, key: &str, max_attempts: u32, window: Duration) -> Result<()> {
        let now = Instant::now();
        let mut windows = self.windows()?;
        let attempts = windows.entry(key.to_string()).or_default();
        while attempts.front().is_some_and(|at| now.duration_since(*at) >= window) {
            attempts.pop_front();
        }

        if attempts.len() >= max_attempts as usize {
            let oldest = attempts.front().copied().unwrap_or(now);
            let retry_after = window.saturating_sub(now.duration_since(oldest));
            tracing::warn!(key = %key, max_attempts, "Mock rate limit exceeded");
            return Err(ResetError::RateLimited { retry_after });
        }

        attempts.push_back(now);
        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.windows()?.remove(key);
        Ok(())
    }

    async fn attempts(&self, key: &str) -> Result<u32> {
        let count = self.windows()?.get(key).map_or(0, VecDeque::len);
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
