//! Rate limiter trait for reset submissions.
//!
//! # Implementation
//!
//! Use Redis with a sliding window for limits shared across server instances.

use crate::error::{ResetError, Result};
use std::future::Future;
use std::time::Duration;

/// Sliding-window rate limiter.
///
/// # Security
///
/// Submission limits stop a single client from flooding reviewers with
/// requests and slow down account enumeration.
///
/// # Example
///
/// ```no_run
/// use opsdesk_reset::providers::RateLimiter;
/// use std::time::Duration;
///
/// # async fn example(limiter: impl RateLimiter) -> Result<(), Box<dyn std::error::Error>> {
/// // 5 submissions per 15 minutes
/// limiter
///     .check_and_record("reset:guide:alice@example.com", 5, Duration::from_secs(900))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub trait RateLimiter: Send + Sync {
    /// Check the limit for `key` and record this attempt.
    ///
    /// Check and record happen atomically: of N concurrent callers on a fresh
    /// key, at most `max_attempts` pass.
    ///
    /// # Errors
    ///
    /// - limit reached → `ResetError::RateLimited` with the window as `retry_after`
    /// - counter store failure → `ResetError::InternalError`
    fn check_and_record(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Boolean form of [`RateLimiter::check_and_record`].
    ///
    /// Returns `Ok(false)` instead of `ResetError::RateLimited`.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::InternalError` if the counter store fails.
    fn allow(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> impl Future<Output = Result<bool>> + Send {
        async move {
            match self.check_and_record(key, limit, window).await {
                Ok(()) => Ok(true),
                Err(ResetError::RateLimited { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }
    }

    /// Forget all attempts for `key` (admin override, tests).
    ///
    /// # Errors
    ///
    /// Returns `ResetError::InternalError` if the counter store fails.
    fn reset(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Attempts currently recorded for `key`.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::InternalError` if the counter store fails.
    fn attempts(&self, key: &str) -> impl Future<Output = Result<u32>> + Send;
}
