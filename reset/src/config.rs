//! Reset workflow configuration.
//!
//! Values are supplied by the application; the defaults below are what the
//! operations console ships with.

use crate::policy::PasswordPolicy;
use chrono::Duration;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Iterations.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for HashCost {
    /// OWASP recommendation: m=19456 (19 MiB), t=2, p=1.
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Configuration for submission, review and expiry.
#[derive(Debug, Clone)]
pub struct ResetConfig {
    /// How long a request stays reviewable.
    ///
    /// Default: 72 hours
    pub request_ttl: Duration,

    /// Submissions allowed per identifier within `rate_limit_window`.
    ///
    /// Default: 5
    pub max_submissions_per_identifier: u32,

    /// Submissions allowed per client IP within `rate_limit_window`.
    ///
    /// Default: 20
    pub max_submissions_per_ip: u32,

    /// Sliding window for submission rate limits.
    ///
    /// Default: 15 minutes
    pub rate_limit_window: std::time::Duration,

    /// Interval between expiry sweeps.
    ///
    /// Default: 60 seconds
    pub sweep_interval: std::time::Duration,

    /// Maximum requests expired per variant in one sweep.
    ///
    /// Default: 500
    pub sweep_batch_size: u32,

    /// Maximum length of a submitter description or rejection reason.
    ///
    /// Default: 2000 characters
    pub max_text_length: usize,

    /// Policy for reviewer-supplied credentials.
    pub password_policy: PasswordPolicy,

    /// Hashing cost for stored credentials.
    pub hash_cost: HashCost,
}

impl ResetConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_ttl: Duration::hours(72),
            max_submissions_per_identifier: 5,
            max_submissions_per_ip: 20,
            rate_limit_window: std::time::Duration::from_secs(15 * 60),
            sweep_interval: std::time::Duration::from_secs(60),
            sweep_batch_size: 500,
            max_text_length: 2000,
            password_policy: PasswordPolicy::default(),
            hash_cost: HashCost::default(),
        }
    }

    /// Set request time-to-live.
    #[must_use]
    pub const fn with_request_ttl(mut self, ttl: Duration) -> Self {
        self.request_ttl = ttl;
        self
    }

    /// Set submission rate limits.
    #[must_use]
    pub const fn with_rate_limit(
        mut self,
        per_identifier: u32,
        per_ip: u32,
        window: std::time::Duration,
    ) -> Self {
        self.max_submissions_per_identifier = per_identifier;
        self.max_submissions_per_ip = per_ip;
        self.rate_limit_window = window;
        self
    }

    /// Set expiry sweep interval.
    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: std::time::Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set hashing cost.
    #[must_use]
    pub const fn with_hash_cost(mut self, cost: HashCost) -> Self {
        self.hash_cost = cost;
        self
    }
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResetConfig::default();
        assert_eq!(config.request_ttl, Duration::hours(72));
        assert_eq!(config.max_submissions_per_identifier, 5);
        assert_eq!(config.rate_limit_window.as_secs(), 900);
        assert_eq!(config.hash_cost.memory_kib, 19456);
    }

    #[test]
    fn test_builder() {
        let config = ResetConfig::new()
            .with_request_ttl(Duration::hours(1))
            .with_rate_limit(3, 10, std::time::Duration::from_secs(60))
            .with_sweep_interval(std::time::Duration::from_secs(5));

        assert_eq!(config.request_ttl, Duration::hours(1));
        assert_eq!(config.max_submissions_per_identifier, 3);
        assert_eq!(config.max_submissions_per_ip, 10);
        assert_eq!(config.sweep_interval.as_secs(), 5);
    }
}
