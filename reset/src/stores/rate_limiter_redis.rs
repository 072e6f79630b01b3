//! `Redis` sliding-window rate limiter.
//!
//! One sorted set per key, members scored by attempt time in milliseconds.
//! The check runs as a Lua script so trimming, counting and recording are a
//! single step on the server. A rejected attempt is not recorded, and the
//! reply carries the oldest surviving attempt so the caller learns exactly
//! when a slot frees up.

use crate::error::{ResetError, Result};
use crate::providers::RateLimiter;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// KEYS[1] = set, ARGV = now_ms, window_ms, limit, member
// Reply: {1, count} when recorded, {0, oldest_ms} when over the limit.
static SLIDING_WINDOW: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local key = KEYS[1]
        local now = tonumber(ARGV[1])
        local window = tonumber(ARGV[2])
        local limit = tonumber(ARGV[3])

        redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
        local count = redis.call('ZCARD', key)
        if count >= limit then
            local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
            return {0, tonumber(oldest[2]) or now}
        end

        redis.call('ZADD', key, now, ARGV[4])
        redis.call('PEXPIRE', key, window)
        return {1, count + 1}
        ",
    )
});

/// Rate limiter shared by every server instance.
///
/// ```no_run
/// use opsdesk_reset::stores::RedisRateLimiter;
/// use opsdesk_reset::providers::RateLimiter;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = RedisRateLimiter::new("redis://127.0.0.1:6379").await?;
/// limiter
///     .check_and_record("reset:guide:alice@example.com", 5, std::time::Duration::from_secs(900))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn_manager: ConnectionManager,
}

impl RedisRateLimiter {
    /// Connect to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::InternalError` if `Redis` is unreachable.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| ResetError::InternalError(format!("Invalid Redis URL: {e}")))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| ResetError::InternalError(format!("Redis connection failed: {e}")))?;
        Ok(Self { conn_manager })
    }

    /// Reuse a connection manager (the server shares one with the session resolver).
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    fn counter_key(key: &str) -> String {
        format!("rate_limit:{key}")
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Time until the attempt recorded at `oldest_ms` leaves the window.
fn retry_after(oldest_ms: u64, now_ms: u64, window: Duration) -> Duration {
    let elapsed = Duration::from_millis(now_ms.saturating_sub(oldest_ms));
    window.saturating_sub(elapsed).max(Duration::from_secs(1))
}

impl RateLimiter for RedisRateLimiter {
    async fn check_and_record(&self, key: &str, max_attempts: u32, window: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let now_ms = unix_millis();
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        // Unique member, or same-millisecond attempts collapse into one.
        let member = format!("{now_ms}:{}", uuid::Uuid::new_v4().simple());

        let (recorded, value): (u8, u64) = SLIDING_WINDOW
            .key(Self::counter_key(key))
            .arg(now_ms)
            .arg(window_ms)
            .arg(max_attempts)
            .arg(member)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key = %key, "Rate limit script failed");
                ResetError::InternalError(format!("Rate limit check failed: {e}"))
            })?;

        if recorded == 0 {
            let retry_after = retry_after(value, now_ms, window);
            tracing::warn!(
                rate_limit_exceeded = true,
                key = %key,
                max_attempts,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            return Err(ResetError::RateLimited { retry_after });
        }

        tracing::debug!(key = %key, attempts = value, max_attempts, "Rate limit check passed");
        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .del(Self::counter_key(key))
            .await
            .map_err(|e| ResetError::InternalError(format!("Rate limit reset failed: {e}")))?;
        tracing::info!(key = %key, "Rate limit cleared");
        Ok(())
    }

    async fn attempts(&self, key: &str) -> Result<u32> {
        let mut conn = self.conn_manager.clone();
        let count: u64 = conn
            .zcard(Self::counter_key(key))
            .await
            .map_err(|e| ResetError::InternalError(format!("Rate limit lookup failed: {e}")))?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
