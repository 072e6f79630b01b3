//! Production provider implementations.
//!
//! - [`PostgresResetStore`]: requests, accounts and audit log (`postgres` feature)
//! - [`RedisRateLimiter`]: sliding-window submission limits
//! - [`RedisSessionResolver`]: reviewer session lookup

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod rate_limiter_redis;
pub mod session_redis;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresResetStore, PostgresTransaction};
pub use rate_limiter_redis::RedisRateLimiter;
pub use session_redis::RedisSessionResolver;
