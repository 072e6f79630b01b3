//! Mock provider implementations for testing.
//!
//! This module provides simple, in-memory implementations of all provider traits
//! for use in unit and integration tests.

pub mod clock;
pub mod notifier;
pub mod rate_limiter;
pub mod session;
pub mod store;

pub use clock::MockClock;
pub use notifier::MockNotifier;
pub use rate_limiter::MockRateLimiter;
pub use session::MockSessionResolver;
pub use store::{MockResetStore, MockTransaction};
