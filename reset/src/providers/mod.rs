//! Provider traits for external dependencies.
//!
//! The workflow only talks to storage, counters, mail and sessions through
//! these traits. Production implementations live in [`crate::stores`] and
//! [`crate::notify`]; in-memory ones in `crate::mocks`.

pub mod notifier;
pub mod rate_limiter;
pub mod session;
pub mod store;

pub use notifier::{Notification, Notifier};
pub use rate_limiter::RateLimiter;
pub use session::SessionResolver;
pub use store::{ResetStore, ResetTransaction};
