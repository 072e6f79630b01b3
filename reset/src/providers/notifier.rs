//! Outbound notification trait.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient address.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl Notification {
    /// Build a notification.
    #[must_use]
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Delivery channel (SMTP, console, ...).
///
/// Implementations are called only after the triggering transaction has
/// committed; a failure here never undoes anything.
pub trait Notifier: Send + Sync {
    /// Deliver a notification.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::NotificationFailed` when delivery fails.
    fn send(&self, notification: &Notification) -> impl Future<Output = Result<()>> + Send;
}
