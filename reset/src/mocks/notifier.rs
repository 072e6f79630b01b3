//! Mock notifier for testing.

use crate::error::{ResetError, Result};
use crate::providers::{Notification, Notifier};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Records every notification instead of delivering it.
///
/// Can be switched into a failing mode to check that delivery errors never
/// reach the caller of approve/deny.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    should_fail: Arc<AtomicBool>,
}

impl MockNotifier {
    /// Create a notifier that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    /// Notifications delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Notifier for MockNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(ResetError::NotificationFailed(
                "Mock notifier configured to fail".into(),
            ));
        }

        self.sent
            .lock()
            .map_err(|_| ResetError::InternalError("Mutex lock failed".into()))?
            .push(notification.clone());

        tracing::debug!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "Mock notification recorded"
        );

        Ok(())
    }
}
