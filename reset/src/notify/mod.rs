//! Requester notifications.
//!
//! Delivery runs strictly after the review transaction has committed, on its
//! own task. Failures are logged and counted, never returned.

pub mod console;
pub mod dispatcher;
pub mod smtp;

pub use console::ConsoleNotifier;
pub use dispatcher::NotificationDispatcher;
pub use smtp::{SmtpConfig, SmtpNotifier};

use crate::model::{ResetStatus, ResetVariant};
use crate::providers::Notification;

/// Message telling the requester their credential was replaced.
#[must_use]
pub fn approval_notice(variant: ResetVariant, recipient: &str) -> Notification {
    let label = variant.label(ResetStatus::Approved);
    Notification::new(
        recipient,
        format!("Your password reset request was {label}"),
        format!(
            "Your password reset request was {label} by a reviewer.\n\
             A new password has been set on your account; your reviewer will \
             share it with you through a verified channel.\n\n\
             If you did not request this, contact support immediately."
        ),
    )
}

/// Message telling the requester their request was turned down.
#[must_use]
pub fn rejection_notice(variant: ResetVariant, recipient: &str, reason: &str) -> Notification {
    let label = variant.label(ResetStatus::Rejected);
    Notification::new(
        recipient,
        format!("Your password reset request was {label}"),
        format!(
            "Your password reset request was {label}.\n\nReason: {reason}\n\n\
             Your password has not been changed."
        ),
    )
}
