//! Business metrics for the reset workflow.
//!
//! Counters are emitted through the `metrics` facade; the server installs a
//! Prometheus recorder. Without a recorder every call is a no-op.

use crate::model::ResetVariant;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Submissions by outcome.
pub const REQUESTS_TOTAL: &str = "opsdesk_reset_requests_total";
/// Reviewer decisions by outcome.
pub const REVIEWS_TOTAL: &str = "opsdesk_reset_reviews_total";
/// Notification deliveries by outcome.
pub const NOTIFICATIONS_TOTAL: &str = "opsdesk_reset_notifications_total";
/// Requests expired by the system.
pub const EXPIRED_TOTAL: &str = "opsdesk_reset_expired_total";
/// Time spent inside the review transaction.
pub const REVIEW_DURATION: &str = "opsdesk_reset_review_duration_seconds";

/// Register metric descriptions.
///
/// Call once after installing a recorder.
pub fn register() {
    describe_counter!(REQUESTS_TOTAL, "Reset request submissions by variant and outcome");
    describe_counter!(REVIEWS_TOTAL, "Reviewer decisions by variant and decision");
    describe_counter!(NOTIFICATIONS_TOTAL, "Requester notifications by outcome");
    describe_counter!(EXPIRED_TOTAL, "Reset requests expired by the system");
    describe_histogram!(REVIEW_DURATION, "Time taken by approve and deny transactions");
}

pub(crate) fn submission(variant: ResetVariant, outcome: &'static str) {
    counter!(REQUESTS_TOTAL, "variant" => variant.as_str(), "outcome" => outcome).increment(1);
}

pub(crate) fn review(variant: ResetVariant, decision: &'static str, elapsed: Duration) {
    counter!(REVIEWS_TOTAL, "variant" => variant.as_str(), "decision" => decision).increment(1);
    histogram!(REVIEW_DURATION, "variant" => variant.as_str(), "decision" => decision)
        .record(elapsed.as_secs_f64());
}

pub(crate) fn notification(outcome: &'static str) {
    counter!(NOTIFICATIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn expired(variant: ResetVariant) {
    counter!(EXPIRED_TOTAL, "variant" => variant.as_str()).increment(1);
}
