//! Reviewer statistics.

use serde::{Deserialize, Serialize};

/// Raw per-status counts as reported by storage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatusCounts {
    /// Pending requests.
    pub pending: u64,
    /// Approved requests.
    pub approved: u64,
    /// Rejected requests.
    pub rejected: u64,
    /// Expired requests.
    pub expired: u64,
    /// Mean time from submission to review over reviewed requests, in seconds.
    pub average_response_seconds: Option<f64>,
}

impl StatusCounts {
    /// All requests.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.pending + self.approved + self.rejected + self.expired
    }
}

/// Response of the statistics endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetStats {
    /// All requests.
    pub total: u64,
    /// Pending requests.
    pub pending: u64,
    /// Approved requests.
    pub approved: u64,
    /// Rejected requests.
    pub rejected: u64,
    /// Expired requests.
    pub expired: u64,
    /// Share of pending requests, 0–100.
    pub pending_percentage: f64,
    /// Approved share of reviewed requests, 0–100.
    pub approval_rate: f64,
    /// Mean submission-to-review time in hours, 0 when nothing was reviewed.
    pub average_response_time_hours: f64,
}

#[allow(clippy::cast_precision_loss)] // counts stay far below 2^52
fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 * 100.0 / whole as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl From<StatusCounts> for ResetStats {
    fn from(counts: StatusCounts) -> Self {
        let total = counts.total();
        Self {
            total,
            pending: counts.pending,
            approved: counts.approved,
            rejected: counts.rejected,
            expired: counts.expired,
            pending_percentage: percentage(counts.pending, total),
            approval_rate: percentage(counts.approved, counts.approved + counts.rejected),
            average_response_time_hours: counts
                .average_response_seconds
                .map_or(0.0, |secs| round2(secs / 3600.0)),
        }
    }
}
