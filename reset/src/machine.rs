//! Request state machine.
//!
//! ```text
//!            approve (now < expires_at)
//!          ┌──────────────────────────► APPROVED
//!          │ reject (reason non-empty)
//! PENDING ─┼──────────────────────────► REJECTED
//!          │ expire (now >= expires_at)
//!          └──────────────────────────► EXPIRED
//! ```
//!
//! Terminal states accept nothing. The function is pure; callers apply the
//! returned status themselves.

use crate::error::{ResetError, Result};
use crate::model::{CredentialResetRequest, ResetStatus};
use chrono::{DateTime, Utc};

/// Something that may move a request out of `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction<'a> {
    /// Reviewer approval. The credential policy is checked before this runs.
    Approve,
    /// Reviewer rejection with the given reason.
    Reject {
        /// Reason shown to the requester.
        reason: &'a str,
    },
    /// Deadline passed.
    Expire,
}

impl ReviewAction<'_> {
    /// Status reached when the action succeeds.
    #[must_use]
    pub const fn target(self) -> ResetStatus {
        match self {
            Self::Approve => ResetStatus::Approved,
            Self::Reject { .. } => ResetStatus::Rejected,
            Self::Expire => ResetStatus::Expired,
        }
    }
}

/// Validate `action` against the request's current status and deadline.
///
/// # Errors
///
/// - terminal current status → `ResetError::AlreadyReviewed`
/// - approve/reject at or past the deadline → `ResetError::RequestExpired`
/// - reject with a blank reason → `ResetError::MissingReason`
/// - expire before the deadline → `ResetError::NotYetExpired`
pub fn transition(
    current: ResetStatus,
    expires_at: DateTime<Utc>,
    action: ReviewAction<'_>,
    now: DateTime<Utc>,
) -> Result<ResetStatus> {
    if current.is_terminal() {
        return Err(ResetError::AlreadyReviewed { status: current });
    }

    let overdue = now >= expires_at;
    match action {
        ReviewAction::Approve if overdue => Err(ResetError::RequestExpired),
        ReviewAction::Approve => Ok(ResetStatus::Approved),
        ReviewAction::Reject { reason } if reason.trim().is_empty() => {
            Err(ResetError::MissingReason)
        }
        ReviewAction::Reject { .. } if overdue => Err(ResetError::RequestExpired),
        ReviewAction::Reject { .. } => Ok(ResetStatus::Rejected),
        ReviewAction::Expire if overdue => Ok(ResetStatus::Expired),
        ReviewAction::Expire => Err(ResetError::NotYetExpired),
    }
}

/// Run [`transition`] for `request` and apply the result.
///
/// Stamps review metadata on approve/reject and keeps `rejection_reason`
/// present exactly when the request is rejected.
///
/// # Errors
///
/// Same as [`transition`]; the request is left untouched on error.
pub fn apply(
    request: &mut CredentialResetRequest,
    action: ReviewAction<'_>,
    reviewer: Option<crate::model::AccountId>,
    now: DateTime<Utc>,
) -> Result<()> {
    let next = transition(request.status, request.expires_at, action, now)?;

    request.status = next;
    request.updated_at = now;
    match action {
        ReviewAction::Approve => {
            request.reviewed_by = reviewer;
            request.reviewed_at = Some(now);
            request.fulfilled_at = Some(now);
        }
        ReviewAction::Reject { reason } => {
            request.reviewed_by = reviewer;
            request.reviewed_at = Some(now);
            request.rejection_reason = Some(reason.trim().to_string());
        }
        ReviewAction::Expire => {}
    }
    Ok(())
}
