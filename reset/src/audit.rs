//! Append-only audit trail.
//!
//! Every transition of a reset request produces exactly one [`AuditEntry`],
//! written through the same transaction as the transition itself. An aborted
//! transition therefore never leaves an orphaned entry behind.

use crate::error::Result;
use crate::model::{AccountId, RequestId, ResetStatus, ResetVariant};
use crate::providers::ResetTransaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Request filed.
    Submit,
    /// Request approved and credential replaced.
    Approve,
    /// Request rejected.
    Reject,
    /// Request expired by the system.
    Expire,
}

impl AuditAction {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Expire => "expire",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "submit" => Some(Self::Submit),
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "expire" => Some(Self::Expire),
            _ => None,
        }
    }
}

/// Immutable record of one transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Entry ID.
    pub id: Uuid,
    /// Kind of target, e.g. `guide_password_reset`.
    pub target_type: String,
    /// Target request.
    pub target_id: RequestId,
    /// Reviewer, or `None` for system actions.
    pub actor_id: Option<AccountId>,
    /// Action taken.
    pub action: AuditAction,
    /// Free-form note (rejection reason, ...).
    pub note: Option<String>,
    /// Snapshot before the transition.
    pub before: Option<serde_json::Value>,
    /// Snapshot after the transition.
    pub after: Option<serde_json::Value>,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Entry for a status change of a request of `variant`.
    ///
    /// Snapshots hold the status field only; `before` is `None` for submissions.
    #[must_use]
    pub fn status_change(
        variant: ResetVariant,
        target_id: RequestId,
        actor_id: Option<AccountId>,
        action: AuditAction,
        before: Option<ResetStatus>,
        after: ResetStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_type: variant.target_type().to_string(),
            target_id,
            actor_id,
            action,
            note: None,
            before: before.map(status_snapshot),
            after: Some(status_snapshot(after)),
            created_at: now,
        }
    }

    /// Attach a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

fn status_snapshot(status: ResetStatus) -> serde_json::Value {
    serde_json::json!({ "status": status.as_str() })
}

/// Writes audit entries through the caller's transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditRecorder;

impl AuditRecorder {
    /// Create a recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Append `entry` inside `tx`.
    ///
    /// # Errors
    ///
    /// Propagates the storage error; the caller must then drop `tx` so the
    /// transition is rolled back with it.
    pub async fn record<T: ResetTransaction>(&self, tx: &mut T, entry: &AuditEntry) -> Result<()> {
        tx.append_audit(entry).await?;
        tracing::debug!(
            target_type = %entry.target_type,
            target_id = %entry.target_id,
            action = entry.action.as_str(),
            "Audit entry staged"
        );
        Ok(())
    }
}
