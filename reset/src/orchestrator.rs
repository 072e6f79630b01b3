//! Transactional approval orchestrator.
//!
//! Approve and deny re-read the request inside a fresh transaction, run the
//! state machine against the clock, and commit the request update, the
//! credential write and the audit entry as one unit. Any error before commit
//! drops the transaction, which rolls every staged write back.
//!
//! Notifications are dispatched only after a successful commit.

use crate::audit::{AuditAction, AuditEntry, AuditRecorder};
use crate::clock::Clock;
use crate::config::ResetConfig;
use crate::credential::CredentialMutator;
use crate::error::{ResetError, Result};
use crate::machine::{self, ReviewAction};
use crate::metrics;
use crate::model::{
    Actor, CredentialResetRequest, LinkedAccount, RequestId, ResetStatus, ResetVariant,
};
use crate::notify::{self, NotificationDispatcher};
use crate::providers::{Notifier, ResetStore, ResetTransaction};
use crate::stats::ResetStats;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Move an overdue pending request to `expired` in its own transaction.
///
/// Shared by the orchestrator, the submission service (expire-in-place) and
/// the background sweep.
///
/// # Errors
///
/// - unknown request → `ResetError::RequestNotFound`
/// - already terminal → `ResetError::AlreadyReviewed`
/// - deadline not reached → `ResetError::NotYetExpired`
/// - storage failure → `ResetError::DatabaseError`
pub async fn expire_overdue<S: ResetStore>(
    store: &S,
    audit: &AuditRecorder,
    variant: ResetVariant,
    id: RequestId,
    now: DateTime<Utc>,
) -> Result<CredentialResetRequest> {
    let mut tx = store.begin().await?;
    let mut request = tx
        .lock_request(variant, id)
        .await?
        .ok_or(ResetError::RequestNotFound)?;

    let before = request.status;
    machine::apply(&mut request, ReviewAction::Expire, None, now)?;
    tx.update_request(&request).await?;

    let entry = AuditEntry::status_change(
        variant,
        id,
        None,
        AuditAction::Expire,
        Some(before),
        request.status,
        now,
    )
    .with_note("review deadline passed");
    audit.record(&mut tx, &entry).await?;
    tx.commit().await?;

    metrics::expired(variant);
    tracing::info!(
        variant = variant.as_str(),
        request_id = %id,
        expires_at = %request.expires_at,
        "Reset request expired"
    );
    Ok(request)
}

/// Reviewer-facing operations on reset requests.
///
/// One orchestrator serves both variants; each call names the variant it
/// works on.
pub struct ApprovalOrchestrator<S, N> {
    store: Arc<S>,
    credentials: CredentialMutator,
    audit: AuditRecorder,
    dispatcher: NotificationDispatcher<N>,
    clock: Arc<dyn Clock>,
    max_reason_length: usize,
}

impl<S, N> ApprovalOrchestrator<S, N>
where
    S: ResetStore,
    N: Notifier + 'static,
{
    /// Create an orchestrator.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        credentials: CredentialMutator,
        dispatcher: NotificationDispatcher<N>,
        clock: Arc<dyn Clock>,
        config: &ResetConfig,
    ) -> Self {
        Self {
            store,
            credentials,
            audit: AuditRecorder::new(),
            dispatcher,
            clock,
            max_reason_length: config.max_text_length,
        }
    }

    /// Credential mutator in use (exposes `verify` to the login side).
    #[must_use]
    pub const fn credentials(&self) -> &CredentialMutator {
        &self.credentials
    }

    /// Approve a pending request and replace the linked account's credential.
    ///
    /// The credential is validated and the request state checked before the
    /// hash is computed. The state check is repeated under the row lock.
    ///
    /// # Errors
    ///
    /// - weak credential → `ResetError::CredentialRejected`
    /// - unknown request → `ResetError::RequestNotFound`
    /// - not pending or past deadline → `ResetError::AlreadyReviewed` / `ResetError::RequestExpired`
    /// - request for the reviewer's own account → `ResetError::SelfReview`
    /// - storage failure → `ResetError::DatabaseError` (nothing applied)
    pub async fn approve(
        &self,
        variant: ResetVariant,
        id: RequestId,
        reviewer: &Actor,
        new_credential: &str,
        notify_requester: bool,
    ) -> Result<CredentialResetRequest> {
        let started = Instant::now();

        self.credentials.validate(new_credential)?;

        // Unlocked read so stale or unknown requests skip the hash.
        let current = self.get(variant, id).await?;
        machine::transition(
            current.status,
            current.expires_at,
            ReviewAction::Approve,
            self.clock.now(),
        )
        .inspect_err(|e| log_refusal(variant, id, reviewer, "approve", e))?;

        let mutator = self.credentials.clone();
        let candidate = new_credential.to_owned();
        let password_hash = tokio::task::spawn_blocking(move || mutator.hash(&candidate))
            .await
            .map_err(|e| ResetError::HashingFailed(format!("Hashing task failed: {e}")))??;

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut request = tx
            .lock_request(variant, id)
            .await?
            .ok_or(ResetError::RequestNotFound)?;

        let before = request.status;
        machine::apply(&mut request, ReviewAction::Approve, Some(reviewer.id), now)
            .inspect_err(|e| log_refusal(variant, id, reviewer, "approve", e))?;

        let account = tx
            .resolve_linked_account(variant, request.subject_id)
            .await?;
        refuse_self_review(variant, id, reviewer, &account, "approve")?;
        tx.update_request(&request).await?;
        self.credentials
            .store(&mut tx, account.account_id, &password_hash)
            .await?;

        let entry = AuditEntry::status_change(
            variant,
            id,
            Some(reviewer.id),
            AuditAction::Approve,
            Some(before),
            request.status,
            now,
        );
        self.audit.record(&mut tx, &entry).await?;
        tx.commit().await?;

        metrics::review(variant, "approved", started.elapsed());
        tracing::info!(
            variant = variant.as_str(),
            request_id = %id,
            reviewer_id = %reviewer.id,
            account_id = %account.account_id,
            "Reset request approved, credential replaced"
        );

        if notify_requester {
            self.dispatcher
                .dispatch(notify::approval_notice(variant, &account.email));
        }
        Ok(request)
    }

    /// Reject a pending request. The credential is never touched.
    ///
    /// # Errors
    ///
    /// - blank reason → `ResetError::MissingReason`
    /// - overlong reason → `ResetError::InvalidInput`
    /// - unknown request → `ResetError::RequestNotFound`
    /// - not pending or past deadline → `ResetError::AlreadyReviewed` / `ResetError::RequestExpired`
    /// - request for the reviewer's own account → `ResetError::SelfReview`
    /// - storage failure → `ResetError::DatabaseError` (nothing applied)
    pub async fn deny(
        &self,
        variant: ResetVariant,
        id: RequestId,
        reviewer: &Actor,
        reason: &str,
        notify_requester: bool,
    ) -> Result<CredentialResetRequest> {
        let started = Instant::now();

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ResetError::MissingReason);
        }
        if reason.chars().count() > self.max_reason_length {
            return Err(ResetError::InvalidInput(format!(
                "Reason must be at most {} characters",
                self.max_reason_length
            )));
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut request = tx
            .lock_request(variant, id)
            .await?
            .ok_or(ResetError::RequestNotFound)?;

        let before = request.status;
        machine::apply(&mut request, ReviewAction::Reject { reason }, Some(reviewer.id), now)
            .inspect_err(|e| log_refusal(variant, id, reviewer, "deny", e))?;

        let account = tx
            .resolve_linked_account(variant, request.subject_id)
            .await?;
        refuse_self_review(variant, id, reviewer, &account, "deny")?;
        let recipient = notify_requester.then_some(account.email);
        tx.update_request(&request).await?;

        let entry = AuditEntry::status_change(
            variant,
            id,
            Some(reviewer.id),
            AuditAction::Reject,
            Some(before),
            request.status,
            now,
        )
        .with_note(reason);
        self.audit.record(&mut tx, &entry).await?;
        tx.commit().await?;

        metrics::review(variant, "rejected", started.elapsed());
        tracing::info!(
            variant = variant.as_str(),
            request_id = %id,
            reviewer_id = %reviewer.id,
            "Reset request rejected"
        );

        if let Some(recipient) = recipient {
            self.dispatcher
                .dispatch(notify::rejection_notice(variant, &recipient, reason));
        }
        Ok(request)
    }

    /// Expire an overdue pending request on behalf of the system.
    ///
    /// # Errors
    ///
    /// See [`expire_overdue`].
    pub async fn expire(&self, variant: ResetVariant, id: RequestId) -> Result<CredentialResetRequest> {
        expire_overdue(&*self.store, &self.audit, variant, id, self.clock.now()).await
    }

    /// Fetch one request.
    ///
    /// # Errors
    ///
    /// - unknown request → `ResetError::RequestNotFound`
    /// - storage failure → `ResetError::DatabaseError`
    pub async fn get(&self, variant: ResetVariant, id: RequestId) -> Result<CredentialResetRequest> {
        self.store
            .get_request(variant, id)
            .await?
            .ok_or(ResetError::RequestNotFound)
    }

    /// List requests newest first.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure.
    pub async fn list(
        &self,
        variant: ResetVariant,
        status: Option<ResetStatus>,
        limit: u32,
    ) -> Result<Vec<CredentialResetRequest>> {
        self.store.list_requests(variant, status, limit).await
    }

    /// Aggregate statistics for one variant.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure.
    pub async fn stats(&self, variant: ResetVariant) -> Result<ResetStats> {
        Ok(self.store.status_counts(variant).await?.into())
    }

    /// Audit entries of one request, oldest first.
    ///
    /// # Errors
    ///
    /// - unknown request → `ResetError::RequestNotFound`
    /// - storage failure → `ResetError::DatabaseError`
    pub async fn audit_trail(&self, variant: ResetVariant, id: RequestId) -> Result<Vec<AuditEntry>> {
        if self.store.get_request(variant, id).await?.is_none() {
            return Err(ResetError::RequestNotFound);
        }
        self.store.audit_trail(variant, id).await
    }
}

fn refuse_self_review(
    variant: ResetVariant,
    id: RequestId,
    reviewer: &Actor,
    account: &LinkedAccount,
    operation: &'static str,
) -> Result<()> {
    if account.account_id != reviewer.id {
        return Ok(());
    }
    tracing::warn!(
        variant = variant.as_str(),
        request_id = %id,
        reviewer_id = %reviewer.id,
        operation = operation,
        "Reviewer attempted to review their own reset request"
    );
    Err(ResetError::SelfReview)
}

fn log_refusal(
    variant: ResetVariant,
    id: RequestId,
    reviewer: &Actor,
    operation: &'static str,
    error: &ResetError,
) {
    tracing::warn!(
        variant = variant.as_str(),
        request_id = %id,
        reviewer_id = %reviewer.id,
        operation = operation,
        error = %error,
        "Review refused by state machine"
    );
}
