//! Request submission.
//!
//! Subjects file requests without a session. The service rate-limits by
//! identifier and client IP, resolves the identifier to a subject, and
//! writes a new pending request together with its audit entry.
//!
//! Unknown identifiers get the same message as successful submissions so
//! the endpoint cannot be used to probe which emails have accounts.

use crate::audit::{AuditAction, AuditEntry, AuditRecorder};
use crate::clock::Clock;
use crate::config::ResetConfig;
use crate::error::{ResetError, Result};
use crate::metrics;
use crate::model::{CredentialResetRequest, RequestId, RequestOrigin, ResetVariant};
use crate::orchestrator::expire_overdue;
use crate::providers::{RateLimiter, ResetStore, ResetTransaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message returned for every accepted submission.
pub const RECEIPT_MESSAGE: &str =
    "If an account with that email exists, a reset request has been filed for review.";

/// A subject's reset request as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Email identifying the subject.
    pub identifier: String,
    /// Optional context for the reviewer.
    pub description: Option<String>,
    /// Client information.
    pub origin: RequestOrigin,
}

impl Submission {
    /// Submission for `identifier` with no description or origin.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            description: None,
            origin: RequestOrigin::default(),
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach client information.
    #[must_use]
    pub fn with_origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// Response to an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    /// Human-readable confirmation, identical for known and unknown identifiers.
    pub message: String,
    /// ID of the created request, only when one was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

/// Normalize and sanity-check an email identifier.
fn normalize_identifier(identifier: &str) -> Result<String> {
    let email = identifier.trim().to_lowercase();
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(ResetError::InvalidIdentifier);
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ResetError::InvalidIdentifier);
    };
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(ResetError::InvalidIdentifier);
    }
    Ok(email)
}

/// Files reset requests.
pub struct SubmissionService<S, RL> {
    store: Arc<S>,
    limiter: Arc<RL>,
    audit: AuditRecorder,
    clock: Arc<dyn Clock>,
    config: ResetConfig,
}

impl<S, RL> SubmissionService<S, RL>
where
    S: ResetStore,
    RL: RateLimiter,
{
    /// Create a submission service.
    #[must_use]
    pub fn new(store: Arc<S>, limiter: Arc<RL>, clock: Arc<dyn Clock>, config: ResetConfig) -> Self {
        Self {
            store,
            limiter,
            audit: AuditRecorder::new(),
            clock,
            config,
        }
    }

    /// File a reset request for the subject behind `submission.identifier`.
    ///
    /// # Errors
    ///
    /// - malformed identifier or overlong description → validation errors
    /// - too many attempts → `ResetError::RateLimited`
    /// - account ineligible for this flow → `ResetError::IneligibleAccount`
    /// - pending request exists → `ResetError::PendingRequestExists`
    /// - storage failure → `ResetError::DatabaseError`
    pub async fn submit(
        &self,
        variant: ResetVariant,
        submission: Submission,
    ) -> Result<SubmissionReceipt> {
        let result = self.submit_inner(variant, submission).await;
        match &result {
            Ok(receipt) if receipt.request_id.is_some() => metrics::submission(variant, "created"),
            Ok(_) => metrics::submission(variant, "unknown_identifier"),
            Err(e) => metrics::submission(variant, e.kind().code()),
        }
        result
    }

    async fn submit_inner(
        &self,
        variant: ResetVariant,
        submission: Submission,
    ) -> Result<SubmissionReceipt> {
        let email = normalize_identifier(&submission.identifier)?;
        let description = submission
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if description
            .as_ref()
            .is_some_and(|d| d.chars().count() > self.config.max_text_length)
        {
            return Err(ResetError::InvalidInput(format!(
                "Description must be at most {} characters",
                self.config.max_text_length
            )));
        }

        let window = self.config.rate_limit_window;
        self.limiter
            .check_and_record(
                &format!("reset:{variant}:{email}"),
                self.config.max_submissions_per_identifier,
                window,
            )
            .await?;
        if let Some(ip) = submission.origin.ip {
            self.limiter
                .check_and_record(
                    &format!("reset:{variant}:ip:{ip}"),
                    self.config.max_submissions_per_ip,
                    window,
                )
                .await?;
        }

        let Some(subject) = self.store.find_subject(variant, &email).await? else {
            tracing::debug!(variant = variant.as_str(), "Reset submitted for unknown identifier");
            return Ok(SubmissionReceipt {
                message: RECEIPT_MESSAGE.to_string(),
                request_id: None,
            });
        };

        if !variant.is_eligible(subject.role) {
            tracing::warn!(
                variant = variant.as_str(),
                subject_id = %subject.subject_id,
                role = subject.role.as_str(),
                "Reset submitted for ineligible account"
            );
            return Err(ResetError::IneligibleAccount);
        }

        let now = self.clock.now();
        if let Some(existing) = self.store.find_pending(variant, subject.subject_id).await? {
            if !existing.is_overdue(now) {
                return Err(ResetError::PendingRequestExists);
            }
            // The sweep has not reached it yet.
            match expire_overdue(&*self.store, &self.audit, variant, existing.id, now).await {
                Ok(_) | Err(ResetError::AlreadyReviewed { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let request = CredentialResetRequest::pending(
            variant,
            &subject,
            description,
            submission.origin,
            now,
            self.config.request_ttl,
        );

        let mut tx = self.store.begin().await?;
        tx.insert_request(&request).await?;
        let entry = AuditEntry::status_change(
            variant,
            request.id,
            None,
            AuditAction::Submit,
            None,
            request.status,
            now,
        );
        self.audit.record(&mut tx, &entry).await?;
        tx.commit().await?;

        tracing::info!(
            variant = variant.as_str(),
            request_id = %request.id,
            subject_id = %subject.subject_id,
            expires_at = %request.expires_at,
            "Reset request filed"
        );

        Ok(SubmissionReceipt {
            message: RECEIPT_MESSAGE.to_string(),
            request_id: Some(request.id),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mocks::{MockClock, MockRateLimiter, MockResetStore};
    use crate::model::{ResetStatus, Role};
    use chrono::{Duration, Utc};

    fn service(
        store: &MockResetStore,
        clock: &MockClock,
    ) -> SubmissionService<MockResetStore, MockRateLimiter> {
        SubmissionService::new(
            Arc::new(store.clone()),
            Arc::new(MockRateLimiter::new()),
            Arc::new(clock.clone()),
            ResetConfig::default(),
        )
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(
            normalize_identifier("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
        for bad in ["", "alice", "@example.com", "alice@", "alice@example", "a b@example.com", "a@b@c.com"] {
            assert_eq!(normalize_identifier(bad), Err(ResetError::InvalidIdentifier), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_submit_then_duplicate() {
        let store = MockResetStore::new();
        let clock = MockClock::new(Utc::now());
        let subject = store.with_account(ResetVariant::Guide, "alice@example.com", Role::Guide, "h");
        let service = service(&store, &clock);

        let receipt = service
            .submit(ResetVariant::Guide, Submission::new("alice@example.com"))
            .await
            .unwrap();
        let id = receipt.request_id.unwrap();
        assert_eq!(store.request(id).unwrap().subject_id, subject.subject_id);
        assert_eq!(store.audit_entries()[0].action, AuditAction::Submit);

        let err = service
            .submit(ResetVariant::Guide, Submission::new("alice@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, ResetError::PendingRequestExists);
    }

    #[tokio::test]
    async fn test_unknown_identifier_gets_generic_receipt() {
        let store = MockResetStore::new();
        let clock = MockClock::new(Utc::now());
        store.with_account(ResetVariant::Guide, "alice@example.com", Role::Guide, "h");
        let service = service(&store, &clock);

        let known = service
            .submit(ResetVariant::Guide, Submission::new("alice@example.com"))
            .await
            .unwrap();
        let unknown = service
            .submit(ResetVariant::Guide, Submission::new("mallory@example.com"))
            .await
            .unwrap();

        assert_eq!(known.message, unknown.message);
        assert!(unknown.request_id.is_none());
    }

    #[tokio::test]
    async fn test_per_ip_limit_spans_identifiers() {
        let store = MockResetStore::new();
        let clock = MockClock::new(Utc::now());
        let window = std::time::Duration::from_secs(900);
        let service = SubmissionService::new(
            Arc::new(store.clone()),
            Arc::new(MockRateLimiter::new()),
            Arc::new(clock.clone()),
            ResetConfig::default().with_rate_limit(100, 3, window),
        );
        let from = |ip: &str, n: u32| {
            Submission::new(format!("user{n}@example.com")).with_origin(RequestOrigin {
                ip: Some(ip.parse().unwrap()),
                user_agent: None,
            })
        };

        for n in 0..3 {
            service
                .submit(ResetVariant::Guide, from("203.0.113.7", n))
                .await
                .unwrap();
        }
        let err = service
            .submit(ResetVariant::Guide, from("203.0.113.7", 3))
            .await
            .unwrap_err();
        assert!(matches!(err, ResetError::RateLimited { retry_after } if retry_after <= window));

        service
            .submit(ResetVariant::Guide, from("198.51.100.9", 4))
            .await
            .unwrap();
        // the same address on the other flow has its own budget
        service
            .submit(ResetVariant::Employee, from("203.0.113.7", 5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ineligible_role_conflicts() {
        let store = MockResetStore::new();
        let clock = MockClock::new(Utc::now());
        store.with_account(ResetVariant::Employee, "root@example.com", Role::Admin, "h");
        let service = service(&store, &clock);

        let err = service
            .submit(ResetVariant::Employee, Submission::new("root@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, ResetError::IneligibleAccount);
    }

    #[tokio::test]
    async fn test_overdue_pending_is_expired_in_place() {
        let store = MockResetStore::new();
        let clock = MockClock::new(Utc::now());
        store.with_account(ResetVariant::Guide, "alice@example.com", Role::Guide, "h");
        let service = service(&store, &clock);

        let first = service
            .submit(ResetVariant::Guide, Submission::new("alice@example.com"))
            .await
            .unwrap()
            .request_id
            .unwrap();
        clock.advance(Duration::hours(80));

        let second = service
            .submit(ResetVariant::Guide, Submission::new("alice@example.com"))
            .await
            .unwrap()
            .request_id
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(store.request(first).unwrap().status, ResetStatus::Expired);
        assert_eq!(store.request(second).unwrap().status, ResetStatus::Pending);
    }

    #[tokio::test]
    async fn test_overlong_description_rejected() {
        let store = MockResetStore::new();
        let clock = MockClock::new(Utc::now());
        let service = service(&store, &clock);

        let err = service
            .submit(
                ResetVariant::Guide,
                Submission::new("alice@example.com").with_description("x".repeat(2001)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResetError::InvalidInput(_)));
    }
}
