//! End-to-end lifecycle tests over the in-memory providers.
//!
//! These go through `ResetEnvironment` the way the HTTP layer does, and
//! focus on what unit tests cannot show: concurrent callers, rollback on
//! every failure point, and the background sweep.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, Utc};
use opsdesk_reset::config::HashCost;
use opsdesk_reset::mocks::{
    MockClock, MockNotifier, MockRateLimiter, MockResetStore, MockSessionResolver,
};
use opsdesk_reset::{
    AuditAction, CredentialResetRequest, ErrorKind, RequestId, ResetConfig, ResetEnvironment,
    ResetError, ResetStatus, ResetVariant, Role, Submission, SubjectAccount,
};
use std::sync::Arc;

type Env = ResetEnvironment<MockResetStore, MockRateLimiter, MockNotifier, MockSessionResolver>;

const NEW_CREDENTIAL: &str = "Aa1!aa23";

struct Harness {
    env: Arc<Env>,
    store: MockResetStore,
    notifier: MockNotifier,
    sessions: MockSessionResolver,
    clock: MockClock,
    alice: SubjectAccount,
}

fn harness() -> Harness {
    let store = MockResetStore::new();
    let notifier = MockNotifier::new();
    let sessions = MockSessionResolver::new();
    let clock = MockClock::new(Utc::now());
    let config = ResetConfig::default()
        .with_rate_limit(100, 100, std::time::Duration::from_secs(900))
        .with_hash_cost(HashCost {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        });
    let alice = store.with_account(ResetVariant::Guide, "alice@example.com", Role::Guide, "old-hash");

    let env = ResetEnvironment::new(
        store.clone(),
        MockRateLimiter::new(),
        notifier.clone(),
        sessions.clone(),
        Arc::new(clock.clone()),
        config,
    )
    .unwrap();

    Harness {
        env: Arc::new(env),
        store,
        notifier,
        sessions,
        clock,
        alice,
    }
}

impl Harness {
    async fn submit_alice(&self) -> RequestId {
        self.env
            .submissions
            .submit(ResetVariant::Guide, Submission::new("alice@example.com"))
            .await
            .unwrap()
            .request_id
            .unwrap()
    }

    async fn reviewer(&self) -> opsdesk_reset::Actor {
        let (token, _) = self.sessions.issue(Role::Support);
        self.env.authenticate_reviewer(Some(&token)).await.unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_leave_one_pending_request() {
    let h = harness();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let env = Arc::clone(&h.env);
            tokio::spawn(async move {
                env.submissions
                    .submit(ResetVariant::Guide, Submission::new("alice@example.com"))
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                assert!(receipt.request_id.is_some());
                created += 1;
            }
            Err(e) => assert_eq!(e, ResetError::PendingRequestExists),
        }
    }

    assert_eq!(created, 1);
    let pending = h
        .store
        .requests_for(h.alice.subject_id)
        .into_iter()
        .filter(|r| r.status == ResetStatus::Pending)
        .count();
    assert_eq!(pending, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_have_one_winner() {
    let h = harness();
    let id = h.submit_alice().await;
    let reviewer = h.reviewer().await;

    let first = {
        let env = Arc::clone(&h.env);
        tokio::spawn(async move {
            env.orchestrator
                .approve(ResetVariant::Guide, id, &reviewer, NEW_CREDENTIAL, false)
                .await
        })
    };
    let second = {
        let env = Arc::clone(&h.env);
        tokio::spawn(async move {
            env.orchestrator
                .deny(ResetVariant::Guide, id, &reviewer, "duplicate", false)
                .await
        })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in &results {
        if let Err(e) = result {
            assert_eq!(e.kind(), ErrorKind::Conflict);
        }
    }

    // exactly one review audited on top of the submission
    let reviews = h
        .store
        .audit_entries()
        .into_iter()
        .filter(|e| e.action != AuditAction::Submit)
        .count();
    assert_eq!(reviews, 1);
}

#[tokio::test]
async fn reviewing_a_terminal_request_mutates_nothing() {
    let h = harness();
    let id = h.submit_alice().await;
    let reviewer = h.reviewer().await;

    h.env
        .orchestrator
        .deny(ResetVariant::Guide, id, &reviewer, "identity unverified", false)
        .await
        .unwrap();
    let before = h.store.request(id).unwrap();
    let audit_before = h.store.audit_entries().len();

    let err = h
        .env
        .orchestrator
        .approve(ResetVariant::Guide, id, &reviewer, NEW_CREDENTIAL, true)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ResetError::AlreadyReviewed {
            status: ResetStatus::Rejected
        }
    );

    assert_eq!(h.store.request(id).unwrap(), before);
    assert_eq!(h.store.password_hash(h.alice.account_id).unwrap(), "old-hash");
    assert_eq!(h.store.audit_entries().len(), audit_before);
}

#[tokio::test]
async fn support_reviewer_cannot_review_own_request() {
    let h = harness();
    let carol = h.store.with_account(
        ResetVariant::Employee,
        "carol@example.com",
        Role::Support,
        "old-hash",
    );
    let id = h
        .env
        .submissions
        .submit(ResetVariant::Employee, Submission::new("carol@example.com"))
        .await
        .unwrap()
        .request_id
        .unwrap();

    h.sessions.insert(
        "carol-session",
        opsdesk_reset::Actor {
            id: carol.account_id,
            role: Role::Support,
        },
    );
    let carol_reviewer = h
        .env
        .authenticate_reviewer(Some("carol-session"))
        .await
        .unwrap();
    let audit_before = h.store.audit_entries().len();

    let err = h
        .env
        .orchestrator
        .approve(ResetVariant::Employee, id, &carol_reviewer, NEW_CREDENTIAL, true)
        .await
        .unwrap_err();
    assert_eq!(err, ResetError::SelfReview);
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = h
        .env
        .orchestrator
        .deny(ResetVariant::Employee, id, &carol_reviewer, "not needed", true)
        .await
        .unwrap_err();
    assert_eq!(err, ResetError::SelfReview);

    let request = h.store.request(id).unwrap();
    assert_eq!(request.status, ResetStatus::Pending);
    assert_eq!(request.reviewed_by, None);
    assert_eq!(h.store.password_hash(carol.account_id).unwrap(), "old-hash");
    assert_eq!(h.store.audit_entries().len(), audit_before);
    assert!(h.notifier.sent().is_empty());

    // another reviewer can still act on it
    let reviewer = h.reviewer().await;
    h.env
        .orchestrator
        .approve(ResetVariant::Employee, id, &reviewer, NEW_CREDENTIAL, false)
        .await
        .unwrap();
    assert_ne!(h.store.password_hash(carol.account_id).unwrap(), "old-hash");
}

#[tokio::test]
async fn blank_reason_keeps_request_pending() {
    let h = harness();
    let id = h.submit_alice().await;
    let reviewer = h.reviewer().await;

    for reason in ["", "   ", "\n\t"] {
        let err = h
            .env
            .orchestrator
            .deny(ResetVariant::Guide, id, &reviewer, reason, true)
            .await
            .unwrap_err();
        assert_eq!(err, ResetError::MissingReason);
    }
    assert_eq!(h.store.request(id).unwrap().status, ResetStatus::Pending);
}

#[tokio::test]
async fn overdue_request_cannot_be_approved_before_the_sweep() {
    let h = harness();
    let id = h.submit_alice().await;
    let reviewer = h.reviewer().await;
    h.clock.advance(Duration::hours(73));

    let err = h
        .env
        .orchestrator
        .approve(ResetVariant::Guide, id, &reviewer, NEW_CREDENTIAL, true)
        .await
        .unwrap_err();

    assert_eq!(err, ResetError::RequestExpired);
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.store.request(id).unwrap().status, ResetStatus::Pending);
    assert_eq!(h.store.password_hash(h.alice.account_id).unwrap(), "old-hash");
}

#[tokio::test]
async fn every_failure_point_rolls_back() {
    type Inject = fn(&MockResetStore, bool);
    let faults: [(&str, Inject); 3] = [
        ("credential write", MockResetStore::fail_credential_writes),
        ("audit append", MockResetStore::fail_audit),
        ("commit", MockResetStore::fail_commit),
    ];

    for (point, inject) in faults {
        let h = harness();
        let id = h.submit_alice().await;
        let reviewer = h.reviewer().await;
        let audit_before = h.store.audit_entries().len();

        inject(&h.store, true);
        let err = h
            .env
            .orchestrator
            .approve(ResetVariant::Guide, id, &reviewer, NEW_CREDENTIAL, true)
            .await
            .unwrap_err();
        inject(&h.store, false);

        assert_eq!(err.kind(), ErrorKind::Internal, "{point}");
        assert_eq!(h.store.request(id).unwrap().status, ResetStatus::Pending, "{point}");
        assert_eq!(
            h.store.password_hash(h.alice.account_id).unwrap(),
            "old-hash",
            "{point}"
        );
        assert_eq!(h.store.audit_entries().len(), audit_before, "{point}");
        assert!(h.notifier.sent().is_empty(), "{point}");

        // the request is still reviewable afterwards
        h.env
            .orchestrator
            .approve(ResetVariant::Guide, id, &reviewer, NEW_CREDENTIAL, false)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn approval_replaces_credential_and_notifies() {
    let h = harness();
    let id = h.submit_alice().await;
    let reviewer = h.reviewer().await;

    let approved = h
        .env
        .orchestrator
        .approve(ResetVariant::Guide, id, &reviewer, NEW_CREDENTIAL, true)
        .await
        .unwrap();
    assert_eq!(approved.status, ResetStatus::Approved);
    assert_eq!(approved.reviewed_by, Some(reviewer.id));
    assert!(approved.fulfilled_at.is_some());

    let stored = h.store.password_hash(h.alice.account_id).unwrap();
    let credentials = h.env.orchestrator.credentials();
    assert!(credentials.verify(NEW_CREDENTIAL, &stored));
    assert!(!credentials.verify("old-password", &stored));

    // delivery is spawned; give it a moment
    for _ in 0..50 {
        if !h.notifier.sent().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "alice@example.com");
    assert!(!sent[0].body.contains(NEW_CREDENTIAL));
}

#[tokio::test]
async fn failed_notification_does_not_undo_approval() {
    let h = harness();
    let id = h.submit_alice().await;
    let reviewer = h.reviewer().await;
    h.notifier.set_failing(true);

    let approved = h
        .env
        .orchestrator
        .approve(ResetVariant::Guide, id, &reviewer, NEW_CREDENTIAL, true)
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(approved.status, ResetStatus::Approved);
    assert_eq!(h.store.request(id).unwrap().status, ResetStatus::Approved);
}

#[tokio::test]
async fn reviewer_authentication() {
    let h = harness();

    assert_eq!(
        h.env.authenticate_reviewer(None).await.unwrap_err(),
        ResetError::Unauthorized
    );
    assert_eq!(
        h.env.authenticate_reviewer(Some("unknown")).await.unwrap_err(),
        ResetError::Unauthorized
    );

    let (guide_token, _) = h.sessions.issue(Role::Guide);
    assert_eq!(
        h.env
            .authenticate_reviewer(Some(&guide_token))
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::Forbidden
    );

    let (admin_token, admin) = h.sessions.issue(Role::Admin);
    assert_eq!(
        h.env.authenticate_reviewer(Some(&admin_token)).await.unwrap(),
        admin
    );
    h.sessions.revoke(&admin_token);
    assert_eq!(
        h.env.authenticate_reviewer(Some(&admin_token)).await.unwrap_err(),
        ResetError::Unauthorized
    );
}

#[tokio::test]
async fn sweep_expires_and_frees_the_subject() {
    let h = harness();
    let id = h.submit_alice().await;
    h.clock.advance(Duration::hours(72));

    let (sweeper, _shutdown) = h.env.sweeper();
    assert_eq!(sweeper.sweep_once().await.unwrap(), 1);

    let expired: CredentialResetRequest = h.store.request(id).unwrap();
    assert_eq!(expired.status, ResetStatus::Expired);
    let trail = h
        .env
        .orchestrator
        .audit_trail(ResetVariant::Guide, id)
        .await
        .unwrap();
    let actions: Vec<_> = trail.iter().map(|e| e.action).collect();
    assert_eq!(actions, [AuditAction::Submit, AuditAction::Expire]);

    // a new request can be filed now
    let again = h.submit_alice().await;
    assert_ne!(again, id);

    let stats = h.env.orchestrator.stats(ResetVariant::Guide).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.pending, 1);
}
