//! HTTP scenarios against the full router with in-memory providers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use opsdesk_reset::config::HashCost;
use opsdesk_reset::mocks::{
    MockClock, MockNotifier, MockRateLimiter, MockResetStore, MockSessionResolver,
};
use opsdesk_reset::{
    Actor, CredentialMutator, ResetConfig, ResetEnvironment, ResetVariant, Role, SubjectAccount,
};
use opsdesk_server::build_app;
use serde_json::{Value, json};
use std::sync::Arc;

const GUIDES: &str = "/api/v1/guides/reset-requests";
const EMPLOYEES: &str = "/api/v1/employees/reset-requests";

struct Scenario {
    server: TestServer,
    store: MockResetStore,
    sessions: MockSessionResolver,
    credentials: CredentialMutator,
    alice: SubjectAccount,
}

fn scenario() -> Scenario {
    let store = MockResetStore::new();
    let sessions = MockSessionResolver::new();
    let config = ResetConfig::default().with_hash_cost(HashCost {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    });
    let credentials =
        CredentialMutator::new(config.password_policy.clone(), config.hash_cost).unwrap();
    let old_hash = credentials.hash("Old-pass1!").unwrap();
    let alice = store.with_account(ResetVariant::Guide, "alice@example.com", Role::Guide, &old_hash);
    store.with_account(ResetVariant::Employee, "bob@example.com", Role::Employee, &old_hash);

    let env = ResetEnvironment::new(
        store.clone(),
        MockRateLimiter::new(),
        MockNotifier::new(),
        sessions.clone(),
        Arc::new(MockClock::default()),
        config,
    )
    .unwrap();

    Scenario {
        server: TestServer::new(build_app(Arc::new(env))).unwrap(),
        store,
        sessions,
        credentials,
        alice,
    }
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

impl Scenario {
    fn reviewer_token(&self) -> String {
        self.sessions.issue(Role::Support).0
    }

    async fn submit(&self, base: &str, identifier: &str) -> axum_test::TestResponse {
        self.server
            .post(base)
            .json(&json!({ "identifier": identifier, "description": "lost my phone" }))
            .await
    }

    async fn submit_alice(&self) -> String {
        let response = self.submit(GUIDES, "alice@example.com").await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["requestId"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn scenario_a_duplicate_submission_conflicts() {
    let s = scenario();

    let first = s.submit(GUIDES, "alice@example.com").await;
    first.assert_status(StatusCode::CREATED);
    let body: Value = first.json();
    assert!(body["requestId"].is_string());

    let second = s.submit(GUIDES, "Alice@Example.com").await;
    second.assert_status(StatusCode::CONFLICT);
    assert_eq!(second.json::<Value>()["code"], "CONFLICT");
}

#[tokio::test]
async fn unknown_identifier_gets_the_same_message() {
    let s = scenario();

    let known = s.submit(GUIDES, "alice@example.com").await.json::<Value>();
    let unknown = s.submit(GUIDES, "mallory@example.com").await;
    unknown.assert_status(StatusCode::CREATED);
    let unknown = unknown.json::<Value>();

    assert_eq!(known["message"], unknown["message"]);
    assert!(unknown.get("requestId").is_none());
}

#[tokio::test]
async fn scenario_b_approval_replaces_credential() {
    let s = scenario();
    let id = s.submit_alice().await;

    let response = s
        .server
        .post(&format!("{GUIDES}/{id}/approve"))
        .add_header(header::AUTHORIZATION, bearer(&s.reviewer_token()))
        .json(&json!({ "newCredential": "Aa1!aa23" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "approved");
    assert!(body["fulfilledAt"].is_string());

    let stored = s.store.password_hash(s.alice.account_id).unwrap();
    assert!(s.credentials.verify("Aa1!aa23", &stored));
    assert!(!s.credentials.verify("Old-pass1!", &stored));
}

#[tokio::test]
async fn scenario_c_denied_request_cannot_be_approved() {
    let s = scenario();
    let id = s.submit_alice().await;
    let token = s.reviewer_token();

    let denied = s
        .server
        .post(&format!("{GUIDES}/{id}/deny"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "reason": "identity unverified" }))
        .await;
    denied.assert_status_ok();
    let body: Value = denied.json();
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["rejectionReason"], "identity unverified");

    let approve = s
        .server
        .post(&format!("{GUIDES}/{id}/approve"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "newCredential": "Aa1!aa23" }))
        .await;
    approve.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn scenario_d_sixth_submission_is_rate_limited() {
    let s = scenario();

    for _ in 0..5 {
        let status = s.submit(GUIDES, "alice@example.com").await.status_code();
        assert_ne!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    let sixth = s.submit(GUIDES, "alice@example.com").await;
    sixth.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(sixth.json::<Value>()["code"], "RATE_LIMITED");
    assert_eq!(sixth.header(header::RETRY_AFTER), "900");
}

#[tokio::test]
async fn reviewer_endpoints_require_a_reviewer() {
    let s = scenario();
    let id = s.submit_alice().await;
    let approve = format!("{GUIDES}/{id}/approve");
    let body = json!({ "newCredential": "Aa1!aa23" });

    let anonymous = s.server.post(&approve).json(&body).await;
    anonymous.assert_status(StatusCode::UNAUTHORIZED);

    let (guide_token, _) = s.sessions.issue(Role::Guide);
    let guide = s
        .server
        .post(&approve)
        .add_header(header::AUTHORIZATION, bearer(&guide_token))
        .json(&body)
        .await;
    guide.assert_status(StatusCode::FORBIDDEN);

    let stats = s.server.get(&format!("{GUIDES}/stats")).await;
    stats.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn validation_failures_are_bad_requests() {
    let s = scenario();
    let id = s.submit_alice().await;
    let token = s.reviewer_token();

    let weak = s
        .server
        .post(&format!("{GUIDES}/{id}/approve"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "newCredential": "short" }))
        .await;
    weak.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(weak.json::<Value>()["code"], "VALIDATION_ERROR");

    let blank = s
        .server
        .post(&format!("{GUIDES}/{id}/deny"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "reason": "   " }))
        .await;
    blank.assert_status(StatusCode::BAD_REQUEST);

    let bad_identifier = s.submit(GUIDES, "not-an-email").await;
    bad_identifier.assert_status(StatusCode::BAD_REQUEST);

    // still pending after all of the above
    let current = s
        .server
        .get(&format!("{GUIDES}/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    current.assert_status_ok();
    assert_eq!(current.json::<Value>()["status"], "pending");
}

#[tokio::test]
async fn employee_routes_use_their_own_labels() {
    let s = scenario();
    let token = s.reviewer_token();

    let submitted = s.submit(EMPLOYEES, "bob@example.com").await;
    submitted.assert_status(StatusCode::CREATED);
    let id = submitted.json::<Value>()["requestId"].as_str().unwrap().to_string();

    let denied = s
        .server
        .post(&format!("{EMPLOYEES}/{id}/deny"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "reason": "caller could not verify employee number", "notifyRequester": false }))
        .await;
    denied.assert_status_ok();
    assert_eq!(denied.json::<Value>()["status"], "denied");

    let listed = s
        .server
        .get(EMPLOYEES)
        .add_query_param("status", "denied")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    listed.assert_status_ok();
    let requests = listed.json::<Value>()["requests"].as_array().unwrap().clone();
    assert_eq!(requests.len(), 1);

    let approve = s
        .server
        .post(&format!("{EMPLOYEES}/{id}/approve"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "newCredential": "Aa1!aa23" }))
        .await;
    approve.assert_status(StatusCode::CONFLICT);
    let body: Value = approve.json();
    assert_eq!(body["code"], "CONFLICT");
    assert_eq!(body["message"], "Reset request was already denied");

    // an employee request is invisible on the guide routes
    let cross = s
        .server
        .get(&format!("{GUIDES}/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    cross.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reviewer_cannot_approve_own_request() {
    let s = scenario();
    let carol = s
        .store
        .with_account(ResetVariant::Employee, "carol@example.com", Role::Support, "old-hash");
    s.sessions.insert(
        "carol-session",
        Actor {
            id: carol.account_id,
            role: Role::Support,
        },
    );

    let submitted = s.submit(EMPLOYEES, "carol@example.com").await;
    submitted.assert_status(StatusCode::CREATED);
    let id = submitted.json::<Value>()["requestId"].as_str().unwrap().to_string();

    let approve = s
        .server
        .post(&format!("{EMPLOYEES}/{id}/approve"))
        .add_header(header::AUTHORIZATION, bearer("carol-session"))
        .json(&json!({ "newCredential": "Aa1!aa23" }))
        .await;
    approve.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(approve.json::<Value>()["code"], "FORBIDDEN");
    assert_eq!(s.store.password_hash(carol.account_id).unwrap(), "old-hash");

    let fetched = s
        .server
        .get(&format!("{EMPLOYEES}/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&s.reviewer_token()))
        .await;
    assert_eq!(fetched.json::<Value>()["status"], "pending");
}

#[tokio::test]
async fn stats_and_audit_trail() {
    let s = scenario();
    let token = s.reviewer_token();
    let id = s.submit_alice().await;

    s.server
        .post(&format!("{GUIDES}/{id}/approve"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "newCredential": "Aa1!aa23", "notifyRequester": false }))
        .await
        .assert_status_ok();

    let stats = s
        .server
        .get(&format!("{GUIDES}/stats"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    stats.assert_status_ok();
    let stats: Value = stats.json();
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["approved"], 1);
    assert_eq!(stats["approvalRate"], 100.0);

    let audit = s
        .server
        .get(&format!("{GUIDES}/{id}/audit"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    audit.assert_status_ok();
    let entries = audit.json::<Value>()["entries"].as_array().unwrap().clone();
    let actions: Vec<_> = entries.iter().map(|e| e["action"].as_str().unwrap().to_string()).collect();
    assert_eq!(actions, ["submit", "approve"]);
}

#[tokio::test]
async fn health_and_correlation_id() {
    let s = scenario();

    let response = s.server.get("/health").await;
    response.assert_status_ok();
    assert!(response.headers().contains_key("x-correlation-id"));
}
