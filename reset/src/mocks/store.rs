//! Mock reset store for testing.
//!
//! Behaves like the Postgres store where the workflow can tell the
//! difference: transactions are serialized, writes are staged until commit,
//! and the pending-uniqueness rule is checked atomically on insert.

use crate::audit::AuditEntry;
use crate::error::{ResetError, Result};
use crate::model::{
    AccountId, CredentialResetRequest, LinkedAccount, RequestId, ResetStatus, ResetVariant, Role,
    SubjectAccount, SubjectId,
};
use crate::providers::{ResetStore, ResetTransaction};
use crate::stats::StatusCounts;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

#[derive(Debug, Clone)]
struct AccountRecord {
    email: String,
    password_hash: String,
}

#[derive(Debug, Default)]
struct MockData {
    subjects: Vec<(ResetVariant, SubjectAccount)>,
    accounts: HashMap<AccountId, AccountRecord>,
    requests: HashMap<RequestId, CredentialResetRequest>,
    audit: Vec<AuditEntry>,
}

#[derive(Debug, Default)]
struct Faults {
    credential_write: AtomicBool,
    audit: AtomicBool,
    commit: AtomicBool,
}

/// In-memory reset store.
///
/// Clones share the same data. Faults can be injected into the credential
/// write, the audit append and the commit to exercise rollback paths.
#[derive(Debug, Clone, Default)]
pub struct MockResetStore {
    data: Arc<Mutex<MockData>>,
    tx_lock: Arc<tokio::sync::Mutex<()>>,
    faults: Arc<Faults>,
    begun: Arc<AtomicUsize>,
}

impl MockResetStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockData>> {
        self.data
            .lock()
            .map_err(|_| ResetError::DatabaseError("Mutex lock failed".into()))
    }

    /// Seed a subject of `variant` with its account.
    ///
    /// Returns the created subject.
    pub fn with_account(
        &self,
        variant: ResetVariant,
        email: &str,
        role: Role,
        password_hash: &str,
    ) -> SubjectAccount {
        let subject = SubjectAccount {
            subject_id: SubjectId::new(),
            account_id: AccountId::new(),
            email: email.to_lowercase(),
            role,
        };
        if let Ok(mut data) = self.data.lock() {
            data.accounts.insert(
                subject.account_id,
                AccountRecord {
                    email: subject.email.clone(),
                    password_hash: password_hash.to_string(),
                },
            );
            data.subjects.push((variant, subject.clone()));
        }
        subject
    }

    /// Insert a request as-is, bypassing the uniqueness rule.
    pub fn seed_request(&self, request: CredentialResetRequest) {
        if let Ok(mut data) = self.data.lock() {
            data.requests.insert(request.id, request);
        }
    }

    /// Committed state of a request.
    #[must_use]
    pub fn request(&self, id: RequestId) -> Option<CredentialResetRequest> {
        self.data.lock().ok()?.requests.get(&id).cloned()
    }

    /// Committed requests of a subject.
    #[must_use]
    pub fn requests_for(&self, subject_id: SubjectId) -> Vec<CredentialResetRequest> {
        self.data
            .lock()
            .map(|data| {
                data.requests
                    .values()
                    .filter(|r| r.subject_id == subject_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Committed password hash of an account.
    #[must_use]
    pub fn password_hash(&self, account_id: AccountId) -> Option<String> {
        self.data
            .lock()
            .ok()?
            .accounts
            .get(&account_id)
            .map(|a| a.password_hash.clone())
    }

    /// Every committed audit entry, in insertion order.
    #[must_use]
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.data
            .lock()
            .map(|data| data.audit.clone())
            .unwrap_or_default()
    }

    /// Transactions opened so far, committed or not.
    #[must_use]
    pub fn transactions_begun(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }

    /// Make credential writes fail.
    pub fn fail_credential_writes(&self, fail: bool) {
        self.faults.credential_write.store(fail, Ordering::SeqCst);
    }

    /// Make audit appends fail.
    pub fn fail_audit(&self, fail: bool) {
        self.faults.audit.store(fail, Ordering::SeqCst);
    }

    /// Make commits fail.
    pub fn fail_commit(&self, fail: bool) {
        self.faults.commit.store(fail, Ordering::SeqCst);
    }
}

fn has_pending(data: &MockData, variant: ResetVariant, subject_id: SubjectId) -> bool {
    data.requests.values().any(|r| {
        r.variant == variant && r.subject_id == subject_id && r.status == ResetStatus::Pending
    })
}

impl ResetStore for MockResetStore {
    type Tx = MockTransaction;

    async fn begin(&self) -> Result<MockTransaction> {
        let guard = Arc::clone(&self.tx_lock).lock_owned().await;
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(MockTransaction {
            data: Arc::clone(&self.data),
            faults: Arc::clone(&self.faults),
            staged: Vec::new(),
            _guard: guard,
        })
    }

    async fn find_subject(
        &self,
        variant: ResetVariant,
        email: &str,
    ) -> Result<Option<SubjectAccount>> {
        let email = email.to_lowercase();
        let data = self.lock()?;
        Ok(data
            .subjects
            .iter()
            .find(|(v, s)| *v == variant && s.email == email)
            .map(|(_, s)| s.clone()))
    }

    async fn find_pending(
        &self,
        variant: ResetVariant,
        subject_id: SubjectId,
    ) -> Result<Option<CredentialResetRequest>> {
        let data = self.lock()?;
        Ok(data
            .requests
            .values()
            .find(|r| {
                r.variant == variant
                    && r.subject_id == subject_id
                    && r.status == ResetStatus::Pending
            })
            .cloned())
    }

    async fn get_request(
        &self,
        variant: ResetVariant,
        id: RequestId,
    ) -> Result<Option<CredentialResetRequest>> {
        let data = self.lock()?;
        Ok(data
            .requests
            .get(&id)
            .filter(|r| r.variant == variant)
            .cloned())
    }

    async fn list_requests(
        &self,
        variant: ResetVariant,
        status: Option<ResetStatus>,
        limit: u32,
    ) -> Result<Vec<CredentialResetRequest>> {
        let data = self.lock()?;
        let mut requests: Vec<_> = data
            .requests
            .values()
            .filter(|r| r.variant == variant && status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        requests.truncate(limit as usize);
        Ok(requests)
    }

    async fn list_overdue(
        &self,
        variant: ResetVariant,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RequestId>> {
        let data = self.lock()?;
        let mut overdue: Vec<_> = data
            .requests
            .values()
            .filter(|r| {
                r.variant == variant && r.status == ResetStatus::Pending && r.is_overdue(now)
            })
            .collect();
        overdue.sort_by_key(|r| r.expires_at);
        Ok(overdue
            .into_iter()
            .take(limit as usize)
            .map(|r| r.id)
            .collect())
    }

    async fn status_counts(&self, variant: ResetVariant) -> Result<StatusCounts> {
        let data = self.lock()?;
        let mut counts = StatusCounts::default();
        let mut response_secs = Vec::new();

        for request in data.requests.values().filter(|r| r.variant == variant) {
            match request.status {
                ResetStatus::Pending => counts.pending += 1,
                ResetStatus::Approved => counts.approved += 1,
                ResetStatus::Rejected => counts.rejected += 1,
                ResetStatus::Expired => counts.expired += 1,
            }
            if let Some(reviewed_at) = request.reviewed_at {
                #[allow(clippy::cast_precision_loss)]
                response_secs.push((reviewed_at - request.requested_at).num_milliseconds() as f64 / 1000.0);
            }
        }

        if !response_secs.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let mean = response_secs.iter().sum::<f64>() / response_secs.len() as f64;
            counts.average_response_seconds = Some(mean);
        }
        Ok(counts)
    }

    async fn audit_trail(&self, variant: ResetVariant, id: RequestId) -> Result<Vec<AuditEntry>> {
        let data = self.lock()?;
        Ok(data
            .audit
            .iter()
            .filter(|e| e.target_type == variant.target_type() && e.target_id == id)
            .cloned()
            .collect())
    }
}

#[derive(Debug)]
enum StagedWrite {
    PasswordHash(AccountId, String),
    Request(CredentialResetRequest),
    Audit(AuditEntry),
}

/// Transaction over a [`MockResetStore`].
///
/// Holds the store-wide transaction lock until committed or dropped.
#[derive(Debug)]
pub struct MockTransaction {
    data: Arc<Mutex<MockData>>,
    faults: Arc<Faults>,
    staged: Vec<StagedWrite>,
    _guard: OwnedMutexGuard<()>,
}

impl MockTransaction {
    fn lock(&self) -> Result<MutexGuard<'_, MockData>> {
        self.data
            .lock()
            .map_err(|_| ResetError::DatabaseError("Mutex lock failed".into()))
    }
}

impl ResetTransaction for MockTransaction {
    async fn lock_request(
        &mut self,
        variant: ResetVariant,
        id: RequestId,
    ) -> Result<Option<CredentialResetRequest>> {
        let data = self.lock()?;
        Ok(data
            .requests
            .get(&id)
            .filter(|r| r.variant == variant)
            .cloned())
    }

    async fn insert_request(&mut self, request: &CredentialResetRequest) -> Result<()> {
        if request.status == ResetStatus::Pending {
            let staged_pending = self.staged.iter().any(|write| {
                matches!(write, StagedWrite::Request(r)
                    if r.variant == request.variant
                        && r.subject_id == request.subject_id
                        && r.status == ResetStatus::Pending)
            });
            if staged_pending || has_pending(&*self.lock()?, request.variant, request.subject_id) {
                return Err(ResetError::PendingRequestExists);
            }
        }
        self.staged.push(StagedWrite::Request(request.clone()));
        Ok(())
    }

    async fn resolve_linked_account(
        &mut self,
        variant: ResetVariant,
        subject_id: SubjectId,
    ) -> Result<LinkedAccount> {
        let data = self.lock()?;
        let subject = data
            .subjects
            .iter()
            .find(|(v, s)| *v == variant && s.subject_id == subject_id)
            .map(|(_, s)| s)
            .ok_or_else(|| {
                ResetError::InternalError(format!("Subject {subject_id} has no record"))
            })?;
        let account = data.accounts.get(&subject.account_id).ok_or_else(|| {
            ResetError::InternalError(format!("Subject {subject_id} has no linked account"))
        })?;
        Ok(LinkedAccount {
            account_id: subject.account_id,
            email: account.email.clone(),
        })
    }

    async fn store_password_hash(&mut self, account_id: AccountId, password_hash: &str) -> Result<()> {
        if self.faults.credential_write.load(Ordering::SeqCst) {
            return Err(ResetError::DatabaseError("Injected credential write failure".into()));
        }
        if !self.lock()?.accounts.contains_key(&account_id) {
            return Err(ResetError::DatabaseError(format!("Account {account_id} not found")));
        }
        self.staged
            .push(StagedWrite::PasswordHash(account_id, password_hash.to_string()));
        Ok(())
    }

    async fn update_request(&mut self, request: &CredentialResetRequest) -> Result<()> {
        self.staged.push(StagedWrite::Request(request.clone()));
        Ok(())
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        if self.faults.audit.load(Ordering::SeqCst) {
            return Err(ResetError::DatabaseError("Injected audit failure".into()));
        }
        self.staged.push(StagedWrite::Audit(entry.clone()));
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        if self.faults.commit.load(Ordering::SeqCst) {
            return Err(ResetError::DatabaseError("Injected commit failure".into()));
        }

        let mut data = self
            .data
            .lock()
            .map_err(|_| ResetError::DatabaseError("Mutex lock failed".into()))?;
        for write in self.staged {
            match write {
                StagedWrite::PasswordHash(account_id, hash) => {
                    if let Some(account) = data.accounts.get_mut(&account_id) {
                        account.password_hash = hash;
                    }
                }
                StagedWrite::Request(request) => {
                    data.requests.insert(request.id, request);
                }
                StagedWrite::Audit(entry) => data.audit.push(entry),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::RequestOrigin;
    use chrono::Duration;

    fn pending(variant: ResetVariant, subject: &SubjectAccount) -> CredentialResetRequest {
        CredentialResetRequest::pending(
            variant,
            subject,
            None,
            RequestOrigin::default(),
            Utc::now(),
            Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn test_second_pending_insert_conflicts() {
        let store = MockResetStore::new();
        let subject = store.with_account(ResetVariant::Guide, "a@example.com", Role::Guide, "h");

        let mut tx = store.begin().await.unwrap();
        tx.insert_request(&pending(ResetVariant::Guide, &subject))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_request(&pending(ResetVariant::Guide, &subject))
            .await
            .unwrap_err();
        assert_eq!(err, ResetError::PendingRequestExists);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = MockResetStore::new();
        let subject = store.with_account(ResetVariant::Guide, "a@example.com", Role::Guide, "old");

        {
            let mut tx = store.begin().await.unwrap();
            tx.store_password_hash(subject.account_id, "new").await.unwrap();
        }
        assert_eq!(store.password_hash(subject.account_id).as_deref(), Some("old"));

        let mut tx = store.begin().await.unwrap();
        tx.store_password_hash(subject.account_id, "new").await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.password_hash(subject.account_id).as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_find_subject_is_scoped_to_variant() {
        let store = MockResetStore::new();
        store.with_account(ResetVariant::Employee, "Bob@Example.com", Role::Support, "h");

        assert!(store
            .find_subject(ResetVariant::Employee, "bob@example.com")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_subject(ResetVariant::Guide, "bob@example.com")
            .await
            .unwrap()
            .is_none());
    }
}
