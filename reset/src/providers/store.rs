//! Request storage and the transactional session.

use crate::audit::AuditEntry;
use crate::error::Result;
use crate::model::{
    AccountId, CredentialResetRequest, LinkedAccount, RequestId, ResetStatus, ResetVariant,
    SubjectAccount, SubjectId,
};
use crate::stats::StatusCounts;
use chrono::{DateTime, Utc};
use std::future::Future;

/// Persistent storage for reset requests.
///
/// Each variant lives in its own collection. Storage must enforce a partial
/// uniqueness constraint: at most one `pending` request per subject and
/// variant. [`ResetTransaction::insert_request`] reports a violation as
/// `ResetError::PendingRequestExists`.
///
/// Everything that changes more than one record goes through a
/// [`ResetTransaction`] obtained from [`ResetStore::begin`].
pub trait ResetStore: Send + Sync {
    /// Transactional session type.
    type Tx: ResetTransaction;

    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` if no session can be opened.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx>> + Send;

    /// Resolve a submitted email to the owning subject of this variant.
    ///
    /// Returns `Ok(None)` when no subject of the variant uses that email.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure.
    fn find_subject(
        &self,
        variant: ResetVariant,
        email: &str,
    ) -> impl Future<Output = Result<Option<SubjectAccount>>> + Send;

    /// Current pending request of a subject, if any.
    ///
    /// Overdue rows the sweep has not reached yet are still returned.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure.
    fn find_pending(
        &self,
        variant: ResetVariant,
        subject_id: SubjectId,
    ) -> impl Future<Output = Result<Option<CredentialResetRequest>>> + Send;

    /// Fetch a request by ID (no locking).
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure.
    fn get_request(
        &self,
        variant: ResetVariant,
        id: RequestId,
    ) -> impl Future<Output = Result<Option<CredentialResetRequest>>> + Send;

    /// List requests newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure.
    fn list_requests(
        &self,
        variant: ResetVariant,
        status: Option<ResetStatus>,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<CredentialResetRequest>>> + Send;

    /// IDs of pending requests whose deadline is at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure.
    fn list_overdue(
        &self,
        variant: ResetVariant,
        now: DateTime<Utc>,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<RequestId>>> + Send;

    /// Aggregate counts for the statistics endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure.
    fn status_counts(
        &self,
        variant: ResetVariant,
    ) -> impl Future<Output = Result<StatusCounts>> + Send;

    /// Audit entries of one request, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure.
    fn audit_trail(
        &self,
        variant: ResetVariant,
        id: RequestId,
    ) -> impl Future<Output = Result<Vec<AuditEntry>>> + Send;
}

/// One atomic unit of work.
///
/// Writes are visible to other readers only after [`ResetTransaction::commit`].
/// Dropping a transaction without committing discards every staged write, so
/// an early `?` return is a rollback.
pub trait ResetTransaction: Send {
    /// Read a request and lock it until the transaction ends.
    ///
    /// A concurrent transaction locking the same request waits until this one
    /// commits or rolls back, then observes its result.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure.
    fn lock_request(
        &mut self,
        variant: ResetVariant,
        id: RequestId,
    ) -> impl Future<Output = Result<Option<CredentialResetRequest>>> + Send;

    /// Insert a new request.
    ///
    /// # Errors
    ///
    /// - second pending request for the subject → `ResetError::PendingRequestExists`
    /// - storage failure → `ResetError::DatabaseError`
    fn insert_request(
        &mut self,
        request: &CredentialResetRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Resolve the account owned by a subject.
    ///
    /// # Errors
    ///
    /// - subject or account missing → `ResetError::InternalError`
    /// - storage failure → `ResetError::DatabaseError`
    fn resolve_linked_account(
        &mut self,
        variant: ResetVariant,
        subject_id: SubjectId,
    ) -> impl Future<Output = Result<LinkedAccount>> + Send;

    /// Overwrite an account's password hash.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure or if the
    /// account does not exist.
    fn store_password_hash(
        &mut self,
        account_id: AccountId,
        password_hash: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Persist the new state of a locked request.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure.
    fn update_request(
        &mut self,
        request: &CredentialResetRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Append an audit entry.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` on storage failure.
    fn append_audit(&mut self, entry: &AuditEntry) -> impl Future<Output = Result<()>> + Send;

    /// Make every staged write durable and visible.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` if the commit fails; nothing is
    /// applied in that case.
    fn commit(self) -> impl Future<Output = Result<()>> + Send;
}
