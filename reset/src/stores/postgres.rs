//! `PostgreSQL` reset store.
//!
//! Each variant has its own request table with a partial unique index on
//! `subject_id WHERE status = 'pending'`. Review transactions lock the
//! request row with `SELECT ... FOR UPDATE`, so concurrent reviews of one
//! request are serialized and the loser sees the terminal status.
//!
//! # Example
//!
//! ```no_run
//! use opsdesk_reset::stores::PostgresResetStore;
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/opsdesk").await?;
//! let store = PostgresResetStore::new(pool);
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use crate::audit::{AuditAction, AuditEntry};
use crate::error::{ResetError, Result};
use crate::model::{
    AccountId, CredentialResetRequest, LinkedAccount, RequestId, ResetStatus, ResetVariant, Role,
    SubjectAccount, SubjectId,
};
use crate::providers::{ResetStore, ResetTransaction};
use crate::stats::StatusCounts;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

const REQUEST_COLUMNS: &str = "id, subject_id, requester_role, status, description, \
    rejection_reason, requested_at, reviewed_at, fulfilled_at, expires_at, reviewed_by, \
    requested_from_ip, requested_agent, created_at, updated_at";

const fn request_table(variant: ResetVariant) -> &'static str {
    match variant {
        ResetVariant::Guide => "guide_password_resets",
        ResetVariant::Employee => "employee_password_resets",
    }
}

const fn subject_table(variant: ResetVariant) -> &'static str {
    match variant {
        ResetVariant::Guide => "guides",
        ResetVariant::Employee => "employees",
    }
}

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> ResetError {
    move |e| ResetError::DatabaseError(format!("{context}: {e}"))
}

fn parse_role(value: &str) -> Result<Role> {
    Role::parse(value).ok_or_else(|| ResetError::DatabaseError(format!("Unknown role: {value}")))
}

fn row_to_request(variant: ResetVariant, row: &PgRow) -> Result<CredentialResetRequest> {
    let decode = |e: sqlx::Error| ResetError::DatabaseError(format!("Failed to decode reset request: {e}"));

    let status: String = row.try_get("status").map_err(decode)?;
    let requester_role: String = row.try_get("requester_role").map_err(decode)?;
    let ip: Option<String> = row.try_get("requested_from_ip").map_err(decode)?;

    Ok(CredentialResetRequest {
        id: RequestId(row.try_get("id").map_err(decode)?),
        variant,
        subject_id: SubjectId(row.try_get("subject_id").map_err(decode)?),
        requester_role: parse_role(&requester_role)?,
        status: ResetStatus::parse(&status)
            .ok_or_else(|| ResetError::DatabaseError(format!("Unknown status: {status}")))?,
        description: row.try_get("description").map_err(decode)?,
        rejection_reason: row.try_get("rejection_reason").map_err(decode)?,
        requested_at: row.try_get("requested_at").map_err(decode)?,
        reviewed_at: row.try_get("reviewed_at").map_err(decode)?,
        fulfilled_at: row.try_get("fulfilled_at").map_err(decode)?,
        expires_at: row.try_get("expires_at").map_err(decode)?,
        reviewed_by: row
            .try_get::<Option<uuid::Uuid>, _>("reviewed_by")
            .map_err(decode)?
            .map(AccountId),
        requested_from_ip: ip.and_then(|ip| ip.parse().ok()),
        requested_agent: row.try_get("requested_agent").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn row_to_audit(row: &PgRow) -> Result<AuditEntry> {
    let decode = |e: sqlx::Error| ResetError::DatabaseError(format!("Failed to decode audit entry: {e}"));
    let action: String = row.try_get("action").map_err(decode)?;

    Ok(AuditEntry {
        id: row.try_get("id").map_err(decode)?,
        target_type: row.try_get("target_type").map_err(decode)?,
        target_id: RequestId(row.try_get("target_id").map_err(decode)?),
        actor_id: row
            .try_get::<Option<uuid::Uuid>, _>("actor_id")
            .map_err(decode)?
            .map(AccountId),
        action: AuditAction::parse(&action)
            .ok_or_else(|| ResetError::DatabaseError(format!("Unknown audit action: {action}")))?,
        note: row.try_get("note").map_err(decode)?,
        before: row.try_get("before").map_err(decode)?,
        after: row.try_get("after").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

/// `PostgreSQL` reset store.
#[derive(Clone)]
pub struct PostgresResetStore {
    /// `PostgreSQL` connection pool.
    pool: PgPool,
}

impl PostgresResetStore {
    /// Create a new `PostgreSQL` reset store.
    ///
    /// # Arguments
    ///
    /// * `pool` - `PostgreSQL` connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ResetError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

impl ResetStore for PostgresResetStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to start transaction"))?;
        Ok(PostgresTransaction { tx })
    }

    async fn find_subject(
        &self,
        variant: ResetVariant,
        email: &str,
    ) -> Result<Option<SubjectAccount>> {
        let sql = format!(
            "SELECT s.id AS subject_id, a.id AS account_id, a.email, a.role \
             FROM {subject} s JOIN accounts a ON a.id = s.account_id \
             WHERE LOWER(a.email) = LOWER($1)",
            subject = subject_table(variant),
        );
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to look up subject"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let decode = |e: sqlx::Error| ResetError::DatabaseError(format!("Failed to decode subject: {e}"));
        let role: String = row.try_get("role").map_err(decode)?;
        Ok(Some(SubjectAccount {
            subject_id: SubjectId(row.try_get("subject_id").map_err(decode)?),
            account_id: AccountId(row.try_get("account_id").map_err(decode)?),
            email: row.try_get("email").map_err(decode)?,
            role: parse_role(&role)?,
        }))
    }

    async fn find_pending(
        &self,
        variant: ResetVariant,
        subject_id: SubjectId,
    ) -> Result<Option<CredentialResetRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM {table} WHERE subject_id = $1 AND status = 'pending'",
            table = request_table(variant),
        );
        sqlx::query(&sql)
            .bind(subject_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find pending request"))?
            .map(|row| row_to_request(variant, &row))
            .transpose()
    }

    async fn get_request(
        &self,
        variant: ResetVariant,
        id: RequestId,
    ) -> Result<Option<CredentialResetRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM {table} WHERE id = $1",
            table = request_table(variant),
        );
        sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to get reset request"))?
            .map(|row| row_to_request(variant, &row))
            .transpose()
    }

    async fn list_requests(
        &self,
        variant: ResetVariant,
        status: Option<ResetStatus>,
        limit: u32,
    ) -> Result<Vec<CredentialResetRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM {table} \
             WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY requested_at DESC LIMIT $2",
            table = request_table(variant),
        );
        let rows = sqlx::query(&sql)
            .bind(status.map(ResetStatus::as_str))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to list reset requests"))?;

        rows.iter().map(|row| row_to_request(variant, row)).collect()
    }

    async fn list_overdue(
        &self,
        variant: ResetVariant,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RequestId>> {
        let sql = format!(
            "SELECT id FROM {table} WHERE status = 'pending' AND expires_at <= $1 \
             ORDER BY expires_at ASC LIMIT $2",
            table = request_table(variant),
        );
        let ids: Vec<(uuid::Uuid,)> = sqlx::query_as(&sql)
            .bind(now)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to list overdue requests"))?;

        Ok(ids.into_iter().map(|(id,)| RequestId(id)).collect())
    }

    async fn status_counts(&self, variant: ResetVariant) -> Result<StatusCounts> {
        let sql = format!(
            "SELECT \
                COUNT(*) FILTER (WHERE status = 'pending') AS pending, \
                COUNT(*) FILTER (WHERE status = 'approved') AS approved, \
                COUNT(*) FILTER (WHERE status = 'rejected') AS rejected, \
                COUNT(*) FILTER (WHERE status = 'expired') AS expired, \
                AVG(EXTRACT(EPOCH FROM (reviewed_at - requested_at)))::FLOAT8 AS avg_secs \
             FROM {table}",
            table = request_table(variant),
        );
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count reset requests"))?;

        let decode = |e: sqlx::Error| ResetError::DatabaseError(format!("Failed to decode counts: {e}"));
        let count = |name: &str| -> Result<u64> {
            let value: i64 = row.try_get(name).map_err(decode)?;
            Ok(u64::try_from(value).unwrap_or(0))
        };

        Ok(StatusCounts {
            pending: count("pending")?,
            approved: count("approved")?,
            rejected: count("rejected")?,
            expired: count("expired")?,
            average_response_seconds: row.try_get("avg_secs").map_err(decode)?,
        })
    }

    async fn audit_trail(&self, variant: ResetVariant, id: RequestId) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r"
            SELECT id, target_type, target_id, actor_id, action, note, before, after, created_at
            FROM audit_log
            WHERE target_type = $1 AND target_id = $2
            ORDER BY created_at ASC
            ",
        )
        .bind(variant.target_type())
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to read audit trail"))?;

        rows.iter().map(row_to_audit).collect()
    }
}

/// Open `PostgreSQL` transaction.
///
/// Dropping it without [`ResetTransaction::commit`] rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl ResetTransaction for PostgresTransaction {
    async fn lock_request(
        &mut self,
        variant: ResetVariant,
        id: RequestId,
    ) -> Result<Option<CredentialResetRequest>> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM {table} WHERE id = $1 FOR UPDATE",
            table = request_table(variant),
        );
        sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err("Failed to lock reset request"))?
            .map(|row| row_to_request(variant, &row))
            .transpose()
    }

    async fn insert_request(&mut self, request: &CredentialResetRequest) -> Result<()> {
        let sql = format!(
            "INSERT INTO {table} ({REQUEST_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
            table = request_table(request.variant),
        );
        sqlx::query(&sql)
            .bind(request.id.0)
            .bind(request.subject_id.0)
            .bind(request.requester_role.as_str())
            .bind(request.status.as_str())
            .bind(&request.description)
            .bind(&request.rejection_reason)
            .bind(request.requested_at)
            .bind(request.reviewed_at)
            .bind(request.fulfilled_at)
            .bind(request.expires_at)
            .bind(request.reviewed_by.map(|id| id.0))
            .bind(request.requested_from_ip.map(|ip| ip.to_string()))
            .bind(&request.requested_agent)
            .bind(request.created_at)
            .bind(request.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return ResetError::PendingRequestExists;
                    }
                }
                ResetError::DatabaseError(format!("Failed to insert reset request: {e}"))
            })?;
        Ok(())
    }

    async fn resolve_linked_account(
        &mut self,
        variant: ResetVariant,
        subject_id: SubjectId,
    ) -> Result<LinkedAccount> {
        let sql = format!(
            "SELECT a.id, a.email FROM {subject} s JOIN accounts a ON a.id = s.account_id \
             WHERE s.id = $1",
            subject = subject_table(variant),
        );
        let row: Option<(uuid::Uuid, String)> = sqlx::query_as(&sql)
            .bind(subject_id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err("Failed to resolve linked account"))?;

        let (account_id, email) = row.ok_or_else(|| {
            ResetError::InternalError(format!("Subject {subject_id} has no linked account"))
        })?;
        Ok(LinkedAccount {
            account_id: AccountId(account_id),
            email,
        })
    }

    async fn store_password_hash(&mut self, account_id: AccountId, password_hash: &str) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE accounts
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(account_id.0)
        .bind(password_hash)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err("Failed to store password hash"))?;

        if result.rows_affected() == 0 {
            return Err(ResetError::DatabaseError(format!(
                "Account {account_id} not found"
            )));
        }
        Ok(())
    }

    async fn update_request(&mut self, request: &CredentialResetRequest) -> Result<()> {
        let sql = format!(
            "UPDATE {table} SET status = $2, rejection_reason = $3, reviewed_at = $4, \
             fulfilled_at = $5, reviewed_by = $6, updated_at = $7 WHERE id = $1",
            table = request_table(request.variant),
        );
        sqlx::query(&sql)
            .bind(request.id.0)
            .bind(request.status.as_str())
            .bind(&request.rejection_reason)
            .bind(request.reviewed_at)
            .bind(request.fulfilled_at)
            .bind(request.reviewed_by.map(|id| id.0))
            .bind(request.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err("Failed to update reset request"))?;
        Ok(())
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO audit_log
                (id, target_type, target_id, actor_id, action, note, before, after, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(entry.id)
        .bind(&entry.target_type)
        .bind(entry.target_id.0)
        .bind(entry.actor_id.map(|id| id.0))
        .bind(entry.action.as_str())
        .bind(&entry.note)
        .bind(&entry.before)
        .bind(&entry.after)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err("Failed to append audit entry"))?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(db_err("Failed to commit transaction"))
    }
}
