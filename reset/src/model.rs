//! Domain types for credential-reset requests.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

/// Reset request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of an authentication account (the record holding the password hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Uuid);

impl AccountId {
    /// Generate a new random account ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of the owning entity (a guide profile or an employee record).
///
/// A subject owns exactly one account; requests reference the subject, and
/// the account is resolved from it when a credential has to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub Uuid);

impl SubjectId {
    /// Generate a new random subject ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Account roles known to the operations console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Tour guide listed on the marketplace.
    Guide,
    /// Regular back-office employee.
    Employee,
    /// Customer-support staff.
    Support,
    /// Administrator.
    Admin,
}

impl Role {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guide => "guide",
            Self::Employee => "employee",
            Self::Support => "support",
            Self::Admin => "admin",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "guide" => Some(Self::Guide),
            "employee" => Some(Self::Employee),
            "support" => Some(Self::Support),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Canonical lifecycle state of a reset request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetStatus {
    /// Waiting for a reviewer.
    Pending,
    /// Approved; the credential was replaced.
    Approved,
    /// Rejected by a reviewer.
    Rejected,
    /// Expired before anyone reviewed it.
    Expired,
}

impl ResetStatus {
    /// All states, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::Approved, Self::Rejected, Self::Expired];

    /// Returns `true` once no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Canonical storage representation (shared by both variants).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    /// Parse the canonical storage representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl fmt::Display for ResetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which account population a request belongs to.
///
/// Guides and employees share the workflow but not the vocabulary: the
/// employee flow calls an approved request "fulfilled" and a rejected one
/// "denied". Storage always uses the canonical names; labels are applied at
/// the HTTP edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetVariant {
    /// Guide accounts.
    Guide,
    /// Employee and support accounts.
    Employee,
}

impl ResetVariant {
    /// Short name used in logs, metrics and routes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guide => "guide",
            Self::Employee => "employee",
        }
    }

    /// Audit `target_type` for requests of this variant.
    #[must_use]
    pub const fn target_type(self) -> &'static str {
        match self {
            Self::Guide => "guide_password_reset",
            Self::Employee => "employee_password_reset",
        }
    }

    /// Role a submitter of this variant holds.
    #[must_use]
    pub const fn requester_role(self) -> Role {
        match self {
            Self::Guide => Role::Guide,
            Self::Employee => Role::Employee,
        }
    }

    /// Whether an account with `role` may use this reset flow.
    ///
    /// Administrators recover access out of band and are never eligible.
    #[must_use]
    pub const fn is_eligible(self, role: Role) -> bool {
        match self {
            Self::Guide => matches!(role, Role::Guide),
            Self::Employee => matches!(role, Role::Employee | Role::Support),
        }
    }

    /// Presentation label for `status` in this variant's vocabulary.
    #[must_use]
    pub const fn label(self, status: ResetStatus) -> &'static str {
        match (self, status) {
            (_, ResetStatus::Pending) => "pending",
            (_, ResetStatus::Expired) => "expired",
            (Self::Guide, ResetStatus::Approved) => "approved",
            (Self::Guide, ResetStatus::Rejected) => "rejected",
            (Self::Employee, ResetStatus::Approved) => "fulfilled",
            (Self::Employee, ResetStatus::Rejected) => "denied",
        }
    }

    /// Parse a label of this variant's vocabulary.
    ///
    /// Canonical names are accepted as well, so `?status=approved` works on
    /// the employee routes.
    #[must_use]
    pub fn parse_label(self, label: &str) -> Option<ResetStatus> {
        ResetStatus::ALL
            .into_iter()
            .find(|status| self.label(*status) == label)
            .or_else(|| ResetStatus::parse(label))
    }
}

impl fmt::Display for ResetVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a submission came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOrigin {
    /// Client IP address, when known.
    pub ip: Option<IpAddr>,
    /// Client user agent, when known.
    pub user_agent: Option<String>,
}

/// Subject resolved from a submitted identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAccount {
    /// Owning entity (guide/employee record).
    pub subject_id: SubjectId,
    /// Account holding the credential.
    pub account_id: AccountId,
    /// Contact email.
    pub email: String,
    /// Role of the account.
    pub role: Role,
}

/// Account whose credential a request modifies, as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccount {
    /// Account ID.
    pub account_id: AccountId,
    /// Address used for notifications.
    pub email: String,
}

/// Authenticated caller of a reviewer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Reviewer account.
    pub id: AccountId,
    /// Reviewer role.
    pub role: Role,
}

/// A credential-reset request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialResetRequest {
    /// Request ID.
    pub id: RequestId,
    /// Account population.
    pub variant: ResetVariant,
    /// Subject whose account credential may change.
    pub subject_id: SubjectId,
    /// Role of the submitter.
    pub requester_role: Role,
    /// Lifecycle state.
    pub status: ResetStatus,
    /// Submitter-provided context.
    pub description: Option<String>,
    /// Reviewer-provided reason, present iff rejected.
    pub rejection_reason: Option<String>,
    /// When the request was filed.
    pub requested_at: DateTime<Utc>,
    /// When a reviewer decided.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// When the new credential was stored.
    pub fulfilled_at: Option<DateTime<Utc>>,
    /// Deadline for review.
    pub expires_at: DateTime<Utc>,
    /// Reviewer account.
    pub reviewed_by: Option<AccountId>,
    /// Client IP of the submission.
    pub requested_from_ip: Option<IpAddr>,
    /// Client user agent of the submission.
    pub requested_agent: Option<String>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl CredentialResetRequest {
    /// Build a new pending request expiring `ttl` after `now`.
    #[must_use]
    pub fn pending(
        variant: ResetVariant,
        subject: &SubjectAccount,
        description: Option<String>,
        origin: RequestOrigin,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: RequestId::new(),
            variant,
            subject_id: subject.subject_id,
            requester_role: subject.role,
            status: ResetStatus::Pending,
            description,
            rejection_reason: None,
            requested_at: now,
            reviewed_at: None,
            fulfilled_at: None,
            expires_at: now + ttl,
            reviewed_by: None,
            requested_from_ip: origin.ip,
            requested_agent: origin.user_agent,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the review deadline has passed at `now`.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
