//! Wire types for the reset endpoints.
//!
//! Statuses go out in the variant's own vocabulary (`fulfilled`/`denied` on
//! the employee routes); everything else is shared.

use crate::audit::AuditEntry;
use crate::model::{AccountId, CredentialResetRequest, RequestId, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

const fn default_true() -> bool {
    true
}

/// `POST /reset-requests` body.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody {
    /// Email of the account that lost access.
    pub identifier: String,
    /// Optional context for the reviewer.
    #[serde(default)]
    pub description: Option<String>,
}

/// `POST /reset-requests/{id}/approve` body.
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveBody {
    /// Plaintext credential chosen by the reviewer.
    pub new_credential: String,
    /// Email the requester when done (default `true`).
    #[serde(default = "default_true")]
    pub notify_requester: bool,
}

// Keep the credential out of logs.
impl std::fmt::Debug for ApproveBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApproveBody")
            .field("new_credential", &"<redacted>")
            .field("notify_requester", &self.notify_requester)
            .finish()
    }
}

/// `POST /reset-requests/{id}/deny` body.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyBody {
    /// Reason shown to the requester.
    pub reason: String,
    /// Email the requester the reason (default `true`).
    #[serde(default = "default_true")]
    pub notify_requester: bool,
}

/// `GET /reset-requests` query.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListQuery {
    /// Status label in the variant's vocabulary, or a canonical name.
    pub status: Option<String>,
    /// Maximum number of results.
    pub limit: Option<u32>,
}

/// A reset request as returned to reviewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequestDto {
    /// Request ID.
    pub id: RequestId,
    /// Subject the request is for.
    pub subject_id: SubjectId,
    /// Variant-specific status label.
    pub status: String,
    /// Submitter-provided context.
    pub description: Option<String>,
    /// Reason given on rejection.
    pub rejection_reason: Option<String>,
    /// Submission time.
    pub requested_at: DateTime<Utc>,
    /// Review deadline.
    pub expires_at: DateTime<Utc>,
    /// Decision time.
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Credential replacement time.
    pub fulfilled_at: Option<DateTime<Utc>>,
    /// Reviewer.
    pub reviewed_by: Option<AccountId>,
    /// Submitting client IP.
    pub requested_from_ip: Option<IpAddr>,
    /// Submitting client user agent.
    pub requested_agent: Option<String>,
}

impl From<CredentialResetRequest> for ResetRequestDto {
    fn from(request: CredentialResetRequest) -> Self {
        Self {
            id: request.id,
            subject_id: request.subject_id,
            status: request.variant.label(request.status).to_string(),
            description: request.description,
            rejection_reason: request.rejection_reason,
            requested_at: request.requested_at,
            expires_at: request.expires_at,
            reviewed_at: request.reviewed_at,
            fulfilled_at: request.fulfilled_at,
            reviewed_by: request.reviewed_by,
            requested_from_ip: request.requested_from_ip,
            requested_agent: request.requested_agent,
        }
    }
}

/// `GET /reset-requests` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    /// Matching requests, newest first.
    pub requests: Vec<ResetRequestDto>,
}

/// `GET /reset-requests/{id}/audit` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResponse {
    /// Entries, oldest first.
    pub entries: Vec<AuditEntry>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::{RequestOrigin, ResetStatus, ResetVariant, Role, SubjectAccount};

    fn request(variant: ResetVariant) -> CredentialResetRequest {
        let subject = SubjectAccount {
            subject_id: SubjectId::new(),
            account_id: AccountId::new(),
            email: "bob@example.com".to_string(),
            role: Role::Employee,
        };
        CredentialResetRequest::pending(
            variant,
            &subject,
            None,
            RequestOrigin::default(),
            Utc::now(),
            chrono::Duration::hours(72),
        )
    }

    #[test]
    fn test_dto_uses_variant_labels() {
        let mut employee = request(ResetVariant::Employee);
        employee.status = ResetStatus::Approved;
        assert_eq!(ResetRequestDto::from(employee).status, "fulfilled");

        let mut guide = request(ResetVariant::Guide);
        guide.status = ResetStatus::Approved;
        assert_eq!(ResetRequestDto::from(guide).status, "approved");
    }

    #[test]
    fn test_bodies_default_to_notifying() {
        let approve: ApproveBody = serde_json::from_str(r#"{"newCredential":"Aa1!aa23"}"#).unwrap();
        assert!(approve.notify_requester);
        assert!(!format!("{approve:?}").contains("Aa1!aa23"));

        let deny: DenyBody =
            serde_json::from_str(r#"{"reason":"identity unverified","notifyRequester":false}"#)
                .unwrap();
        assert!(!deny.notify_requester);
    }
}
