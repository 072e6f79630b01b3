//! Error types for the credential-reset workflow.

use crate::model::ResetStatus;
use crate::policy::PolicyViolation;
use thiserror::Error;

/// Result type alias for reset operations.
pub type Result<T> = std::result::Result<T, ResetError>;

/// Coarse error category, stable across releases.
///
/// The HTTP layer maps each kind to exactly one status code and exposes
/// [`ErrorKind::code`] to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input or policy failure.
    Validation,
    /// Missing or invalid session.
    Unauthorized,
    /// Authenticated with the wrong role.
    Forbidden,
    /// Unknown request.
    NotFound,
    /// Duplicate pending request, already reviewed, or expired.
    Conflict,
    /// Too many attempts.
    RateLimited,
    /// Anything unexpected.
    Internal,
}

impl ErrorKind {
    /// Machine-checkable code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Internal => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Everything that can go wrong in the reset workflow.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResetError {
    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════

    /// The identifier is not a plausible email address.
    #[error("Invalid identifier")]
    InvalidIdentifier,

    /// The reviewer-supplied credential failed the password policy.
    #[error("New credential rejected: {}", join_violations(.violations))]
    CredentialRejected {
        /// Every violated rule.
        violations: Vec<PolicyViolation>,
    },

    /// Denial without a usable reason.
    #[error("A rejection reason is required")]
    MissingReason,

    /// Free-form input outside accepted bounds.
    #[error("{0}")]
    InvalidInput(String),

    // ═══════════════════════════════════════════════════════════
    // Access
    // ═══════════════════════════════════════════════════════════

    /// No valid reviewer session.
    #[error("Authentication required")]
    Unauthorized,

    /// Caller is authenticated but may not review requests.
    #[error("Role '{role}' may not review reset requests")]
    Forbidden {
        /// Role the caller holds.
        role: String,
    },

    /// Reviewer tried to act on a request for their own account.
    #[error("Reviewers may not review reset requests for their own account")]
    SelfReview,

    // ═══════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════

    /// No request with this ID for the variant.
    #[error("Reset request not found")]
    RequestNotFound,

    /// The subject already has a pending request.
    #[error("A pending reset request already exists for this account")]
    PendingRequestExists,

    /// The account may not use this reset flow.
    #[error("This account is not eligible for this reset flow")]
    IneligibleAccount,

    /// The request left `pending` already.
    #[error("Reset request was already {status}")]
    AlreadyReviewed {
        /// Terminal status found.
        status: ResetStatus,
    },

    /// The review deadline passed.
    #[error("Reset request has expired")]
    RequestExpired,

    /// Expiry was requested before the deadline.
    #[error("Reset request has not expired yet")]
    NotYetExpired,

    // ═══════════════════════════════════════════════════════════
    // Rate limiting
    // ═══════════════════════════════════════════════════════════

    /// Too many submissions.
    #[error("Too many attempts, please retry after {retry_after:?}")]
    RateLimited {
        /// Duration to wait before retrying.
        retry_after: std::time::Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // System
    // ═══════════════════════════════════════════════════════════

    /// Storage failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Hashing failure.
    #[error("Credential hashing failed: {0}")]
    HashingFailed(String),

    /// Mail delivery failure. Never surfaced to reset callers.
    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    /// Internal error (should not be exposed to users).
    #[error("Internal error: {0}")]
    InternalError(String),
}

fn join_violations(violations: &[PolicyViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ResetError {
    /// Category of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// # use opsdesk_reset::{ErrorKind, ResetError};
    /// assert_eq!(ResetError::PendingRequestExists.kind(), ErrorKind::Conflict);
    /// assert_eq!(ResetError::MissingReason.kind(), ErrorKind::Validation);
    /// ```
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier
            | Self::CredentialRejected { .. }
            | Self::MissingReason
            | Self::InvalidInput(_) => ErrorKind::Validation,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::Forbidden { .. } | Self::SelfReview => ErrorKind::Forbidden,
            Self::RequestNotFound => ErrorKind::NotFound,
            Self::PendingRequestExists
            | Self::IneligibleAccount
            | Self::AlreadyReviewed { .. }
            | Self::RequestExpired
            | Self::NotYetExpired => ErrorKind::Conflict,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::DatabaseError(_)
            | Self::HashingFailed(_)
            | Self::NotificationFailed(_)
            | Self::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to show to clients.
    ///
    /// Internal errors collapse to a generic message so storage details never
    /// leave the process.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "An internal error occurred".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ResetError::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            ResetError::Forbidden { role: "guide".into() }.kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(ResetError::SelfReview.kind(), ErrorKind::Forbidden);
        assert_eq!(ResetError::RequestNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(
            ResetError::AlreadyReviewed {
                status: ResetStatus::Approved
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(ResetError::RequestExpired.kind(), ErrorKind::Conflict);
        assert_eq!(
            ResetError::RateLimited {
                retry_after: std::time::Duration::from_secs(60)
            }
            .kind(),
            ErrorKind::RateLimited
        );
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = ResetError::DatabaseError("relation guides does not exist".into());
        assert_eq!(err.public_message(), "An internal error occurred");
        assert_eq!(
            ResetError::MissingReason.public_message(),
            "A rejection reason is required"
        );
    }

    #[test]
    fn test_credential_rejected_message_lists_rules() {
        let err = ResetError::CredentialRejected {
            violations: vec![
                PolicyViolation::MissingDigit,
                PolicyViolation::MissingSpecialChar,
            ],
        };
        assert_eq!(
            err.to_string(),
            "New credential rejected: must contain a digit; must contain a special character"
        );
    }
}
