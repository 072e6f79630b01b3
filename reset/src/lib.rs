//! # Opsdesk Credential Reset
//!
//! Reviewer-approved credential resets for guide and employee accounts.
//!
//! A subject (a guide or an employee who lost access) files a reset request.
//! A reviewer with the right role later approves it, supplying the new
//! credential, or denies it with a reason. Approval changes the password hash
//! of a *different* record (the linked account), so the request transition,
//! the credential write and the audit entry are committed as one unit.
//!
//! ## Flow
//!
//! ```text
//! submit ──► RateLimiter ──► SubmissionService ──► request (pending)
//!
//! approve/deny ──► AuthorizationGate ──► ApprovalOrchestrator
//!                       ┌──────────── one transaction ────────────┐
//!                       │ lock request → state machine →          │
//!                       │ credential write → request update →     │
//!                       │ audit append → commit                   │
//!                       └─────────────────────────────────────────┘
//!                                      │
//!                                      ▼
//!                        NotificationDispatcher (spawned, best effort)
//! ```
//!
//! Both account kinds share one state machine. Only their status labels
//! differ, see [`ResetVariant::label`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use opsdesk_reset::*;
//!
//! let receipt = env
//!     .submissions
//!     .submit(ResetVariant::Guide, Submission::new("alice@example.com"))
//!     .await?;
//!
//! let approved = env
//!     .orchestrator
//!     .approve(ResetVariant::Guide, request_id, &reviewer, "Aa1!aa23", true)
//!     .await?;
//! assert_eq!(approved.status, ResetStatus::Approved);
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod audit;
pub mod authz;
pub mod clock;
pub mod config;
pub mod credential;
pub mod environment;
pub mod error;
pub mod machine;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod policy;
pub mod providers;
pub mod stats;
pub mod stores;
pub mod submission;
pub mod sweep;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

#[cfg(feature = "axum")]
pub mod handlers;
#[cfg(feature = "axum")]
pub mod router;

pub use audit::{AuditAction, AuditEntry, AuditRecorder};
pub use authz::AuthorizationGate;
pub use clock::{Clock, SystemClock};
pub use config::ResetConfig;
pub use credential::CredentialMutator;
pub use environment::ResetEnvironment;
pub use error::{ErrorKind, ResetError, Result};
pub use machine::{ReviewAction, transition};
pub use model::{
    AccountId, Actor, CredentialResetRequest, LinkedAccount, RequestId, RequestOrigin,
    ResetStatus, ResetVariant, Role, SubjectAccount, SubjectId,
};
pub use orchestrator::ApprovalOrchestrator;
pub use policy::{PasswordPolicy, PolicyViolation};
pub use stats::{ResetStats, StatusCounts};
pub use submission::{Submission, SubmissionReceipt, SubmissionService};
pub use sweep::ExpirySweeper;
