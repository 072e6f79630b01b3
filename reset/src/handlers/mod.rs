//! HTTP handlers for the reset endpoints.
//!
//! Handlers are generic over the providers and receive a [`RouteState`]
//! carrying the shared environment and the variant the router was mounted
//! for. Domain errors become [`AppError`] through one `From` impl.

pub mod dto;
pub mod review;
pub mod submit;

use crate::environment::ResetEnvironment;
use crate::error::{ErrorKind, ResetError};
use crate::model::{RequestId, ResetVariant};
use opsdesk_web::{ApiErrorCode, AppError};
use std::sync::Arc;

/// State handed to every reset handler.
pub struct RouteState<S, RL, N, SR> {
    /// Shared environment (one per process, both variants).
    pub env: Arc<ResetEnvironment<S, RL, N, SR>>,
    /// Variant this router serves.
    pub variant: ResetVariant,
}

// Manual impl: the providers themselves need not be `Clone`.
impl<S, RL, N, SR> Clone for RouteState<S, RL, N, SR> {
    fn clone(&self) -> Self {
        Self {
            env: Arc::clone(&self.env),
            variant: self.variant,
        }
    }
}

impl From<ResetError> for AppError {
    fn from(err: ResetError) -> Self {
        let message = err.public_message();
        match err.kind() {
            ErrorKind::Validation => Self::validation(message),
            ErrorKind::Unauthorized => Self::unauthorized(message),
            ErrorKind::Forbidden => Self::forbidden(message),
            ErrorKind::NotFound => Self::new(ApiErrorCode::NotFound, message),
            ErrorKind::Conflict => Self::conflict(message),
            ErrorKind::RateLimited => {
                let retry_after = match err {
                    ResetError::RateLimited { retry_after } => retry_after,
                    _ => std::time::Duration::ZERO,
                };
                Self::too_many_requests(message, retry_after)
            }
            ErrorKind::Internal => Self::internal(message).with_source(anyhow::Error::new(err)),
        }
    }
}

/// Map a review error, naming statuses in the variant's own vocabulary.
pub(crate) fn review_error(variant: ResetVariant, err: ResetError) -> AppError {
    match err {
        ResetError::AlreadyReviewed { status } => AppError::conflict(format!(
            "Reset request was already {}",
            variant.label(status)
        )),
        other => other.into(),
    }
}

/// Parse a request id from the path.
///
/// Ids that are not UUIDs cannot exist, so they are reported as not found.
pub(crate) fn parse_request_id(raw: &str) -> Result<RequestId, AppError> {
    uuid::Uuid::parse_str(raw)
        .map(RequestId)
        .map_err(|_| AppError::not_found("Reset request", raw))
}
