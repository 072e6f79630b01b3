//! Unauthenticated submission endpoint.

use super::RouteState;
use super::dto::SubmitBody;
use crate::model::RequestOrigin;
use crate::providers::{Notifier, RateLimiter, ResetStore, SessionResolver};
use crate::submission::{Submission, SubmissionReceipt};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use opsdesk_web::{AppError, ClientIp, CorrelationId, UserAgent};

/// File a reset request.
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/{guides|employees}/reset-requests
/// Content-Type: application/json
///
/// { "identifier": "alice@example.com", "description": "lost my phone" }
/// ```
///
/// # Response
///
/// `201` with the same message whether or not the account exists;
/// `requestId` is present only when a request was created.
///
/// # Errors
///
/// `400` malformed body or identifier, `409` pending request exists or
/// ineligible account, `429` rate limited (with `Retry-After`).
pub async fn submit_request<S, RL, N, SR>(
    State(state): State<RouteState<S, RL, N, SR>>,
    correlation_id: CorrelationId,
    ClientIp(ip): ClientIp,
    UserAgent(user_agent): UserAgent,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionReceipt>), AppError>
where
    S: ResetStore + 'static,
    RL: RateLimiter + 'static,
    N: Notifier + 'static,
    SR: SessionResolver + 'static,
{
    let Json(body) = body.map_err(|e| AppError::validation(e.body_text()))?;

    tracing::debug!(
        correlation_id = %correlation_id.0,
        variant = state.variant.as_str(),
        "Reset submission received"
    );

    let mut submission = Submission::new(body.identifier).with_origin(RequestOrigin { ip, user_agent });
    if let Some(description) = body.description {
        submission = submission.with_description(description);
    }

    let receipt = state.env.submissions.submit(state.variant, submission).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
