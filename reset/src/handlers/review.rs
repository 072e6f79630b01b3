//! Reviewer endpoints.
//!
//! Every handler resolves the bearer token and passes the authorization gate
//! before touching a request.

use super::dto::{ApproveBody, AuditResponse, DenyBody, ListQuery, ListResponse, ResetRequestDto};
use super::{RouteState, parse_request_id, review_error};
use crate::providers::{Notifier, RateLimiter, ResetStore, SessionResolver};
use crate::stats::ResetStats;
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use opsdesk_web::{AppError, BearerToken};

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 200;

/// Approve a pending request with a reviewer-chosen credential.
///
/// ```text
/// POST /reset-requests/{id}/approve
/// Authorization: Bearer <token>
///
/// { "newCredential": "Aa1!aa23", "notifyRequester": true }
/// ```
///
/// # Errors
///
/// `400` policy failure, `401`/`403` caller or own request, `404` unknown
/// request, `409` already reviewed or expired.
pub async fn approve_request<S, RL, N, SR>(
    State(state): State<RouteState<S, RL, N, SR>>,
    Path(id): Path<String>,
    BearerToken(token): BearerToken,
    body: Result<Json<ApproveBody>, JsonRejection>,
) -> Result<Json<ResetRequestDto>, AppError>
where
    S: ResetStore + 'static,
    RL: RateLimiter + 'static,
    N: Notifier + 'static,
    SR: SessionResolver + 'static,
{
    let reviewer = state.env.authenticate_reviewer(token.as_deref()).await?;
    let id = parse_request_id(&id)?;
    let Json(body) = body.map_err(|e| AppError::validation(e.body_text()))?;

    let request = state
        .env
        .orchestrator
        .approve(state.variant, id, &reviewer, &body.new_credential, body.notify_requester)
        .await
        .map_err(|e| review_error(state.variant, e))?;
    Ok(Json(request.into()))
}

/// Deny a pending request with a reason.
///
/// ```text
/// POST /reset-requests/{id}/deny
/// Authorization: Bearer <token>
///
/// { "reason": "identity unverified", "notifyRequester": true }
/// ```
///
/// # Errors
///
/// `400` blank or overlong reason, `401`/`403` caller or own request, `404`
/// unknown request, `409` already reviewed.
pub async fn deny_request<S, RL, N, SR>(
    State(state): State<RouteState<S, RL, N, SR>>,
    Path(id): Path<String>,
    BearerToken(token): BearerToken,
    body: Result<Json<DenyBody>, JsonRejection>,
) -> Result<Json<ResetRequestDto>, AppError>
where
    S: ResetStore + 'static,
    RL: RateLimiter + 'static,
    N: Notifier + 'static,
    SR: SessionResolver + 'static,
{
    let reviewer = state.env.authenticate_reviewer(token.as_deref()).await?;
    let id = parse_request_id(&id)?;
    let Json(body) = body.map_err(|e| AppError::validation(e.body_text()))?;

    let request = state
        .env
        .orchestrator
        .deny(state.variant, id, &reviewer, &body.reason, body.notify_requester)
        .await
        .map_err(|e| review_error(state.variant, e))?;
    Ok(Json(request.into()))
}

/// `GET /reset-requests/stats`
///
/// # Errors
///
/// `401`/`403` caller.
pub async fn request_stats<S, RL, N, SR>(
    State(state): State<RouteState<S, RL, N, SR>>,
    BearerToken(token): BearerToken,
) -> Result<Json<ResetStats>, AppError>
where
    S: ResetStore + 'static,
    RL: RateLimiter + 'static,
    N: Notifier + 'static,
    SR: SessionResolver + 'static,
{
    state.env.authenticate_reviewer(token.as_deref()).await?;
    Ok(Json(state.env.orchestrator.stats(state.variant).await?))
}

/// `GET /reset-requests?status=&limit=`
///
/// `status` accepts the variant's labels and the canonical names.
///
/// # Errors
///
/// `400` unknown status, `401`/`403` caller.
pub async fn list_requests<S, RL, N, SR>(
    State(state): State<RouteState<S, RL, N, SR>>,
    BearerToken(token): BearerToken,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError>
where
    S: ResetStore + 'static,
    RL: RateLimiter + 'static,
    N: Notifier + 'static,
    SR: SessionResolver + 'static,
{
    state.env.authenticate_reviewer(token.as_deref()).await?;

    let status = query
        .status
        .as_deref()
        .map(|label| {
            state
                .variant
                .parse_label(label)
                .ok_or_else(|| AppError::validation(format!("Unknown status '{label}'")))
        })
        .transpose()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

    let requests = state
        .env
        .orchestrator
        .list(state.variant, status, limit)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(ListResponse { requests }))
}

/// `GET /reset-requests/{id}`
///
/// # Errors
///
/// `401`/`403` caller, `404` unknown request.
pub async fn get_request<S, RL, N, SR>(
    State(state): State<RouteState<S, RL, N, SR>>,
    Path(id): Path<String>,
    BearerToken(token): BearerToken,
) -> Result<Json<ResetRequestDto>, AppError>
where
    S: ResetStore + 'static,
    RL: RateLimiter + 'static,
    N: Notifier + 'static,
    SR: SessionResolver + 'static,
{
    state.env.authenticate_reviewer(token.as_deref()).await?;
    let id = parse_request_id(&id)?;
    Ok(Json(state.env.orchestrator.get(state.variant, id).await?.into()))
}

/// `GET /reset-requests/{id}/audit`
///
/// # Errors
///
/// `401`/`403` caller, `404` unknown request.
pub async fn request_audit<S, RL, N, SR>(
    State(state): State<RouteState<S, RL, N, SR>>,
    Path(id): Path<String>,
    BearerToken(token): BearerToken,
) -> Result<Json<AuditResponse>, AppError>
where
    S: ResetStore + 'static,
    RL: RateLimiter + 'static,
    N: Notifier + 'static,
    SR: SessionResolver + 'static,
{
    state.env.authenticate_reviewer(token.as_deref()).await?;
    let id = parse_request_id(&id)?;
    let entries = state.env.orchestrator.audit_trail(state.variant, id).await?;
    Ok(Json(AuditResponse { entries }))
}
