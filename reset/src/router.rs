//! Reset router composition.

use crate::environment::ResetEnvironment;
use crate::handlers::{RouteState, review, submit};
use crate::model::ResetVariant;
use crate::providers::{Notifier, RateLimiter, ResetStore, SessionResolver};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

/// Create the reset router for one variant.
///
/// # Routes
///
/// - `POST /reset-requests` - File a request (no session)
/// - `GET /reset-requests` - List requests (`?status=&limit=`)
/// - `GET /reset-requests/stats` - Counters and rates
/// - `GET /reset-requests/:id` - One request
/// - `GET /reset-requests/:id/audit` - Audit trail
/// - `POST /reset-requests/:id/approve` - Approve with a new credential
/// - `POST /reset-requests/:id/deny` - Deny with a reason
///
/// # Example
///
/// ```rust,ignore
/// let env = Arc::new(ResetEnvironment::new(store, limiter, notifier, sessions, clock, config)?);
///
/// let app = Router::new()
///     .nest("/api/v1/guides", reset_router(Arc::clone(&env), ResetVariant::Guide))
///     .nest("/api/v1/employees", reset_router(env, ResetVariant::Employee))
///     .layer(TraceLayer::new_for_http());
/// ```
pub fn reset_router<S, RL, N, SR>(
    env: Arc<ResetEnvironment<S, RL, N, SR>>,
    variant: ResetVariant,
) -> Router
where
    S: ResetStore + 'static,
    RL: RateLimiter + 'static,
    N: Notifier + 'static,
    SR: SessionResolver + 'static,
{
    Router::new()
        .route(
            "/reset-requests",
            post(submit::submit_request::<S, RL, N, SR>).get(review::list_requests::<S, RL, N, SR>),
        )
        .route("/reset-requests/stats", get(review::request_stats::<S, RL, N, SR>))
        .route("/reset-requests/:id", get(review::get_request::<S, RL, N, SR>))
        .route("/reset-requests/:id/audit", get(review::request_audit::<S, RL, N, SR>))
        .route("/reset-requests/:id/approve", post(review::approve_request::<S, RL, N, SR>))
        .route("/reset-requests/:id/deny", post(review::deny_request::<S, RL, N, SR>))
        .with_state(RouteState { env, variant })
}

/// Mount both variants under `/api/v1/guides` and `/api/v1/employees`.
pub fn reset_routes<S, RL, N, SR>(env: Arc<ResetEnvironment<S, RL, N, SR>>) -> Router
where
    S: ResetStore + 'static,
    RL: RateLimiter + 'static,
    N: Notifier + 'static,
    SR: SessionResolver + 'static,
{
    Router::new()
        .nest("/api/v1/guides", reset_router(Arc::clone(&env), ResetVariant::Guide))
        .nest("/api/v1/employees", reset_router(env, ResetVariant::Employee))
}
