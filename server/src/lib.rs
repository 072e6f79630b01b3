//! # Opsdesk Server
//!
//! HTTP surface of the credential-reset workflow: both variants' reset
//! routes, a liveness probe, correlation ids and request tracing.

pub mod config;
pub mod mailer;

pub use config::Config;
pub use mailer::Mailer;

use axum::{Router, middleware, routing::get};
use opsdesk_reset::ResetEnvironment;
use opsdesk_reset::providers::{Notifier, RateLimiter, ResetStore, SessionResolver};
use opsdesk_reset::router::reset_routes;
use opsdesk_web::correlation_id;
use opsdesk_web::handlers::health_check;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the application router.
///
/// # Routes
///
/// - `GET /health`
/// - `/api/v1/guides/reset-requests/...`
/// - `/api/v1/employees/reset-requests/...`
pub fn build_app<S, RL, N, SR>(env: Arc<ResetEnvironment<S, RL, N, SR>>) -> Router
where
    S: ResetStore + 'static,
    RL: RateLimiter + 'static,
    N: Notifier + 'static,
    SR: SessionResolver + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .merge(reset_routes(env))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(correlation_id))
}
