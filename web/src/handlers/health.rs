//! Liveness endpoint.
//!
//! Answers without touching dependencies, so load balancers can tell a hung
//! process from a slow database.

use axum::{Json, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Server time when the check ran.
    pub timestamp: DateTime<Utc>,
}

/// `GET /health`
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            timestamp: Utc::now(),
        }),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{Router, routing::get};
    use axum_test::TestServer;

    #[tokio::test]
    async fn test_health_check() {
        let server = TestServer::new(Router::new().route("/health", get(health_check))).unwrap();

        let response = server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.json::<HealthResponse>().status, "ok");
    }
}
