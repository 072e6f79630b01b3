//! Correlation id middleware.
//!
//! Every request gets an id: the caller's `X-Correlation-ID` if it parses as a
//! UUID, a fresh v4 otherwise. The id is stored in the request extensions,
//! recorded on an `http_request` span wrapping the handler, and echoed on the
//! response.
//!
//! ```ignore
//! let app = Router::new()
//!     .nest("/api/v1/guides", guide_routes)
//!     .layer(axum::middleware::from_fn(correlation_id));
//! ```

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the correlation id in both directions.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// The caller's id if it is a UUID.
pub(crate) fn from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// Assign, record and echo the correlation id.
pub async fn correlation_id(mut req: Request, next: Next) -> Response {
    let id = from_headers(req.headers()).unwrap_or_else(Uuid::new_v4);
    req.extensions_mut().insert(id);

    // Path only; query strings may carry filters we do not want in logs.
    let span = tracing::info_span!(
        "http_request",
        correlation_id = %id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

/// Read the correlation id the middleware stored on a request.
pub trait CorrelationIdExt {
    /// `None` if [`correlation_id`] is not installed.
    fn correlation_id(&self) -> Option<Uuid>;
}

impl CorrelationIdExt for Request {
    fn correlation_id(&self) -> Option<Uuid> {
        self.extensions().get::<Uuid>().copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::CorrelationId;
    use axum::{Router, http::HeaderName, routing::get};
    use axum_test::TestServer;

    const HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

    fn server() -> TestServer {
        let app = Router::new()
            .route("/echo", get(|CorrelationId(id): CorrelationId| async move { id.to_string() }))
            .layer(axum::middleware::from_fn(correlation_id));
        TestServer::new(app).unwrap()
    }

    fn echoed(response: &axum_test::TestResponse) -> String {
        response
            .header(HEADER)
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_caller_id_reaches_handler_and_response() {
        let id = Uuid::new_v4();
        let response = server()
            .get("/echo")
            .add_header(HEADER, HeaderValue::from_str(&id.to_string()).unwrap())
            .await;

        assert_eq!(echoed(&response), id.to_string());
        assert_eq!(response.text(), id.to_string());
    }

    #[tokio::test]
    async fn test_missing_or_garbage_id_is_replaced() {
        let server = server();

        let missing = server.get("/echo").await;
        assert!(Uuid::parse_str(&echoed(&missing)).is_ok());

        let garbage = server
            .get("/echo")
            .add_header(HEADER, HeaderValue::from_static("not-a-uuid"))
            .await;
        let id = echoed(&garbage);
        assert_ne!(id, "not-a-uuid");
        assert_eq!(garbage.text(), id);
    }
}
