//! Axum integration shared by Opsdesk services.
//!
//! Domain crates own their handlers; this crate owns what every HTTP
//! surface needs the same way:
//!
//! - [`AppError`]: `{code, message}` error bodies, server errors logged
//! - extractors for correlation id, client IP, user agent and bearer token
//! - [`correlation_id`] middleware: correlation id on the span and the response
//! - liveness handler
//!
//! # Example
//!
//! ```ignore
//! use opsdesk_web::{AppError, BearerToken};
//! use axum::{Json, extract::State};
//!
//! async fn handle(
//!     State(state): State<AppState>,
//!     BearerToken(token): BearerToken,
//! ) -> Result<Json<Response>, AppError> {
//!     let actor = state.authenticate(token.as_deref()).await?;
//!     Ok(Json(state.do_work(&actor).await?))
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::{ApiErrorCode, AppError};
pub use extractors::{BearerToken, ClientIp, CorrelationId, UserAgent};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
