//! Reviewer session lookup.

use crate::error::Result;
use crate::model::Actor;
use std::future::Future;

/// Maps a bearer token to the reviewer behind it.
///
/// Sessions are issued by the console's login flow; this subsystem only
/// reads them.
pub trait SessionResolver: Send + Sync {
    /// Resolve a token.
    ///
    /// Returns `Ok(None)` for unknown or expired tokens.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::InternalError` if the session store fails.
    fn resolve(&self, token: &str) -> impl Future<Output = Result<Option<Actor>>> + Send;
}
