//! Mock session resolver for testing.

use crate::error::{ResetError, Result};
use crate::model::{AccountId, Actor, Role};
use crate::providers::SessionResolver;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// In-memory token → actor map.
#[derive(Debug, Clone, Default)]
pub struct MockSessionResolver {
    sessions: Arc<Mutex<HashMap<String, Actor>>>,
}

impl MockSessionResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` for `actor`.
    pub fn insert(&self, token: impl Into<String>, actor: Actor) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(token.into(), actor);
        }
    }

    /// Create a session for a fresh account with `role`.
    ///
    /// Returns the bearer token and the actor behind it.
    pub fn issue(&self, role: Role) -> (String, Actor) {
        let token = Uuid::new_v4().simple().to_string();
        let actor = Actor {
            id: AccountId::new(),
            role,
        };
        self.insert(token.clone(), actor);
        (token, actor)
    }

    /// Drop a session.
    pub fn revoke(&self, token: &str) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(token);
        }
    }
}

impl SessionResolver for MockSessionResolver {
    async fn resolve(&self, token: &str) -> Result<Option<Actor>> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| ResetError::InternalError("Mutex lock failed".into()))?;
        Ok(sessions.get(token).copied())
    }
}
