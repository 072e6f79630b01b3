//! Redis-backed reviewer session lookup.
//!
//! The console's login flow writes `session:{token}` → JSON-encoded
//! [`Actor`] with a TTL. This resolver only reads; an expired key is simply
//! missing.

use crate::error::{ResetError, Result};
use crate::model::Actor;
use crate::providers::SessionResolver;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Reads reviewer sessions from `Redis`.
#[derive(Clone)]
pub struct RedisSessionResolver {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisSessionResolver {
    /// Connect to `Redis`.
    ///
    /// # Errors
    ///
    /// Returns error if connection to `Redis` fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            ResetError::InternalError(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            ResetError::InternalError(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }

    /// Build from an existing connection manager.
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    fn session_key(token: &str) -> String {
        format!("session:{token}")
    }
}

impl SessionResolver for RedisSessionResolver {
    async fn resolve(&self, token: &str) -> Result<Option<Actor>> {
        if token.is_empty() {
            return Ok(None);
        }

        let mut conn = self.conn_manager.clone();
        let raw: Option<String> = conn.get(Self::session_key(token)).await.map_err(|e| {
            ResetError::InternalError(format!("Failed to read session: {e}"))
        })?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let actor = serde_json::from_str(&raw).map_err(|e| {
            ResetError::InternalError(format!("Failed to decode session: {e}"))
        })?;
        Ok(Some(actor))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::{AccountId, Role};

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_resolves_written_session() {
        let resolver = RedisSessionResolver::new("redis://127.0.0.1:6379").await.unwrap();
        let actor = Actor {
            id: AccountId::new(),
            role: Role::Support,
        };
        let token = uuid::Uuid::new_v4().simple().to_string();

        let mut conn = resolver.conn_manager.clone();
        let _: () = conn
            .set_ex(
                RedisSessionResolver::session_key(&token),
                serde_json::to_string(&actor).unwrap(),
                60,
            )
            .await
            .unwrap();

        assert_eq!(resolver.resolve(&token).await.unwrap(), Some(actor));
        assert_eq!(resolver.resolve("missing").await.unwrap(), None);

        let _: () = conn.del(RedisSessionResolver::session_key(&token)).await.unwrap();
    }
}
