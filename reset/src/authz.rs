//! Reviewer authorization.

use crate::error::{ResetError, Result};
use crate::model::{Actor, Role};

/// Single decision point for reviewer operations.
///
/// Evaluated once at the entry of approve, deny, stats and the read
/// endpoints. Reviewers are support staff and administrators.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationGate;

impl AuthorizationGate {
    /// Create a gate.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Whether `role` may review reset requests.
    #[must_use]
    pub const fn can_review(&self, role: Role) -> bool {
        matches!(role, Role::Support | Role::Admin)
    }

    /// Admit a caller or explain why not.
    ///
    /// # Errors
    ///
    /// - no session → `ResetError::Unauthorized`
    /// - non-reviewer role → `ResetError::Forbidden`
    pub fn authorize(&self, actor: Option<Actor>) -> Result<Actor> {
        let actor = actor.ok_or(ResetError::Unauthorized)?;
        if !self.can_review(actor.role) {
            tracing::warn!(
                actor_id = %actor.id,
                role = actor.role.as_str(),
                "Reviewer operation refused"
            );
            return Err(ResetError::Forbidden {
                role: actor.role.as_str().to_string(),
            });
        }
        Ok(actor)
    }
}
