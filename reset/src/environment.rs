//! Reset environment.
//!
//! Wires the providers into the services the HTTP layer calls.

use crate::authz::AuthorizationGate;
use crate::clock::Clock;
use crate::config::ResetConfig;
use crate::credential::CredentialMutator;
use crate::error::{ResetError, Result};
use crate::model::Actor;
use crate::notify::NotificationDispatcher;
use crate::orchestrator::ApprovalOrchestrator;
use crate::providers::{Notifier, RateLimiter, ResetStore, SessionResolver};
use crate::submission::SubmissionService;
use crate::sweep::ExpirySweeper;
use std::sync::Arc;
use tokio::sync::watch;

/// Everything the reset endpoints need.
///
/// # Type Parameters
///
/// - `S`: Request/account store (`PostgreSQL`)
/// - `RL`: Rate limiter (`Redis`)
/// - `N`: Notifier (SMTP or console)
/// - `SR`: Reviewer session resolver (`Redis`)
pub struct ResetEnvironment<S, RL, N, SR> {
    /// Submission service.
    pub submissions: SubmissionService<S, RL>,

    /// Approve/deny/expire and reviewer reads.
    pub orchestrator: ApprovalOrchestrator<S, N>,

    /// Reviewer session lookup.
    pub sessions: SR,

    /// Reviewer role check.
    pub gate: AuthorizationGate,

    /// Active configuration.
    pub config: ResetConfig,

    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S, RL, N, SR> ResetEnvironment<S, RL, N, SR>
where
    S: ResetStore,
    RL: RateLimiter,
    N: Notifier + 'static,
    SR: SessionResolver,
{
    /// Create an environment.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::HashingFailed` if `config.hash_cost` is invalid.
    pub fn new(
        store: S,
        rate_limiter: RL,
        notifier: N,
        sessions: SR,
        clock: Arc<dyn Clock>,
        config: ResetConfig,
    ) -> Result<Self> {
        let store = Arc::new(store);
        let credentials = CredentialMutator::new(config.password_policy.clone(), config.hash_cost)?;

        let submissions = SubmissionService::new(
            Arc::clone(&store),
            Arc::new(rate_limiter),
            Arc::clone(&clock),
            config.clone(),
        );
        let orchestrator = ApprovalOrchestrator::new(
            Arc::clone(&store),
            credentials,
            NotificationDispatcher::new(notifier),
            Arc::clone(&clock),
            &config,
        );

        Ok(Self {
            submissions,
            orchestrator,
            sessions,
            gate: AuthorizationGate::new(),
            config,
            store,
            clock,
        })
    }

    /// Resolve a bearer token and admit only reviewers.
    ///
    /// # Errors
    ///
    /// - missing or unknown token → `ResetError::Unauthorized`
    /// - non-reviewer role → `ResetError::Forbidden`
    /// - session store failure → `ResetError::InternalError`
    pub async fn authenticate_reviewer(&self, token: Option<&str>) -> Result<Actor> {
        let Some(token) = token else {
            return Err(ResetError::Unauthorized);
        };
        let actor = self.sessions.resolve(token).await?;
        self.gate.authorize(actor)
    }

    /// Build the expiry sweeper over this environment's store and clock.
    #[must_use]
    pub fn sweeper(&self) -> (ExpirySweeper<S>, watch::Sender<bool>) {
        ExpirySweeper::new(Arc::clone(&self.store), Arc::clone(&self.clock), &self.config)
    }
}
