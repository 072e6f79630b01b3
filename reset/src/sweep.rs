//! Background expiry sweep.
//!
//! Overdue pending requests are expired on a fixed interval, one transaction
//! per request. The sweep is lazy by nature; review paths re-check the
//! deadline themselves and never rely on it having run.

use crate::audit::AuditRecorder;
use crate::clock::Clock;
use crate::config::ResetConfig;
use crate::error::{ResetError, Result};
use crate::model::ResetVariant;
use crate::orchestrator::expire_overdue;
use crate::providers::ResetStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const VARIANTS: [ResetVariant; 2] = [ResetVariant::Guide, ResetVariant::Employee];

/// Periodically expires overdue pending requests of every variant.
///
/// # Example
///
/// ```ignore
/// let (sweeper, shutdown) = ExpirySweeper::new(store, clock, &config);
/// tokio::spawn(sweeper.run());
///
/// // On shutdown:
/// shutdown.send(true).ok();
/// ```
pub struct ExpirySweeper<S> {
    store: Arc<S>,
    audit: AuditRecorder,
    clock: Arc<dyn Clock>,
    interval: Duration,
    batch_size: u32,
    shutdown: watch::Receiver<bool>,
}

impl<S: ResetStore> ExpirySweeper<S> {
    /// Create a sweeper and the sender that stops it.
    ///
    /// Send `true` to stop the loop after the current pass.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        config: &ResetConfig,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = Self {
            store,
            audit: AuditRecorder::new(),
            clock,
            interval: config.sweep_interval,
            batch_size: config.sweep_batch_size,
            shutdown: shutdown_rx,
        };
        (sweeper, shutdown_tx)
    }

    /// Run one pass over all variants.
    ///
    /// Returns the number of requests expired. A request that fails to
    /// expire is logged and skipped; the next pass retries it.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::DatabaseError` if overdue requests cannot be listed.
    pub async fn sweep_once(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut expired = 0;

        for variant in VARIANTS {
            let overdue = self
                .store
                .list_overdue(variant, now, self.batch_size)
                .await?;

            for id in overdue {
                match expire_overdue(&*self.store, &self.audit, variant, id, now).await {
                    Ok(_) => expired += 1,
                    // Reviewed or expired by someone else since listing.
                    Err(ResetError::AlreadyReviewed { .. }) => {}
                    Err(e) => {
                        tracing::warn!(
                            variant = variant.as_str(),
                            request_id = %id,
                            error = %e,
                            "Failed to expire reset request"
                        );
                    }
                }
            }
        }

        if expired > 0 {
            tracing::info!(expired = expired, "Expiry sweep completed");
        }
        Ok(expired)
    }

    /// Sweep on every tick until the shutdown signal is received.
    pub async fn run(mut self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Starting expiry sweeper");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !*self.shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "Expiry sweep failed");
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        tracing::info!("Expiry sweeper stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::audit::AuditAction;
    use crate::mocks::{MockClock, MockResetStore};
    use crate::model::{CredentialResetRequest, RequestOrigin, ResetStatus, Role};
    use chrono::{Duration as ChronoDuration, Utc};

    #[tokio::test]
    async fn test_sweep_expires_only_overdue() {
        let store = MockResetStore::new();
        let clock = MockClock::new(Utc::now());
        let config = ResetConfig::default();

        let alice = store.with_account(ResetVariant::Guide, "alice@example.com", Role::Guide, "h");
        let bob = store.with_account(ResetVariant::Employee, "bob@example.com", Role::Employee, "h");

        let old = CredentialResetRequest::pending(
            ResetVariant::Guide,
            &alice,
            None,
            RequestOrigin::default(),
            clock.now() - ChronoDuration::hours(100),
            config.request_ttl,
        );
        let fresh = CredentialResetRequest::pending(
            ResetVariant::Employee,
            &bob,
            None,
            RequestOrigin::default(),
            clock.now(),
            config.request_ttl,
        );
        let (old_id, fresh_id) = (old.id, fresh.id);
        store.seed_request(old);
        store.seed_request(fresh);

        let (sweeper, _shutdown) =
            ExpirySweeper::new(Arc::new(store.clone()), Arc::new(clock.clone()), &config);
        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);

        assert_eq!(store.request(old_id).unwrap().status, ResetStatus::Expired);
        assert_eq!(store.request(fresh_id).unwrap().status, ResetStatus::Pending);

        let audit = store.audit_entries();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, AuditAction::Expire);
        assert!(audit[0].actor_id.is_none());

        // second pass finds nothing
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = MockResetStore::new();
        let config = ResetConfig::default().with_sweep_interval(Duration::from_millis(10));
        let (sweeper, shutdown) =
            ExpirySweeper::new(Arc::new(store), Arc::new(MockClock::default()), &config);

        let handle = tokio::spawn(sweeper.run());
        shutdown.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
