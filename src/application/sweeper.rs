//! Background expiry sweep.
//!
//! Scans every guild for active wagers whose voting window has passed and
//! moves each one to `PendingResolution` in its own guild-scoped unit of
//! work. One guild's failure never blocks the rest of the sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::SweeperConfig;
use crate::domain::GroupWager;
use crate::error::{Result, WagerError};
use crate::port::outbound::uow::{GuildScope, UnitOfWorkFactory};

use super::service::GroupWagerService;

/// Outcome of one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    /// Wagers moved to `PendingResolution`.
    pub transitioned: usize,
    /// Wagers whose transition failed and was skipped.
    pub failed: usize,
}

/// Finds expired wagers across all guilds and closes their voting phase.
pub struct ExpirySweep {
    factory: Arc<dyn UnitOfWorkFactory>,
}

impl ExpirySweep {
    pub fn new(factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { factory }
    }

    /// Run one sweep pass.
    ///
    /// The expired set is read in a single cross-guild transaction, then
    /// each wager transitions inside its own guild-scoped transaction.
    /// Per-wager failures are logged and counted, not propagated.
    pub async fn transition_expired_wagers(&self) -> Result<SweepSummary> {
        let expired = self.load_expired().await?;
        if expired.is_empty() {
            debug!("No expired wagers to transition");
            return Ok(SweepSummary::default());
        }

        let mut summary = SweepSummary::default();
        for wager in &expired {
            match self.transition_one(wager).await {
                Ok(()) => summary.transitioned += 1,
                Err(e) => {
                    warn!(
                        guild_id = %wager.guild_id,
                        wager_id = %wager.id,
                        error = %e,
                        "Failed to transition expired wager, skipping"
                    );
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Count of wagers currently awaiting resolution across all guilds.
    pub async fn pending_resolution_count(&self) -> Result<usize> {
        let mut uow = self.factory.create(GuildScope::CrossGuild)?;
        uow.begin().await?;
        let pending = uow.group_wagers().pending_resolution().await?;
        uow.rollback().await?;
        Ok(pending.len())
    }

    async fn load_expired(&self) -> Result<Vec<GroupWager>> {
        let mut uow = self.factory.create(GuildScope::CrossGuild)?;
        uow.begin().await?;
        let expired = uow.group_wagers().expired_active(Utc::now()).await?;
        uow.rollback().await?;
        Ok(expired)
    }

    async fn transition_one(&self, wager: &GroupWager) -> std::result::Result<(), WagerError> {
        let mut uow = self.factory.create(GuildScope::Guild(wager.guild_id))?;
        uow.begin().await?;
        {
            let service = GroupWagerService::new(uow.as_ref());
            service.transition_to_pending_resolution(wager.id).await?;
        }
        uow.commit().await?;
        Ok(())
    }
}

/// Handle for stopping the background sweeper.
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to shut down gracefully.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Periodic driver around [`ExpirySweep`].
pub struct Sweeper {
    config: SweeperConfig,
    sweep: ExpirySweep,
}

impl Sweeper {
    pub fn new(config: SweeperConfig, factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self {
            config,
            sweep: ExpirySweep::new(factory),
        }
    }

    /// Spawn the sweep loop. Returns a handle for lifecycle control.
    pub fn start(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(self.config.interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(
                interval_secs = self.config.interval_secs,
                "Expiry sweeper started"
            );

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Expiry sweeper shutting down");
                        break;
                    }

                    _ = ticker.tick() => {
                        match self.sweep.transition_expired_wagers().await {
                            Ok(summary) if summary.transitioned > 0 || summary.failed > 0 => {
                                match self.sweep.pending_resolution_count().await {
                                    Ok(pending) => info!(
                                        transitioned = summary.transitioned,
                                        failed = summary.failed,
                                        pending,
                                        "Expiry sweep finished"
                                    ),
                                    Err(e) => {
                                        warn!(error = %e, "Could not count pending wagers");
                                        info!(
                                            transitioned = summary.transitioned,
                                            failed = summary.failed,
                                            "Expiry sweep finished"
                                        );
                                    }
                                }
                            }
                            Ok(_) => {}
                            Err(e) => error!(error = %e, "Expiry sweep failed"),
                        }
                    }
                }
            }
        });

        SweeperHandle { shutdown_tx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GuildId, WagerState};
    use crate::port::outbound::uow::GuildScope;
    use crate::testkit::{memory_factory, pool_wager_request, RecordingEventBus};

    async fn open_expired_wager(
        factory: &Arc<dyn UnitOfWorkFactory>,
        guild: i64,
        options: &[&str],
    ) -> crate::domain::WagerId {
        let guild_id = GuildId::new(guild);
        let mut uow = factory.create(GuildScope::Guild(guild_id)).unwrap();
        uow.begin().await.unwrap();
        let detail = GroupWagerService::new(uow.as_ref())
            .create_group_wager(pool_wager_request(options))
            .await
            .unwrap();
        let mut expired = detail.wager.clone();
        expired.voting_ends_at = Utc::now() - chrono::Duration::minutes(1);
        uow.group_wagers().update(&expired).await.unwrap();
        uow.commit().await.unwrap();
        detail.wager.id
    }

    async fn wager_state(
        factory: &Arc<dyn UnitOfWorkFactory>,
        guild: i64,
        wager_id: crate::domain::WagerId,
    ) -> WagerState {
        let mut uow = factory
            .create(GuildScope::Guild(GuildId::new(guild)))
            .unwrap();
        uow.begin().await.unwrap();
        let wager = uow
            .group_wagers()
            .get_by_id(wager_id)
            .await
            .unwrap()
            .unwrap();
        uow.rollback().await.unwrap();
        wager.state
    }

    #[tokio::test]
    async fn sweep_transitions_expired_wagers_across_guilds() {
        let bus = std::sync::Arc::new(RecordingEventBus::new());
        let factory: Arc<dyn UnitOfWorkFactory> = Arc::new(memory_factory(bus));

        let first = open_expired_wager(&factory, 100, &["a", "b"]).await;
        let second = open_expired_wager(&factory, 200, &["x", "y"]).await;

        let sweep = ExpirySweep::new(factory.clone());
        let summary = sweep.transition_expired_wagers().await.unwrap();

        assert_eq!(
            summary,
            SweepSummary {
                transitioned: 2,
                failed: 0
            }
        );
        assert_eq!(
            wager_state(&factory, 100, first).await,
            WagerState::PendingResolution
        );
        assert_eq!(
            wager_state(&factory, 200, second).await,
            WagerState::PendingResolution
        );
        assert_eq!(sweep.pending_resolution_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn sweep_with_nothing_expired_reports_empty_summary() {
        let bus = std::sync::Arc::new(RecordingEventBus::new());
        let factory: Arc<dyn UnitOfWorkFactory> = Arc::new(memory_factory(bus));

        let guild_id = GuildId::new(300);
        {
            let mut uow = factory.create(GuildScope::Guild(guild_id)).unwrap();
            uow.begin().await.unwrap();
            GroupWagerService::new(uow.as_ref())
                .create_group_wager(pool_wager_request(&["a", "b"]))
                .await
                .unwrap();
            uow.commit().await.unwrap();
        }

        let sweep = ExpirySweep::new(factory);
        let summary = sweep.transition_expired_wagers().await.unwrap();
        assert_eq!(summary, SweepSummary::default());
    }

    #[tokio::test]
    async fn repeated_sweeps_are_idempotent() {
        let bus = std::sync::Arc::new(RecordingEventBus::new());
        let factory: Arc<dyn UnitOfWorkFactory> = Arc::new(memory_factory(bus));
        let wager_id = open_expired_wager(&factory, 400, &["a", "b"]).await;

        let sweep = ExpirySweep::new(factory.clone());
        sweep.transition_expired_wagers().await.unwrap();
        let second = sweep.transition_expired_wagers().await.unwrap();

        assert_eq!(second, SweepSummary::default());
        assert_eq!(
            wager_state(&factory, 400, wager_id).await,
            WagerState::PendingResolution
        );
    }

    #[tokio::test]
    async fn sweeper_handle_shuts_the_loop_down() {
        let bus = std::sync::Arc::new(RecordingEventBus::new());
        let factory: Arc<dyn UnitOfWorkFactory> = Arc::new(memory_factory(bus));

        let handle = Sweeper::new(
            SweeperConfig {
                interval_secs: 3600,
                enabled: true,
            },
            factory,
        )
        .start();
        handle.shutdown().await;
    }
}
