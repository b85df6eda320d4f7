//! Background refresh worker
//!
//! Runs one aggregation on startup (if configured), then one per interval,
//! publishing every snapshot to the store. Runs never overlap: a run that
//! outlasts the interval delays the next tick instead of stacking.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::CcpiEngine;
use crate::store::SnapshotStore;
use crate::types::CcpiSnapshot;

pub struct RefreshWorker {
    engine: Arc<CcpiEngine>,
    store: Arc<SnapshotStore>,
    interval: Duration,
    run_on_startup: bool,
}

impl RefreshWorker {
    pub fn new(
        engine: Arc<CcpiEngine>,
        store: Arc<SnapshotStore>,
        interval: Duration,
        run_on_startup: bool,
    ) -> Self {
        Self {
            engine,
            store,
            interval: interval.max(Duration::from_secs(1)),
            run_on_startup,
        }
    }

    pub fn from_config(
        engine: Arc<CcpiEngine>,
        store: Arc<SnapshotStore>,
        cfg: &config::EngineConfig,
    ) -> Self {
        Self::new(
            engine,
            store,
            Duration::from_secs(cfg.refresh_interval_seconds),
            cfg.run_on_startup,
        )
    }

    /// Run until the token is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            run_on_startup = self.run_on_startup,
            "Starting CCPI refresh worker"
        );

        if self.run_on_startup {
            tokio::select! {
                _ = self.run_once() => {}
                _ = shutdown.cancelled() => {
                    info!("Refresh worker cancelled during startup run");
                    return;
                }
            }
        }

        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.cancelled() => {
                    info!("Refresh worker shutting down");
                    return;
                }
            }
        }
    }

    /// One run, published to the store
    pub async fn run_once(&self) -> Arc<CcpiSnapshot> {
        let snapshot = self.engine.run().await;
        let published = self.store.publish(snapshot);
        debug!(run_id = %published.run_id, history = self.store.len(), "Snapshot published");
        published
    }
}
