//! Configuration polling and change detection.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

use super::Scheduler;
use crate::db::{ConfigSource, MonitoringConfig};

/// Re-reads the desired configuration on a fixed tick and hands the
/// flattened target set to the scheduler whenever the snapshot changed.
pub struct ConfigPoller {
    config: Arc<dyn ConfigSource>,
    scheduler: Arc<Scheduler>,
    poll_interval: Duration,
    stop: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

impl ConfigPoller {
    pub fn new(
        config: Arc<dyn ConfigSource>,
        scheduler: Arc<Scheduler>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            config,
            scheduler,
            poll_interval,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the poller background task. The first tick fires immediately,
    /// so startup always performs an initial reconciliation.
    pub fn start(&self) {
        let config = self.config.clone();
        let scheduler = self.scheduler.clone();
        let poll_interval = self.poll_interval;
        let stop = self.stop.clone();

        tokio::spawn(async move {
            let (tx, _) = broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            let mut held: Option<MonitoringConfig> = None;

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        poll_once(&*config, &scheduler, &mut held).await;
                    }
                }
            }
        });
    }

    /// Stop the poller.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}

/// One poll: fetch, compare, reconcile on change.
///
/// A failed fetch keeps the held snapshot, so a transient read error never
/// tears running tasks down. There is no held snapshot on the very first
/// poll, which makes that one always reconcile.
pub(crate) async fn poll_once(
    config: &dyn ConfigSource,
    scheduler: &Scheduler,
    held: &mut Option<MonitoringConfig>,
) {
    let snapshot = match config.fetch_config() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "config fetch failed; keeping previous snapshot");
            return;
        }
    };

    if held.as_ref() == Some(&snapshot) {
        tracing::debug!("configuration unchanged");
        return;
    }

    let targets = snapshot.targets();
    tracing::info!(
        projects = snapshot.projects.len(),
        targets = targets.len(),
        "configuration changed; reconciling"
    );
    scheduler.reconcile(targets).await;
    tracing::info!(tasks = scheduler.task_count(), "reconciliation complete");
    *held = Some(snapshot);
}
