//! Scheduling module: the reconciling job scheduler and the background
//! managers it feeds (config poller, uptime aggregator).

mod alerts;
mod poller;
mod tick;
mod uptime;

pub use poller::*;
pub use uptime::*;

use crate::db::{ConfigSource, MonitorStore, MonitorTarget};
use crate::notify::Notifier;
use crate::probe::Prober;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

/// Scheduling error for one target.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("unsupported check interval: {0}s")]
    UnsupportedInterval(u32),
}

/// Map a configured check interval to a timer cadence.
///
/// Common intervals map to fixed presets; anything else of a minute or more
/// rounds down to whole minutes. Sub-minute intervals other than 30s have no
/// cadence and the target is skipped.
pub fn cadence_for(interval_seconds: u32) -> Result<Duration, ScheduleError> {
    match interval_seconds {
        30 => Ok(Duration::from_secs(30)),
        60 => Ok(Duration::from_secs(60)),
        300 => Ok(Duration::from_secs(300)),
        600 => Ok(Duration::from_secs(600)),
        900 => Ok(Duration::from_secs(900)),
        n if n >= 60 => Ok(Duration::from_secs(u64::from(n / 60) * 60)),
        n => Err(ScheduleError::UnsupportedInterval(n)),
    }
}

/// Collaborators every check task needs on each tick.
pub(crate) struct CheckContext {
    pub config: Arc<dyn ConfigSource>,
    pub store: Arc<dyn MonitorStore>,
    pub prober: Arc<dyn Prober>,
    pub notifier: Arc<dyn Notifier>,
}

/// The scheduler owns the live set of periodic check tasks and converges it
/// to whatever target set the config poller hands over.
pub struct Scheduler {
    ctx: Arc<CheckContext>,
    /// Live task table, keyed by target identity. All mutation happens with
    /// the map locked, so a reconciliation arriving while another is still
    /// draining serializes behind it instead of interleaving.
    tasks: Mutex<HashMap<MonitorTarget, broadcast::Sender<()>>>,
    task_count: AtomicUsize,
}

impl Scheduler {
    pub fn new(
        config: Arc<dyn ConfigSource>,
        store: Arc<dyn MonitorStore>,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            ctx: Arc::new(CheckContext {
                config,
                store,
                prober,
                notifier,
            }),
            tasks: Mutex::new(HashMap::new()),
            task_count: AtomicUsize::new(0),
        }
    }

    /// Number of live check tasks. Lock-free; may trail an in-flight
    /// reconciliation.
    pub fn task_count(&self) -> usize {
        self.task_count.load(Ordering::Relaxed)
    }

    /// Converge the live task table to `desired`.
    ///
    /// Targets present in both sets are left untouched so their in-flight
    /// cadence timers never reset. A target whose interval has no cadence is
    /// skipped with a warning; the rest of the set still converges.
    pub async fn reconcile(&self, desired: Vec<MonitorTarget>) {
        let desired: HashSet<MonitorTarget> = desired.into_iter().collect();

        let mut tasks = self.tasks.lock().await;

        let stale: Vec<MonitorTarget> = tasks
            .keys()
            .filter(|t| !desired.contains(*t))
            .cloned()
            .collect();
        for target in stale {
            if let Some(stop) = tasks.remove(&target) {
                let _ = stop.send(());
                tracing::info!(
                    website_id = target.website_id,
                    url = %target.url,
                    "stopped check task"
                );
            }
        }

        for target in desired {
            if tasks.contains_key(&target) {
                continue;
            }

            let cadence = match cadence_for(target.interval_seconds) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(
                        website_id = target.website_id,
                        url = %target.url,
                        error = %e,
                        "skipping target"
                    );
                    continue;
                }
            };

            let (stop_tx, stop_rx) = broadcast::channel(1);
            tracing::info!(
                website_id = target.website_id,
                url = %target.url,
                cadence_secs = cadence.as_secs(),
                "starting check task"
            );
            tokio::spawn(run_check_loop(self.ctx.clone(), target.clone(), cadence, stop_rx));
            tasks.insert(target, stop_tx);
        }

        self.task_count.store(tasks.len(), Ordering::Relaxed);
    }

    /// Stop every check task and empty the table.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        for (target, stop) in tasks.drain() {
            let _ = stop.send(());
            tracing::debug!(website_id = target.website_id, "stopped check task");
        }
        self.task_count.store(0, Ordering::Relaxed);
    }
}

/// Periodic loop for one target. Each tick runs detached so a slow probe
/// never delays the timer or the reconciler; overlapping probes for one
/// target are accepted.
async fn run_check_loop(
    ctx: Arc<CheckContext>,
    target: MonitorTarget,
    cadence: Duration,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut timer = tokio::time::interval(cadence);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = timer.tick() => {
                let ctx = ctx.clone();
                let target = target.clone();
                tokio::spawn(async move {
                    tick::run_check(&ctx, &target).await;
                });
            }
        }
    }
}
