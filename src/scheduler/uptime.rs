//! Uptime aggregation and retention.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

use crate::db::{CheckRecord, ConfigSource, DbError, MonitorStore, UptimeSummary};

/// Rolls raw checks up into per-window uptime summaries on its own cadence,
/// independent of any per-website check interval.
pub struct UptimeAggregator {
    config: Arc<dyn ConfigSource>,
    store: Arc<dyn MonitorStore>,
    cadence: Duration,
    window_seconds: u32,
    prune: bool,
    stop: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

impl UptimeAggregator {
    pub fn new(
        config: Arc<dyn ConfigSource>,
        store: Arc<dyn MonitorStore>,
        cadence: Duration,
        window_seconds: u32,
        prune: bool,
    ) -> Self {
        Self {
            config,
            store,
            cadence,
            window_seconds,
            prune,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the aggregator background task.
    pub fn start(&self) {
        let config = self.config.clone();
        let store = self.store.clone();
        let cadence = self.cadence;
        let window_seconds = self.window_seconds;
        let prune = self.prune;
        let stop = self.stop.clone();

        tokio::spawn(async move {
            let (tx, _) = broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(cadence);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The immediate first tick would summarize an empty window.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        if let Err(e) = run_once(&*config, &*store, window_seconds, prune, Utc::now()) {
                            tracing::error!(error = %e, "uptime aggregation pass failed");
                        }
                    }
                }
            }
        });
    }

    /// Stop the aggregator.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}

/// One aggregation pass over the trailing window ending at `now`.
///
/// The first storage error aborts the remaining websites; the next pass
/// starts from scratch. Raw rows are only pruned after every summary of the
/// pass is durably written, so an aborted pass never deletes anything.
pub(crate) fn run_once(
    config: &dyn ConfigSource,
    store: &dyn MonitorStore,
    window_seconds: u32,
    prune: bool,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let snapshot = config.fetch_config()?;
    let window_start = now - ChronoDuration::seconds(i64::from(window_seconds));

    let mut summarized = 0usize;
    for project in &snapshot.projects {
        for website in &project.websites {
            let checks = store.checks_between(website.id, window_start, now)?;
            if checks.is_empty() {
                // Idle window: no summary row.
                continue;
            }

            let summary = summarize(website.id, window_start, &checks);
            store.append_uptime_summary(&summary)?;
            summarized += 1;
        }
    }

    tracing::debug!(
        window_start = %window_start,
        websites = summarized,
        "uptime aggregation pass complete"
    );

    if prune {
        store.delete_checks_older_than(window_start)?;
        store.delete_performance_older_than(window_start)?;
    }

    Ok(())
}

/// Fold one window of checks into a summary row.
pub(crate) fn summarize(
    website_id: i64,
    window_start: DateTime<Utc>,
    checks: &[CheckRecord],
) -> UptimeSummary {
    let total = checks.len() as u64;
    let failed = checks.iter().filter(|c| !c.up).count() as u64;
    let uptime_percent = (total - failed) as f64 / total as f64 * 100.0;

    let latencies: Vec<u64> = checks.iter().filter_map(|c| c.latency_ms).collect();
    let avg_latency_ms = if latencies.is_empty() {
        None
    } else {
        Some(latencies.iter().sum::<u64>() as f64 / latencies.len() as f64)
    };

    UptimeSummary {
        website_id,
        window_start,
        uptime_percent,
        downtime_percent: 100.0 - uptime_percent,
        total_checks: total,
        failed_checks: failed,
        avg_latency_ms,
    }
}
