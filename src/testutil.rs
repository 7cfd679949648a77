//! In-memory collaborator doubles for core-logic tests.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::db::{
    AlertRecord, CheckRecord, ConfigSource, DbError, MonitoringConfig, MonitorStore,
    NotificationMode, NotificationPolicy, PerformanceRecord, ProjectConfig, UptimeSummary,
    WebsiteConfig,
};
use crate::notify::{Notifier, NotifyError};
use crate::probe::{FailureKind, ProbeOutcome, Prober};
use crate::scheduler::CheckContext;

/// A one-project, one-website configuration snapshot.
pub(crate) fn one_site_config(
    enabled: Option<bool>,
    interval_seconds: u32,
    website_id: i64,
    url: &str,
) -> MonitoringConfig {
    MonitoringConfig {
        projects: vec![ProjectConfig {
            id: 1,
            name: "acme".to_string(),
            enabled,
            interval_seconds,
            notification: NotificationPolicy {
                mode: NotificationMode::Webhook,
                recipient: None,
            },
            websites: vec![WebsiteConfig {
                id: website_id,
                url: url.to_string(),
            }],
        }],
    }
}

/// Wire the doubles into a check context.
pub(crate) fn context(
    store: &Arc<MemoryStore>,
    prober: &Arc<StaticProber>,
    notifier: &Arc<RecordingNotifier>,
) -> CheckContext {
    CheckContext {
        config: store.clone(),
        store: store.clone(),
        prober: prober.clone(),
        notifier: notifier.clone(),
    }
}

/// In-memory store implementing both storage collaborator traits.
pub(crate) struct MemoryStore {
    config: Mutex<MonitoringConfig>,
    fail_config: AtomicBool,
    fail_summary: AtomicBool,
    next_alert_id: AtomicI64,
    pub checks: Mutex<Vec<CheckRecord>>,
    pub performance: Mutex<Vec<PerformanceRecord>>,
    pub alerts: Mutex<Vec<AlertRecord>>,
    pub summaries: Mutex<Vec<UptimeSummary>>,
}

impl MemoryStore {
    pub fn new(config: MonitoringConfig) -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(config),
            fail_config: AtomicBool::new(false),
            fail_summary: AtomicBool::new(false),
            next_alert_id: AtomicI64::new(1),
            checks: Mutex::new(Vec::new()),
            performance: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
            summaries: Mutex::new(Vec::new()),
        })
    }

    pub fn set_config(&self, config: MonitoringConfig) {
        *self.config.lock().unwrap() = config;
    }

    pub fn fail_config_reads(&self, fail: bool) {
        self.fail_config.store(fail, Ordering::Relaxed);
    }

    pub fn fail_summary_writes(&self, fail: bool) {
        self.fail_summary.store(fail, Ordering::Relaxed);
    }
}

impl ConfigSource for MemoryStore {
    fn fetch_config(&self) -> Result<MonitoringConfig, DbError> {
        if self.fail_config.load(Ordering::Relaxed) {
            return Err(DbError::NotFound);
        }
        Ok(self.config.lock().unwrap().clone())
    }
}

impl MonitorStore for MemoryStore {
    fn append_check(&self, check: &CheckRecord) -> Result<(), DbError> {
        self.checks.lock().unwrap().push(check.clone());
        Ok(())
    }

    fn append_performance(&self, metric: &PerformanceRecord) -> Result<(), DbError> {
        self.performance.lock().unwrap().push(metric.clone());
        Ok(())
    }

    fn find_open_alert(&self, website_id: i64) -> Result<Option<AlertRecord>, DbError> {
        Ok(self
            .alerts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.website_id == website_id && a.is_open())
            .cloned())
    }

    fn create_alert(&self, website_id: i64, message: &str) -> Result<AlertRecord, DbError> {
        let alert = AlertRecord {
            id: self.next_alert_id.fetch_add(1, Ordering::Relaxed),
            website_id,
            message: message.to_string(),
            raised_at: Utc::now(),
            resolved_at: None,
        };
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(alert)
    }

    fn resolve_alert(&self, alert_id: i64) -> Result<(), DbError> {
        let mut alerts = self.alerts.lock().unwrap();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == alert_id && a.is_open())
            .ok_or(DbError::NotFound)?;
        alert.resolved_at = Some(Utc::now());
        Ok(())
    }

    fn checks_between(
        &self,
        website_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CheckRecord>, DbError> {
        Ok(self
            .checks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.website_id == website_id && c.time >= start && c.time < end)
            .cloned()
            .collect())
    }

    fn append_uptime_summary(&self, summary: &UptimeSummary) -> Result<(), DbError> {
        if self.fail_summary.load(Ordering::Relaxed) {
            return Err(DbError::NotFound);
        }
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }

    fn delete_checks_older_than(&self, cutoff: DateTime<Utc>) -> Result<(), DbError> {
        self.checks.lock().unwrap().retain(|c| c.time >= cutoff);
        Ok(())
    }

    fn delete_performance_older_than(&self, cutoff: DateTime<Utc>) -> Result<(), DbError> {
        self.performance.lock().unwrap().retain(|p| p.time >= cutoff);
        Ok(())
    }
}

/// Prober that replays a scripted outcome and counts calls.
pub(crate) struct StaticProber {
    outcome: Mutex<ProbeOutcome>,
    pub calls: AtomicUsize,
}

impl StaticProber {
    pub fn up(latency_ms: u64) -> Self {
        Self {
            outcome: Mutex::new(ProbeOutcome {
                latency_ms: Some(latency_ms),
                status_code: Some(200),
                response_bytes: Some(512),
                failure: None,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn down(failure: FailureKind, status_code: Option<u16>) -> Self {
        let prober = Self::up(0);
        prober.set_down(failure, status_code);
        prober
    }

    pub fn set_up(&self, latency_ms: u64) {
        *self.outcome.lock().unwrap() = ProbeOutcome {
            latency_ms: Some(latency_ms),
            status_code: Some(200),
            response_bytes: Some(512),
            failure: None,
        };
    }

    pub fn set_down(&self, failure: FailureKind, status_code: Option<u16>) {
        *self.outcome.lock().unwrap() = ProbeOutcome {
            latency_ms: Some(100),
            status_code,
            response_bytes: None,
            failure: Some(failure),
        };
    }
}

#[async_trait::async_trait]
impl Prober for StaticProber {
    async fn probe(&self, _url: &str, _timeout: std::time::Duration) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.outcome.lock().unwrap().clone()
    }
}

/// Notifier that records every dispatch.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub sent: Mutex<Vec<(i64, String, String)>>,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        website_id: i64,
        message: &str,
        recipient: &str,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((website_id, message.to_string(), recipient.to_string()));
        Ok(())
    }
}
