//! Record shapes and the monitoring configuration snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::probe::FailureKind;

/// One website eligible for monitoring.
///
/// Identity is the full triple: a target whose url or interval changed is a
/// different target, and reconciliation replaces its task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonitorTarget {
    pub website_id: i64,
    pub url: String,
    pub interval_seconds: u32,
}

/// One raw check outcome. Write-once, append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRecord {
    pub website_id: i64,
    pub time: DateTime<Utc>,
    pub up: bool,
    pub latency_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub failure: Option<FailureKind>,
    pub response_bytes: Option<u64>,
}

/// Performance sample taken alongside every check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub website_id: i64,
    pub time: DateTime<Utc>,
    pub latency_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub response_bytes: Option<u64>,
}

/// A raised alert. At most one row per website may have `resolved_at = None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    pub website_id: i64,
    pub message: String,
    pub raised_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AlertRecord {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Uptime statistics for one website over one aggregation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeSummary {
    pub website_id: i64,
    pub window_start: DateTime<Utc>,
    pub uptime_percent: f64,
    pub downtime_percent: f64,
    pub total_checks: u64,
    pub failed_checks: u64,
    pub avg_latency_ms: Option<f64>,
}

/// How a project wants to be told about alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMode {
    Webhook,
    Email,
    Disabled,
}

impl NotificationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationMode::Webhook => "webhook",
            NotificationMode::Email => "email",
            NotificationMode::Disabled => "disabled",
        }
    }

    /// Parse the persisted form. Unknown modes never dispatch.
    pub fn parse(s: &str) -> Self {
        match s {
            "webhook" => NotificationMode::Webhook,
            "email" => NotificationMode::Email,
            _ => NotificationMode::Disabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPolicy {
    pub mode: NotificationMode,
    pub recipient: Option<String>,
}

/// Project-level monitoring settings as written by the configuration owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSettings {
    /// `None` means the flag was never set, which does not disable monitoring.
    pub enabled: Option<bool>,
    pub interval_seconds: u32,
    pub notification: NotificationPolicy,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            enabled: None,
            interval_seconds: 60,
            notification: NotificationPolicy {
                mode: NotificationMode::Webhook,
                recipient: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteConfig {
    pub id: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub id: i64,
    pub name: String,
    pub enabled: Option<bool>,
    pub interval_seconds: u32,
    pub notification: NotificationPolicy,
    pub websites: Vec<WebsiteConfig>,
}

impl ProjectConfig {
    /// Explicit opt-out only: a missing flag never suppresses monitoring.
    pub fn monitoring_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn is_eligible(&self) -> bool {
        self.monitoring_enabled() && !self.websites.is_empty()
    }
}

/// Snapshot of the desired monitoring configuration.
///
/// Compared between polls by structural equality, never through a
/// serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MonitoringConfig {
    pub projects: Vec<ProjectConfig>,
}

impl MonitoringConfig {
    /// Flatten the snapshot into the targets eligible for scheduling.
    pub fn targets(&self) -> Vec<MonitorTarget> {
        self.projects
            .iter()
            .filter(|p| p.is_eligible())
            .flat_map(|p| {
                p.websites.iter().map(move |w| MonitorTarget {
                    website_id: w.id,
                    url: w.url.clone(),
                    interval_seconds: p.interval_seconds,
                })
            })
            .collect()
    }

    /// The project owning a website, if the website is still configured.
    pub fn project_for_website(&self, website_id: i64) -> Option<&ProjectConfig> {
        self.projects
            .iter()
            .find(|p| p.websites.iter().any(|w| w.id == website_id))
    }
}
