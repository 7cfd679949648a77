//! Storage layer: collaborator traits and the SQLite implementation.

mod models;
mod store;

pub use models::*;
pub use store::*;

use chrono::{DateTime, Utc};

/// Read access to the desired monitoring configuration.
pub trait ConfigSource: Send + Sync {
    /// Fetch the current configuration snapshot. May fail transiently; the
    /// caller keeps whatever snapshot it already holds.
    fn fetch_config(&self) -> Result<MonitoringConfig, DbError>;
}

/// Persistence operations the monitoring engine drives.
///
/// Check and performance writes are append-only; alert rows move through
/// open -> resolved exactly once; summaries are keyed by
/// (website, window start).
pub trait MonitorStore: Send + Sync {
    fn append_check(&self, check: &CheckRecord) -> Result<(), DbError>;

    fn append_performance(&self, metric: &PerformanceRecord) -> Result<(), DbError>;

    fn find_open_alert(&self, website_id: i64) -> Result<Option<AlertRecord>, DbError>;

    fn create_alert(&self, website_id: i64, message: &str) -> Result<AlertRecord, DbError>;

    fn resolve_alert(&self, alert_id: i64) -> Result<(), DbError>;

    /// Checks for one website with `start <= time < end`, ascending.
    fn checks_between(
        &self,
        website_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CheckRecord>, DbError>;

    fn append_uptime_summary(&self, summary: &UptimeSummary) -> Result<(), DbError>;

    fn delete_checks_older_than(&self, cutoff: DateTime<Utc>) -> Result<(), DbError>;

    fn delete_performance_older_than(&self, cutoff: DateTime<Utc>) -> Result<(), DbError>;
}
