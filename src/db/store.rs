//! SQLite store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;
use super::{ConfigSource, MonitorStore};
use crate::probe::FailureKind;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
}

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

fn fmt_time(t: DateTime<Utc>) -> String {
    t.format(TS_FORMAT).to_string()
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;

        Ok(())
    }

    // --- Configuration management ---

    /// Add a project and return its ID.
    pub fn create_project(&self, name: &str) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("INSERT INTO projects (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    /// Write or replace a project's monitoring settings.
    pub fn upsert_settings(
        &self,
        project_id: i64,
        settings: &ProjectSettings,
    ) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO settings (project_id, enabled, check_interval_seconds, notification_mode, notification_recipient)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(project_id) DO UPDATE SET
             enabled=excluded.enabled,
             check_interval_seconds=excluded.check_interval_seconds,
             notification_mode=excluded.notification_mode,
             notification_recipient=excluded.notification_recipient",
            params![
                project_id,
                settings.enabled.map(i64::from),
                settings.interval_seconds,
                settings.notification.mode.as_str(),
                settings.notification.recipient,
            ],
        )?;
        Ok(())
    }

    /// Add a website to a project and return its ID.
    pub fn add_website(&self, project_id: i64, url: &str) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO websites (project_id, url) VALUES (?1, ?2)",
            params![project_id, url],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Remove a website from the configuration. Its history stays.
    pub fn remove_website(&self, website_id: i64) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM websites WHERE id = ?1", params![website_id])?;
        Ok(())
    }
}

impl ConfigSource for SqliteStore {
    fn fetch_config(&self) -> Result<MonitoringConfig, DbError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT p.id, p.name, s.enabled,
                    COALESCE(s.check_interval_seconds, 60),
                    COALESCE(s.notification_mode, 'webhook'),
                    s.notification_recipient
             FROM projects p
             LEFT JOIN settings s ON s.project_id = p.id
             ORDER BY p.id ASC",
        )?;

        let mut projects = stmt
            .query_map([], |row| {
                let enabled: Option<i64> = row.get(2)?;
                let mode: String = row.get(4)?;
                Ok(ProjectConfig {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    enabled: enabled.map(|v| v != 0),
                    interval_seconds: row.get::<_, i64>(3)? as u32,
                    notification: NotificationPolicy {
                        mode: NotificationMode::parse(&mode),
                        recipient: row.get(5)?,
                    },
                    websites: Vec::new(),
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        let mut site_stmt =
            conn.prepare("SELECT id, url FROM websites WHERE project_id = ?1 ORDER BY id ASC")?;

        for project in &mut projects {
            project.websites = site_stmt
                .query_map(params![project.id], |row| {
                    Ok(WebsiteConfig {
                        id: row.get(0)?,
                        url: row.get(1)?,
                    })
                })?
                .collect::<SqlResult<Vec<_>>>()?;
        }

        Ok(MonitoringConfig { projects })
    }
}

impl MonitorStore for SqliteStore {
    fn append_check(&self, check: &CheckRecord) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO checks (website_id, time, up, latency_ms, status_code, failure, response_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                check.website_id,
                fmt_time(check.time),
                check.up,
                check.latency_ms.map(|v| v as i64),
                check.status_code,
                check.failure.map(|f| f.as_str()),
                check.response_bytes.map(|v| v as i64),
            ],
        )?;
        Ok(())
    }

    fn append_performance(&self, metric: &PerformanceRecord) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO performance (website_id, time, latency_ms, status_code, response_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                metric.website_id,
                fmt_time(metric.time),
                metric.latency_ms.map(|v| v as i64),
                metric.status_code,
                metric.response_bytes.map(|v| v as i64),
            ],
        )?;
        Ok(())
    }

    fn find_open_alert(&self, website_id: i64) -> Result<Option<AlertRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let alert = conn
            .query_row(
                "SELECT id, website_id, message, raised_at, resolved_at
                 FROM alerts
                 WHERE website_id = ?1 AND resolved_at IS NULL
                 ORDER BY raised_at DESC LIMIT 1",
                params![website_id],
                |row| {
                    let raised_at: String = row.get(3)?;
                    let resolved_at: Option<String> = row.get(4)?;
                    Ok(AlertRecord {
                        id: row.get(0)?,
                        website_id: row.get(1)?,
                        message: row.get(2)?,
                        raised_at: parse_db_time(&raised_at).unwrap_or_else(Utc::now),
                        resolved_at: resolved_at.as_deref().and_then(parse_db_time),
                    })
                },
            )
            .optional()?;
        Ok(alert)
    }

    fn create_alert(&self, website_id: i64, message: &str) -> Result<AlertRecord, DbError> {
        let raised_at = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO alerts (website_id, message, raised_at) VALUES (?1, ?2, ?3)",
            params![website_id, message, fmt_time(raised_at)],
        )?;
        Ok(AlertRecord {
            id: conn.last_insert_rowid(),
            website_id,
            message: message.to_string(),
            raised_at,
            resolved_at: None,
        })
    }

    fn resolve_alert(&self, alert_id: i64) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE alerts SET resolved_at = ?1 WHERE id = ?2 AND resolved_at IS NULL",
            params![fmt_time(Utc::now()), alert_id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    fn checks_between(
        &self,
        website_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CheckRecord>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT website_id, time, up, latency_ms, status_code, failure, response_bytes
             FROM checks
             WHERE website_id = ?1 AND time >= ?2 AND time < ?3
             ORDER BY time ASC",
        )?;

        let checks = stmt
            .query_map(
                params![website_id, fmt_time(start), fmt_time(end)],
                |row| {
                    let time: String = row.get(1)?;
                    let failure: Option<String> = row.get(5)?;
                    Ok(CheckRecord {
                        website_id: row.get(0)?,
                        time: parse_db_time(&time).unwrap_or_else(Utc::now),
                        up: row.get(2)?,
                        latency_ms: row.get::<_, Option<i64>>(3)?.map(|v| v as u64),
                        status_code: row.get(4)?,
                        failure: failure.as_deref().and_then(FailureKind::parse),
                        response_bytes: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
                    })
                },
            )?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(checks)
    }

    fn append_uptime_summary(&self, summary: &UptimeSummary) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO uptime_log (website_id, window_start, uptime_percent, downtime_percent, total_checks, failed_checks, avg_latency_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(website_id, window_start) DO UPDATE SET
             uptime_percent=excluded.uptime_percent,
             downtime_percent=excluded.downtime_percent,
             total_checks=excluded.total_checks,
             failed_checks=excluded.failed_checks,
             avg_latency_ms=excluded.avg_latency_ms",
            params![
                summary.website_id,
                fmt_time(summary.window_start),
                summary.uptime_percent,
                summary.downtime_percent,
                summary.total_checks as i64,
                summary.failed_checks as i64,
                summary.avg_latency_ms,
            ],
        )?;
        Ok(())
    }

    fn delete_checks_older_than(&self, cutoff: DateTime<Utc>) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM checks WHERE time < ?1", params![fmt_time(cutoff)])?;
        Ok(())
    }

    fn delete_performance_older_than(&self, cutoff: DateTime<Utc>) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM performance WHERE time < ?1",
            params![fmt_time(cutoff)],
        )?;
        Ok(())
    }
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [
        "%Y-%m-%d %H:%M:%S%.9f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
