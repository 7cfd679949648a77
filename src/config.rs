//! Configuration module for sitewatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Daemon configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the SQLite database file (default: "sitewatch.db")
    pub db_path: String,
    /// Seconds between configuration polls (default: 30)
    pub config_poll_secs: u64,
    /// Seconds between uptime aggregation passes (default: 900)
    pub aggregate_secs: u64,
    /// Trailing window for uptime statistics, in seconds (default: 900)
    pub uptime_window_secs: u32,
    /// Whether aggregation prunes raw rows older than the window
    /// (default: false)
    pub retention: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: "sitewatch.db".to_string(),
            config_poll_secs: 30,
            aggregate_secs: 900,
            uptime_window_secs: 900,
            retention: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SITEWATCH_DB_PATH`: database file path (default: "sitewatch.db")
    /// - `SITEWATCH_CONFIG_POLL_SECS`: config poll cadence (default: 30)
    /// - `SITEWATCH_AGGREGATE_SECS`: aggregation cadence (default: 900)
    /// - `SITEWATCH_UPTIME_WINDOW_SECS`: uptime window (default: 900)
    /// - `SITEWATCH_RETENTION`: "1" or "true" enables raw-history pruning
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(db_path) = env::var("SITEWATCH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(s) = env::var("SITEWATCH_CONFIG_POLL_SECS") {
            if let Ok(secs) = s.parse() {
                cfg.config_poll_secs = secs;
            }
        }

        if let Ok(s) = env::var("SITEWATCH_AGGREGATE_SECS") {
            if let Ok(secs) = s.parse() {
                cfg.aggregate_secs = secs;
            }
        }

        if let Ok(s) = env::var("SITEWATCH_UPTIME_WINDOW_SECS") {
            if let Ok(secs) = s.parse() {
                cfg.uptime_window_secs = secs;
            }
        }

        if let Ok(s) = env::var("SITEWATCH_RETENTION") {
            cfg.retention = s == "1" || s.eq_ignore_ascii_case("true");
        }

        cfg
    }
}
