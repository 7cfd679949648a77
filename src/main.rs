//! sitewatch - website monitoring daemon
//!
//! Polls externally-managed monitoring configuration, keeps one periodic
//! health-check task per eligible website, records outcomes, raises and
//! resolves alerts, and aggregates raw checks into uptime statistics.

mod config;
mod db;
mod notify;
mod probe;
mod scheduler;
#[cfg(test)]
mod testutil;

use config::ServerConfig;
use db::{
    ConfigSource, MonitorStore, NotificationMode, NotificationPolicy, ProjectSettings, SqliteStore,
};
use notify::{Notifier, WebhookNotifier};
use probe::{HttpProber, Prober};
use scheduler::{ConfigPoller, Scheduler, UptimeAggregator};

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sitewatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting sitewatch");
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(SqliteStore::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Seed a sample project so a fresh database monitors something
    if store.fetch_config()?.projects.is_empty() {
        tracing::info!("Empty configuration; adding sample project");
        let project_id = store.create_project("sample")?;
        store.upsert_settings(
            project_id,
            &ProjectSettings {
                enabled: Some(true),
                interval_seconds: 60,
                notification: NotificationPolicy {
                    mode: NotificationMode::Disabled,
                    recipient: None,
                },
            },
        )?;
        store.add_website(project_id, "https://example.com")?;
    }

    let config_source: Arc<dyn ConfigSource> = store.clone();
    let monitor_store: Arc<dyn MonitorStore> = store.clone();
    let prober: Arc<dyn Prober> = Arc::new(HttpProber::new()?);
    let notifier: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new()?);

    // Create the scheduler; the poller performs the initial reconciliation
    // on its first (immediate) tick.
    let scheduler = Arc::new(Scheduler::new(
        config_source.clone(),
        monitor_store.clone(),
        prober,
        notifier,
    ));

    let poller = ConfigPoller::new(
        config_source.clone(),
        scheduler.clone(),
        Duration::from_secs(cfg.config_poll_secs),
    );
    poller.start();

    let aggregator = UptimeAggregator::new(
        config_source,
        monitor_store,
        Duration::from_secs(cfg.aggregate_secs),
        cfg.uptime_window_secs,
        cfg.retention,
    );
    aggregator.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    poller.stop().await;
    aggregator.stop().await;
    scheduler.shutdown().await;

    Ok(())
}
