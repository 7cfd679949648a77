//! Alert state tracking.
//!
//! Two states per website: resolved (no open alert) and open (exactly one).
//! A down transition raises one alert and dispatches one notification; a
//! continuing outage does neither; recovery closes the open alert.

use super::CheckContext;
use crate::db::{CheckRecord, MonitorTarget, NotificationMode, ProjectConfig};

/// Advance the website's alert state with a fresh check outcome.
///
/// Current state is re-read from the store on every call rather than cached,
/// so alert rows repaired out-of-band are honored on the next tick.
pub(crate) async fn track(
    ctx: &CheckContext,
    project: &ProjectConfig,
    target: &MonitorTarget,
    check: &CheckRecord,
) {
    let open = match ctx.store.find_open_alert(check.website_id) {
        Ok(open) => open,
        Err(e) => {
            tracing::error!(website_id = check.website_id, error = %e, "alert lookup failed");
            return;
        }
    };

    match (check.up, open) {
        (true, Some(alert)) => match ctx.store.resolve_alert(alert.id) {
            Ok(()) => {
                tracing::info!(
                    website_id = check.website_id,
                    alert_id = alert.id,
                    "alert resolved"
                );
            }
            Err(e) => {
                tracing::error!(
                    website_id = check.website_id,
                    alert_id = alert.id,
                    error = %e,
                    "failed to resolve alert"
                );
            }
        },
        (true, None) => {}
        (false, Some(_)) => {
            // Already alerted for this outage.
        }
        (false, None) => {
            let message = down_message(target, check);
            let alert = match ctx.store.create_alert(check.website_id, &message) {
                Ok(alert) => alert,
                Err(e) => {
                    tracing::error!(
                        website_id = check.website_id,
                        error = %e,
                        "failed to raise alert"
                    );
                    return;
                }
            };
            tracing::warn!(
                website_id = check.website_id,
                alert_id = alert.id,
                message = %message,
                "alert raised"
            );

            dispatch(ctx, project, check.website_id, &message).await;
        }
    }
}

fn down_message(target: &MonitorTarget, check: &CheckRecord) -> String {
    match (check.failure, check.status_code) {
        (Some(kind), Some(status)) => {
            format!("{} is down: {} (status {})", target.url, kind, status)
        }
        (Some(kind), None) => format!("{} is down: {}", target.url, kind),
        _ => format!("{} is down", target.url),
    }
}

/// Send the alert through the project's notification settings. Delivery
/// failure is logged and dropped; the raised alert already captured the
/// outage.
async fn dispatch(ctx: &CheckContext, project: &ProjectConfig, website_id: i64, message: &str) {
    if project.notification.mode == NotificationMode::Disabled {
        return;
    }

    let Some(recipient) = project.notification.recipient.as_deref() else {
        tracing::warn!(
            project_id = project.id,
            website_id,
            "no notification recipient configured"
        );
        return;
    };

    if let Err(e) = ctx.notifier.notify(website_id, message, recipient).await {
        tracing::error!(website_id, error = %e, "notification dispatch failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MonitorStore;
    use crate::probe::FailureKind;
    use crate::scheduler::tick::run_check;
    use crate::testutil::*;
    use std::sync::Arc;

    fn target() -> MonitorTarget {
        MonitorTarget {
            website_id: 1,
            url: "https://site-1.example".to_string(),
            interval_seconds: 60,
        }
    }

    fn notifying_config() -> crate::db::MonitoringConfig {
        let mut config = one_site_config(None, 60, 1, "https://site-1.example");
        config.projects[0].notification.recipient =
            Some("https://hooks.example/alerts".to_string());
        config
    }

    async fn run_sequence(outcomes: &[Option<FailureKind>]) -> (Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = MemoryStore::new(notifying_config());
        let prober = Arc::new(StaticProber::up(10));
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = context(&store, &prober, &notifier);

        for failure in outcomes {
            match failure {
                None => prober.set_up(10),
                Some(kind) => prober.set_down(*kind, Some(503)),
            }
            run_check(&ctx, &target()).await;
        }

        (store, notifier)
    }

    #[tokio::test]
    async fn test_sustained_outage_raises_exactly_one_alert() {
        let down = Some(FailureKind::HttpError);
        let (store, notifier) = run_sequence(&[down, down, down]).await;

        let alerts = store.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].is_open());
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recovery_resolves_without_new_alerts_or_notifications() {
        let down = Some(FailureKind::HttpError);
        let (store, notifier) = run_sequence(&[down, down, down, None]).await;

        let alerts = store.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(!alerts[0].is_open());
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_each_outage_cycle_raises_one_alert() {
        let down = Some(FailureKind::Timeout);
        let (store, notifier) =
            run_sequence(&[down, None, down, down, None, down]).await;

        let alerts = store.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 3);
        assert_eq!(alerts.iter().filter(|a| a.is_open()).count(), 1);
        assert_eq!(notifier.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_healthy_sequence_touches_nothing() {
        let (store, notifier) = run_sequence(&[None, None, None]).await;

        assert!(store.alerts.lock().unwrap().is_empty());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_alert_message_names_url_and_failure() {
        let (store, notifier) = run_sequence(&[Some(FailureKind::HttpError)]).await;

        let alerts = store.alerts.lock().unwrap();
        assert!(alerts[0].message.contains("https://site-1.example"));
        assert!(alerts[0].message.contains("http_error"));
        assert!(alerts[0].message.contains("503"));

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent[0].0, 1);
        assert_eq!(sent[0].2, "https://hooks.example/alerts");
    }

    #[tokio::test]
    async fn test_disabled_notification_mode_still_raises_the_alert() {
        let mut config = notifying_config();
        config.projects[0].notification.mode = NotificationMode::Disabled;

        let store = MemoryStore::new(config);
        let prober = Arc::new(StaticProber::down(FailureKind::HttpError, Some(503)));
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = context(&store, &prober, &notifier);

        run_check(&ctx, &target()).await;

        assert_eq!(store.alerts.lock().unwrap().len(), 1);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_recipient_drops_the_notification_only() {
        let store = MemoryStore::new(one_site_config(None, 60, 1, "https://site-1.example"));
        let prober = Arc::new(StaticProber::down(FailureKind::HttpError, Some(503)));
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = context(&store, &prober, &notifier);

        run_check(&ctx, &target()).await;

        assert_eq!(store.alerts.lock().unwrap().len(), 1);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_externally_resolved_alert_reopens_on_next_failure() {
        let store = MemoryStore::new(notifying_config());
        let prober = Arc::new(StaticProber::down(FailureKind::HttpError, Some(503)));
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = context(&store, &prober, &notifier);

        run_check(&ctx, &target()).await;

        // Someone closes the alert out-of-band while the site is still down.
        {
            let alerts = store.alerts.lock().unwrap();
            let id = alerts[0].id;
            drop(alerts);
            store.resolve_alert(id).unwrap();
        }

        run_check(&ctx, &target()).await;

        let alerts = store.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts.iter().filter(|a| a.is_open()).count(), 1);
    }
}
