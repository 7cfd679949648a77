//! Single check execution: guards, probe, recording, alert driving.

use chrono::Utc;

use super::{alerts, CheckContext};
use crate::db::{CheckRecord, MonitorTarget, PerformanceRecord};
use crate::probe::PROBE_TIMEOUT;

/// Run one check for `target`.
///
/// A task can fire after its website was deleted or its project disabled but
/// before reconciliation removes it, so the tick re-reads the current
/// configuration and silently skips when the guard fails. Past the guard,
/// the outcome is always recorded, success or failure, and no error escapes
/// the tick.
pub(crate) async fn run_check(ctx: &CheckContext, target: &MonitorTarget) {
    let snapshot = match ctx.config.fetch_config() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(
                website_id = target.website_id,
                error = %e,
                "skipping check: config read failed"
            );
            return;
        }
    };

    let Some(project) = snapshot.project_for_website(target.website_id) else {
        return;
    };
    if !project.monitoring_enabled() {
        return;
    }

    let time = Utc::now();
    let outcome = ctx.prober.probe(&target.url, PROBE_TIMEOUT).await;

    let check = CheckRecord {
        website_id: target.website_id,
        time,
        up: outcome.is_up(),
        latency_ms: outcome.latency_ms,
        status_code: outcome.status_code,
        failure: outcome.failure,
        response_bytes: outcome.response_bytes,
    };

    if let Err(e) = ctx.store.append_check(&check) {
        tracing::error!(website_id = target.website_id, error = %e, "failed to record check");
    }

    let metric = PerformanceRecord {
        website_id: target.website_id,
        time,
        latency_ms: outcome.latency_ms,
        status_code: outcome.status_code,
        response_bytes: outcome.response_bytes,
    };
    if let Err(e) = ctx.store.append_performance(&metric) {
        tracing::error!(
            website_id = target.website_id,
            error = %e,
            "failed to record performance sample"
        );
    }

    alerts::track(ctx, project, target, &check).await;
}
