//! Counters for webhook handling, board fetches, and refresh runs.
//!
//! Without an installed recorder these are no-ops, which is what tests get.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{Result, SyncError};

/// Installs the global Prometheus recorder; the handle renders `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| SyncError::Config(format!("Failed to install metrics recorder: {e}")))
}

pub fn record_action(kind: &'static str, outcome: &'static str) {
    counter!("recipe_sync_actions_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_fetch(outcome: &'static str, duration_secs: f64) {
    counter!("recipe_sync_fetch_total", "outcome" => outcome).increment(1);
    histogram!("recipe_sync_fetch_duration_seconds").record(duration_secs);
}

pub fn record_refresh(outcome: &'static str) {
    counter!("recipe_sync_refresh_total", "outcome" => outcome).increment(1);
}
