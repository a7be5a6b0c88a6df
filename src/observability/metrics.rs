//! Prometheus metrics for the retention flusher.
//!
//! Every recording function is a no-op unless the `prometheus` feature is
//! compiled in and [`init_metrics`] installed a recorder.

#[cfg(feature = "prometheus")]
use metrics::{counter, gauge};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a tokio runtime; the HTTP listener runs as a
/// background task on it.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .install()?;

    tracing::info!(listen_addr = %config.listen_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Without the prometheus feature there is no exporter to install, so asking
/// for one is an error.
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.enabled {
        return Err(MetricsError::Setup(
            "built without the 'prometheus' feature".into(),
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record rows removed from a log table by one flush.
pub fn record_retention_deletion(table: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "retention_deletions_total",
            "table" => table.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (table, count);
    }
}

/// Record a finished flush.
///
/// # Arguments
/// * `result` - `"success"` or `"error"`
pub fn record_flush(result: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("retention_flush_total", "result" => result.to_string()).increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = result;
    }
}

/// Record a change (or renewal) of the retention mode.
pub fn record_mode_transition(transition: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "retention_mode_transitions_total",
            "transition" => transition.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = transition;
    }
}

/// Record the latest bounded backlog estimate.
pub fn record_backlog_estimate(estimate: u64) {
    #[cfg(feature = "prometheus")]
    {
        gauge!("retention_backlog_estimate").set(estimate as f64);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = estimate;
    }
}

/// Record a table compaction attempt.
pub fn record_compaction(table: &str, success: bool) {
    #[cfg(feature = "prometheus")]
    {
        let result = if success { "success" } else { "error" };
        counter!(
            "retention_compactions_total",
            "table" => table.to_string(),
            "result" => result
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (table, success);
    }
}

/// Error type for metrics initialization.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics exporter: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
