//! Prometheus metrics configuration
//!
//! Metric names are prefixed with the configured healthcheck prefix. When no
//! recorder is installed the `metrics` macros are no-ops.

use metrics::gauge;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// How often system metrics are refreshed
const SYSTEM_METRICS_INTERVAL: Duration = Duration::from_secs(15);

/// Metrics configuration shared by node subsystems
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    prefix: String,
    handle: Option<PrometheusHandle>,
}

impl MetricsConfig {
    /// Metrics without an exporter
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            handle: None,
        }
    }

    /// Install the global Prometheus recorder
    ///
    /// Can only succeed once per process.
    pub fn with_prometheus(prefix: &str) -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        Ok(Self {
            prefix: prefix.to_string(),
            handle: Some(handle),
        })
    }

    /// Handle for rendering `/metrics`
    pub fn handle(&self) -> Option<PrometheusHandle> {
        self.handle.clone()
    }

    /// Fully qualified metric name
    pub fn name(&self, metric: &str) -> String {
        if self.prefix.is_empty() {
            metric.to_string()
        } else {
            format!("{}_{}", self.prefix, metric)
        }
    }

    /// Refresh process uptime until cancellation
    pub fn register_system_metrics(&self, cancel: CancellationToken) {
        let uptime = gauge!(self.name("uptime_seconds"));
        let started = Instant::now();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SYSTEM_METRICS_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => uptime.set(started.elapsed().as_secs_f64()),
                }
            }
        });
    }

    /// Node identity as an info gauge
    pub fn register_static_metrics(&self, node_type: &str, chain_id: u64) {
        gauge!(
            self.name("node_info"),
            "node_type" => node_type.to_string(),
            "chain_id" => chain_id.to_string(),
            "version" => env!("CARGO_PKG_VERSION")
        )
        .set(1.0);
    }
}
