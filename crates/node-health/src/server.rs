//! Health-check HTTP server
//!
//! Collects configuration events until [`HealthEvent::Init`], then binds the
//! advertised `healthcheckRPC` address when the check is enabled. Status
//! events keep flowing into the shared [`HealthState`] after startup.

use crate::event::{HealthEvent, HealthValue, HEALTHCHECK_ENABLE, HEALTHCHECK_RPC};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Last reported status of a component
#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Unix timestamp (seconds) of the report
    pub updated_at: i64,
}

/// Snapshot served on `/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub config: BTreeMap<String, HealthValue>,
    pub status: BTreeMap<String, StatusEntry>,
}

/// Aggregated health state
#[derive(Debug, Default)]
pub struct HealthState {
    config: DashMap<String, HealthValue>,
    status: DashMap<String, StatusEntry>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an event into the state
    pub fn apply(&self, event: HealthEvent) {
        match event {
            HealthEvent::Config { var, value } => {
                self.config.insert(var, value);
            }
            HealthEvent::Status {
                component,
                healthy,
                detail,
            } => {
                if !healthy {
                    tracing::warn!(component = %component, detail = ?detail, "component reported unhealthy");
                }
                self.status.insert(
                    component,
                    StatusEntry {
                        healthy,
                        detail,
                        updated_at: chrono::Utc::now().timestamp(),
                    },
                );
            }
            HealthEvent::Init => {}
        }
    }

    pub fn config_bool(&self, var: &str) -> Option<bool> {
        self.config.get(var).and_then(|v| v.as_bool())
    }

    pub fn config_str(&self, var: &str) -> Option<String> {
        self.config
            .get(var)
            .and_then(|v| v.as_str().map(String::from))
    }

    /// Healthy unless some component reported otherwise
    pub fn is_healthy(&self) -> bool {
        self.status.iter().all(|entry| entry.healthy)
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            healthy: self.is_healthy(),
            config: self
                .config
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            status: self
                .status
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
        }
    }
}

#[derive(Clone)]
struct ServerState {
    health: Arc<HealthState>,
    metrics: Option<PrometheusHandle>,
}

/// Build the health-check router
pub fn router(health: Arc<HealthState>, metrics: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/", get(handle_health))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .with_state(ServerState { health, metrics })
}

async fn handle_health(State(state): State<ServerState>) -> impl IntoResponse {
    let report = state.health.report();
    let code = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

async fn handle_metrics(State(state): State<ServerState>) -> impl IntoResponse {
    match state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

/// Run the health-check server until cancellation
pub async fn start_node_health_check(
    cancel: CancellationToken,
    mut events: mpsc::Receiver<HealthEvent>,
    metrics: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    let health = Arc::new(HealthState::new());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            event = events.recv() => match event {
                Some(HealthEvent::Init) => break,
                Some(event) => health.apply(event),
                None => return Ok(()),
            }
        }
    }

    let consumer = health.clone();
    let consumer_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = consumer_cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => consumer.apply(event),
                    None => break,
                }
            }
        }
    });

    if !health.config_bool(HEALTHCHECK_ENABLE).unwrap_or(false) {
        tracing::info!("health check server disabled");
        return Ok(());
    }

    let addr = health
        .config_str(HEALTHCHECK_RPC)
        .ok_or_else(|| anyhow::anyhow!("missing {} configuration", HEALTHCHECK_RPC))?;
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Health check server listening on {}", addr);

    axum::serve(listener, router(health, metrics))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::health_channel;

    #[test]
    fn test_unhealthy_status_flips_report() {
        let state = HealthState::new();
        state.apply(HealthEvent::config_bool(HEALTHCHECK_ENABLE, true));
        state.apply(HealthEvent::status("inboxReader", true, None));
        assert!(state.report().healthy);

        state.apply(HealthEvent::status(
            "lockout",
            false,
            Some("redis unreachable".to_string()),
        ));
        let report = state.report();
        assert!(!report.healthy);
        assert_eq!(report.config.get(HEALTHCHECK_ENABLE), Some(&HealthValue::Bool(true)));
        assert_eq!(report.status["lockout"].detail.as_deref(), Some("redis unreachable"));
    }

    #[tokio::test]
    async fn test_disabled_server_returns_after_init() {
        let (sink, rx) = health_channel(8);
        sink.publish(HealthEvent::config_bool(HEALTHCHECK_ENABLE, false));
        sink.publish(HealthEvent::Init);

        let cancel = CancellationToken::new();
        start_node_health_check(cancel.clone(), rx, None).await.unwrap();
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_cancel_before_init() {
        let (_sink, rx) = health_channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        start_node_health_check(cancel, rx, None).await.unwrap();
    }
}
