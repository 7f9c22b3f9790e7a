//! Diagnostic server
//!
//! Only started when `debug.enable` is set. Serves the configuration the
//! node was launched with.

use crate::config::NodeConfig;
use axum::{extract::State, routing::get, Json, Router};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct DebugState {
    config: Arc<Value>,
    started_at: i64,
}

pub struct DebugServer {
    addr: String,
    state: DebugState,
}

impl DebugServer {
    pub fn new(addr: &str, config: &NodeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            addr: addr.to_string(),
            state: DebugState {
                config: Arc::new(serde_json::to_value(config)?),
                started_at: chrono::Utc::now().timestamp(),
            },
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/debug/config", get(handle_config))
            .route("/debug/started", get(handle_started))
            .with_state(self.state.clone())
    }

    /// Serve on an already bound listener until cancellation
    pub async fn serve(self, listener: TcpListener, cancel: CancellationToken) -> anyhow::Result<()> {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;
        Ok(())
    }

    /// Bind and serve in the background; failures are logged, never fatal
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let listener = match TcpListener::bind(&self.addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::warn!(addr = %self.addr, "debug server failed to bind: {}", e);
                    return;
                }
            };
            tracing::info!("Debug server listening on {}", self.addr);
            if let Err(e) = self.serve(listener, cancel).await {
                tracing::warn!("debug server stopped: {}", e);
            }
        })
    }
}

async fn handle_config(State(state): State<DebugState>) -> Json<Value> {
    Json(state.config.as_ref().clone())
}

async fn handle_started(State(state): State<DebugState>) -> Json<Value> {
    Json(serde_json::json!({ "started_at": state.started_at }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_config() {
        let mut config = NodeConfig::default();
        config.node.chain_id = 421;
        let server = DebugServer::new("127.0.0.1:0", &config).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(server.serve(listener, cancel.clone()));

        let response = get(addr, "/debug/config").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"chain_id\":421"));

        let response = get(addr, "/debug/missing").await;
        assert!(response.starts_with("HTTP/1.1 404"));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
