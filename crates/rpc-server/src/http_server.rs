//! HTTP JSON-RPC Server

use crate::methods::{response, AggregatorServer, RpcError};
use axum::{
    extract::State,
    http::{header, Method},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

/// JSON-RPC request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// HTTP RPC Server
pub struct HttpRpcServer {
    server: Arc<AggregatorServer>,
}

impl HttpRpcServer {
    pub fn new(server: Arc<AggregatorServer>) -> Self {
        Self { server }
    }

    /// Create the Axum router
    pub fn router(&self) -> Router {
        // Browser clients call the node directly
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

        Router::new()
            .route("/", post(handle_rpc))
            .layer(cors)
            .with_state(self.server.clone())
    }

    /// Serve until cancellation
    pub async fn serve(
        self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), RpcError> {
        tracing::info!("HTTP RPC server listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;
        Ok(())
    }
}

async fn handle_rpc(
    State(server): State<Arc<AggregatorServer>>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<Value> {
    let result = server.dispatch(&request.method, request.params).await;
    if let Err(e) = &result {
        tracing::debug!(method = %request.method, "RPC call failed: {}", e);
    }
    Json(response(request.id, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::tests::test_server;
    use jsonrpsee::core::client::ClientT;
    use jsonrpsee::http_client::HttpClientBuilder;
    use jsonrpsee::rpc_params;

    #[tokio::test]
    async fn test_serves_json_rpc() {
        let (_dir, _monitor, server) = test_server();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(HttpRpcServer::new(server).serve(listener, cancel.clone()));

        let client = HttpClientBuilder::default().build(&url).unwrap();
        let chain_id: u64 = client.request("getChainId", rpc_params![]).await.unwrap();
        assert_eq!(chain_id, 412346);
        assert!(client
            .request::<Value, _>("getSlot", rpc_params![])
            .await
            .is_err());

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
