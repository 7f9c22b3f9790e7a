//! RPC Server - public JSON-RPC and WebSocket endpoints
//!
//! Both transports share one method table:
//! - sendTransaction, getTransactionStatus, getPendingCount
//! - getBlockHeight, getChainId, getRollupAddress
//! - getHealth, getVersion

pub mod http_server;
pub mod methods;
pub mod ws_server;

pub use http_server::HttpRpcServer;
pub use methods::{AggregatorServer, RpcError};
pub use ws_server::WebSocketServer;

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// HTTP and WebSocket servers over one aggregator
pub struct PublicServer {
    http: HttpRpcServer,
    ws: WebSocketServer,
}

/// Build the public servers for an aggregator
pub fn generate_server(server: Arc<AggregatorServer>) -> PublicServer {
    PublicServer {
        http: HttpRpcServer::new(server.clone()),
        ws: WebSocketServer::new(server),
    }
}

/// Serve RPC and WebSocket until one fails or `cancel` fires
pub async fn launch_public_server(
    cancel: CancellationToken,
    server: PublicServer,
    rpc_addr: &str,
    rpc_port: u16,
    ws_addr: &str,
    ws_port: u16,
) -> Result<(), RpcError> {
    let rpc_listener = bind(rpc_addr, rpc_port).await?;
    let ws_listener = bind(ws_addr, ws_port).await?;

    tokio::select! {
        result = server.http.serve(rpc_listener, cancel.clone()) => result,
        result = server.ws.serve(ws_listener, cancel.clone()) => result,
    }
}

async fn bind(addr: &str, port: u16) -> Result<TcpListener, RpcError> {
    let addr = format!("{}:{}", addr, port);
    TcpListener::bind(&addr)
        .await
        .map_err(|source| RpcError::Bind { addr, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::tests::test_server;

    #[tokio::test]
    async fn test_launch_reports_bind_failure() {
        let (_dir, _monitor, server) = test_server();
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let result = launch_public_server(
            CancellationToken::new(),
            generate_server(server),
            "127.0.0.1",
            0,
            "127.0.0.1",
            port,
        )
        .await;
        assert!(matches!(result, Err(RpcError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_launch_stops_on_cancel() {
        let (_dir, _monitor, server) = test_server();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(launch_public_server(
            cancel.clone(),
            generate_server(server),
            "127.0.0.1",
            0,
            "127.0.0.1",
            0,
        ));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
