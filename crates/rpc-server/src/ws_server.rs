//! WebSocket Server
//!
//! Accepts the same JSON-RPC calls as the HTTP endpoint, one request per
//! text frame.

use crate::http_server::JsonRpcRequest;
use crate::methods::{response, AggregatorServer, RpcError};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

/// WebSocket Server
pub struct WebSocketServer {
    server: Arc<AggregatorServer>,
}

impl WebSocketServer {
    pub fn new(server: Arc<AggregatorServer>) -> Self {
        Self { server }
    }

    /// Accept connections until cancellation
    pub async fn serve(
        self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), RpcError> {
        tracing::info!("WebSocket server listening on {}", listener.local_addr()?);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                accepted = listener.accept() => accepted?,
            };

            let server = self.server.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, server, cancel).await {
                    tracing::warn!("WebSocket connection error from {}: {}", peer_addr, e);
                }
            });
        }
    }
}

/// Handle a single WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    server: Arc<AggregatorServer>,
    cancel: CancellationToken,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = ws_receiver.next() => match msg {
                Some(msg) => msg?,
                None => break,
            },
        };

        let reply = match msg {
            Message::Text(text) => match serde_json::from_str::<JsonRpcRequest>(&text) {
                Ok(request) => {
                    let result = server.dispatch(&request.method, request.params).await;
                    response(request.id, result)
                }
                Err(e) => json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": { "code": -32700, "message": format!("Parse error: {}", e) }
                }),
            },
            Message::Close(_) => break,
            _ => continue,
        };
        ws_sender.send(Message::Text(reply.to_string())).await?;
    }

    Ok(())
}
