//! Sequencer feed client
//!
//! Subscribes to a sequencer feed over WebSocket and republishes every
//! message on a broadcast hub. Each configured URL gets its own client; the
//! client reconnects until cancelled.

use crate::error::MonitorError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

/// Delay before reconnecting a dropped feed
pub const FEED_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Buffered feed messages per subscriber
const FEED_CHANNEL_CAPACITY: usize = 1024;

/// A sequenced transaction broadcast by the sequencer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FeedMessage {
    pub sequence_number: u64,
    /// Base64 encoded raw transaction
    pub transaction: String,
}

impl FeedMessage {
    pub fn new(sequence_number: u64, raw: &[u8]) -> Self {
        Self {
            sequence_number,
            transaction: STANDARD.encode(raw),
        }
    }

    pub fn decode_transaction(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.transaction)
    }
}

/// Hub shared by all feed clients and the inbox reader
pub fn feed_channel() -> broadcast::Sender<FeedMessage> {
    let (tx, _) = broadcast::channel(FEED_CHANNEL_CAPACITY);
    tx
}

/// WebSocket client for one sequencer feed
#[derive(Debug, Clone)]
pub struct FeedClient {
    url: String,
    timeout: Duration,
}

impl FeedClient {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Keep the feed connected until cancellation
    pub fn connect_in_background(
        self,
        cancel: CancellationToken,
        sink: broadcast::Sender<FeedMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = self.run_once(&sink) => match result {
                        Ok(()) => tracing::warn!(url = %self.url, "feed closed by sequencer"),
                        Err(e) => tracing::warn!(url = %self.url, "feed connection failed: {}", e),
                    }
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(FEED_RECONNECT_DELAY) => {}
                }
            }
            tracing::debug!(url = %self.url, "feed client stopped");
        })
    }

    async fn run_once(&self, sink: &broadcast::Sender<FeedMessage>) -> Result<(), MonitorError> {
        let (ws_stream, _) = tokio::time::timeout(self.timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| self.error("connect timed out"))?
            .map_err(|e| self.error(e))?;
        tracing::info!(url = %self.url, "Connected to sequencer feed");

        let (_, mut receiver) = ws_stream.split();
        while let Some(msg) = receiver.next().await {
            match msg.map_err(|e| self.error(e))? {
                Message::Text(text) => match serde_json::from_str::<FeedMessage>(&text) {
                    Ok(message) => {
                        // No subscribers yet is fine
                        let _ = sink.send(message);
                    }
                    Err(e) => tracing::warn!(url = %self.url, "malformed feed message: {}", e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok(())
    }

    fn error(&self, message: impl ToString) -> MonitorError {
        MonitorError::Feed {
            url: self.url.clone(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[test]
    fn test_message_payload() {
        let message = FeedMessage::new(3, b"raw-tx");
        let json = serde_json::to_string(&message).unwrap();
        let parsed: FeedMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sequence_number, 3);
        assert_eq!(parsed.decode_transaction().unwrap(), b"raw-tx");
    }

    #[tokio::test]
    async fn test_client_republishes_feed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text("not json".to_string())).await.unwrap();
            for seq in 0..2u64 {
                let text = serde_json::to_string(&FeedMessage::new(seq, &[seq as u8])).unwrap();
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.ok();
        });

        let hub = feed_channel();
        let mut rx = hub.subscribe();
        let cancel = CancellationToken::new();
        let handle = FeedClient::new(&format!("ws://{}", addr), Duration::from_secs(5))
            .connect_in_background(cancel.clone(), hub.clone());

        assert_eq!(rx.recv().await.unwrap().sequence_number, 0);
        assert_eq!(rx.recv().await.unwrap().sequence_number, 1);

        cancel.cancel();
        handle.await.unwrap();
    }
}
