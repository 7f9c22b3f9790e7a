//! Forwarder - relays transactions to the primary node

use crate::batcher::TransactionBatcher;
use crate::error::BatcherError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use l2_monitor::tx_hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Timeout for a forwarded request
pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ForwarderBatcher {
    target_url: String,
    client: HttpClient,
    forwarded: AtomicU64,
}

impl ForwarderBatcher {
    pub fn new(target_url: &str) -> Result<Self, BatcherError> {
        let client = HttpClientBuilder::default()
            .request_timeout(FORWARD_TIMEOUT)
            .build(target_url)
            .map_err(|e| BatcherError::Forward {
                url: target_url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            target_url: target_url.to_string(),
            client,
            forwarded: AtomicU64::new(0),
        })
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Transactions forwarded since startup
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TransactionBatcher for ForwarderBatcher {
    fn name(&self) -> &'static str {
        "forwarder"
    }

    async fn send_transaction(&self, raw: Vec<u8>) -> Result<[u8; 32], BatcherError> {
        if raw.is_empty() {
            return Err(BatcherError::EmptyTransaction);
        }
        let hash = tx_hash(&raw);

        self.client
            .request::<serde_json::Value, _>("sendTransaction", rpc_params![STANDARD.encode(&raw)])
            .await
            .map_err(|e| BatcherError::Forward {
                url: self.target_url.clone(),
                message: e.to_string(),
            })?;

        self.forwarded.fetch_add(1, Ordering::Relaxed);
        Ok(hash)
    }

    fn pending_count(&self) -> usize {
        0
    }

    fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<Result<(), BatcherError>> {
        tokio::spawn(async move {
            tracing::info!(target_url = %self.target_url, "Forwarder started");
            cancel.cancelled().await;
            tracing::info!(forwarded = self.forwarded(), "Forwarder stopped");
            Ok(())
        })
    }
}
