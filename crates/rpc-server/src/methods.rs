//! RPC Methods - JSON-RPC method handlers
//!
//! Transactions travel base64 encoded; transaction hashes are base58.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use l1_bridge::Pubkey;
use l2_batcher::{BatcherError, TransactionBatcher, TxDb};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// State shared by every RPC handler
pub struct AggregatorServer {
    batcher: Arc<dyn TransactionBatcher>,
    db: Arc<TxDb>,
    chain_id: u64,
    rollup: Pubkey,
}

impl AggregatorServer {
    pub fn new(
        batcher: Arc<dyn TransactionBatcher>,
        db: Arc<TxDb>,
        chain_id: u64,
        rollup: Pubkey,
    ) -> Self {
        Self {
            batcher,
            db,
            chain_id,
            rollup,
        }
    }

    /// Dispatch one JSON-RPC call
    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        tracing::debug!("RPC method called: {}", method);
        match method {
            "sendTransaction" => {
                let encoded = string_param(&params, 0, "transaction")?;
                let raw = BASE64
                    .decode(encoded)
                    .map_err(|_| RpcError::InvalidParams("Invalid base64 encoding".to_string()))?;
                let hash = self.batcher.send_transaction(raw).await?;
                Ok(json!(bs58::encode(hash).into_string()))
            }

            "getTransactionStatus" => {
                let encoded = string_param(&params, 0, "transaction hash")?;
                let hash: [u8; 32] = bs58::decode(encoded)
                    .into_vec()
                    .ok()
                    .and_then(|bytes| bytes.try_into().ok())
                    .ok_or_else(|| RpcError::InvalidParams("Invalid transaction hash".to_string()))?;
                let block = self
                    .db
                    .transaction_block(&hash)
                    .map_err(|e| RpcError::InternalError(e.to_string()))?;
                Ok(serde_json::to_value(TransactionStatus::from_block(block))?)
            }

            "getBlockHeight" => {
                let height = self
                    .db
                    .block_height()
                    .map_err(|e| RpcError::InternalError(e.to_string()))?;
                Ok(json!(height))
            }

            "getChainId" => Ok(json!(self.chain_id)),

            "getRollupAddress" => Ok(json!(self.rollup.to_string())),

            "getPendingCount" => Ok(json!(self.batcher.pending_count())),

            "getHealth" => Ok(json!("ok")),

            "getVersion" => Ok(json!({
                "l2-version": env!("CARGO_PKG_VERSION"),
                "batcher": self.batcher.name(),
            })),

            _ => Err(RpcError::MethodNotFound(method.to_string())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
}

impl TransactionStatus {
    fn from_block(block: Option<u64>) -> Self {
        match block {
            Some(block) => Self {
                status: "included",
                block: Some(block),
            },
            None => Self {
                status: "unknown",
                block: None,
            },
        }
    }
}

fn string_param<'a>(params: &'a Value, index: usize, name: &str) -> Result<&'a str, RpcError> {
    params
        .get(index)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::InvalidParams(format!("Missing {}", name)))
}

// ============ Error Types ============

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Transaction rejected: {0}")]
    Batcher(#[from] BatcherError),
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// JSON-RPC error code
    pub fn code(&self) -> i32 {
        match self {
            RpcError::InvalidParams(_) => -32602,
            RpcError::MethodNotFound(_) => -32601,
            RpcError::Batcher(_) => -32000,
            _ => -32603,
        }
    }
}

/// Build a JSON-RPC response envelope
pub fn response(id: Value, result: Result<Value, RpcError>) -> Value {
    match result {
        Ok(value) => json!({ "jsonrpc": "2.0", "id": id, "result": value }),
        Err(e) => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": e.code(), "message": e.to_string() }
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use l2_batcher::TXDB_POLL_INTERVAL;
    use l2_monitor::{tx_hash, BlockSource, Monitor};
    use tempfile::{tempdir, TempDir};
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    /// Batcher that seals every transaction straight into the core
    pub(crate) struct DirectBatcher {
        pub(crate) core: Arc<l2_monitor::ExecutionCore>,
    }

    #[async_trait]
    impl TransactionBatcher for DirectBatcher {
        fn name(&self) -> &'static str {
            "direct"
        }

        async fn send_transaction(&self, raw: Vec<u8>) -> Result<[u8; 32], BatcherError> {
            if raw.is_empty() {
                return Err(BatcherError::EmptyTransaction);
            }
            let hash = tx_hash(&raw);
            self.core.append_block(vec![raw], BlockSource::Sequencer, None)?;
            Ok(hash)
        }

        fn pending_count(&self) -> usize {
            0
        }

        fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<Result<(), BatcherError>> {
            tokio::spawn(async move {
                cancel.cancelled().await;
                Ok(())
            })
        }
    }

    pub(crate) fn test_server() -> (TempDir, Monitor, Arc<AggregatorServer>) {
        let dir = tempdir().unwrap();
        let machine = dir.path().join("machine.bin");
        std::fs::write(&machine, b"machine").unwrap();
        let monitor = Monitor::open(dir.path().join("db"), &machine).unwrap();
        let (db, _errors) = TxDb::open(
            &CancellationToken::new(),
            monitor.core(),
            monitor.storage().node_store(),
            TXDB_POLL_INTERVAL,
        )
        .unwrap();
        let server = Arc::new(AggregatorServer::new(
            Arc::new(DirectBatcher {
                core: monitor.core(),
            }),
            db,
            412346,
            Pubkey::new_from_array([1u8; 32]),
        ));
        (dir, monitor, server)
    }

    #[tokio::test]
    async fn test_send_then_status() {
        let (_dir, _monitor, server) = test_server();

        let hash = server
            .dispatch("sendTransaction", json!([BASE64.encode(b"transfer")]))
            .await
            .unwrap();
        assert_eq!(hash, json!(bs58::encode(tx_hash(b"transfer")).into_string()));

        // Not indexed until the transaction database catches up
        let status = server
            .dispatch("getTransactionStatus", json!([hash]))
            .await
            .unwrap();
        assert!(status["status"] == "unknown" || status["status"] == "included");
    }

    #[tokio::test]
    async fn test_static_methods() {
        let (_dir, _monitor, server) = test_server();

        assert_eq!(server.dispatch("getChainId", Value::Null).await.unwrap(), json!(412346));
        assert_eq!(
            server.dispatch("getRollupAddress", Value::Null).await.unwrap(),
            json!(Pubkey::new_from_array([1u8; 32]).to_string())
        );
        assert_eq!(server.dispatch("getPendingCount", Value::Null).await.unwrap(), json!(0));
        assert_eq!(server.dispatch("getHealth", Value::Null).await.unwrap(), json!("ok"));
        assert_eq!(
            server.dispatch("getVersion", Value::Null).await.unwrap()["batcher"],
            json!("direct")
        );
    }

    #[tokio::test]
    async fn test_errors_map_to_codes() {
        let (_dir, _monitor, server) = test_server();

        let err = server.dispatch("getSlot", Value::Null).await.unwrap_err();
        assert_eq!(err.code(), -32601);

        let err = server
            .dispatch("sendTransaction", json!(["%%%"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);

        let err = server
            .dispatch("sendTransaction", json!([""]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32000);

        let err = server
            .dispatch("getTransactionStatus", json!(["short"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);

        let body = response(json!(7), Err(RpcError::MethodNotFound("x".to_string())));
        assert_eq!(body["error"]["code"], json!(-32601));
        assert_eq!(body["id"], json!(7));
    }
}
