//! End-to-end node startup against a mock L1

use axum::{routing::post, Json, Router};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use l1_bridge::Wallet;
use l2_node::{run_node, NodeConfig, NodeContext, Shutdown};
use node_health::MetricsConfig;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const ROLLUP: &str = "11111111111111111111111111111112";
const BRIDGE_UTILS: &str = "SysvarC1ock11111111111111111111111111111111";

/// Minimal L1 answering `getSlot` and `getBalance`
async fn spawn_l1(balance: u64) -> SocketAddr {
    async fn handle(balance: u64, Json(request): Json<Value>) -> Json<Value> {
        let result = match request["method"].as_str() {
            Some("getSlot") => json!(5),
            Some("getBalance") => json!({ "context": { "slot": 5 }, "value": balance }),
            _ => Value::Null,
        };
        Json(json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }))
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/", post(move |body| handle(balance, body)));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn node_config(dir: &Path, l1_url: &str, node_type: &str, rpc_port: u16, ws_port: u16) -> NodeConfig {
    let machine = dir.join("machine.bin");
    std::fs::write(&machine, b"rollup machine").unwrap();

    let mut config = NodeConfig::default();
    config.persistent.chain = dir.join("chain").display().to_string();
    config.l1.url = l1_url.to_string();
    config.rollup.address = ROLLUP.to_string();
    config.bridge_utils_address = BRIDGE_UTILS.to_string();
    config.rollup.machine.filename = machine.display().to_string();
    config.node.chain_id = 42;
    config.node.node_type = node_type.to_string();
    config.node.forwarder.target = "http://127.0.0.1:1".to_string();
    config.node.aggregator.max_batch_time = 1;
    config.node.rpc.addr = "127.0.0.1".to_string();
    config.node.rpc.port = rpc_port;
    config.node.ws.addr = "127.0.0.1".to_string();
    config.node.ws.port = ws_port;
    config
}

fn context() -> NodeContext {
    let mut context = NodeContext::new("l2-node", MetricsConfig::new("test"));
    context.retry_delay = Duration::from_millis(50);
    context.balance_poll = Duration::from_millis(50);
    context
}

fn write_keystore(dir: &Path) -> Wallet {
    let wallet = Wallet::from_secret([11u8; 32]);
    let wallets = dir.join("chain").join("wallets");
    std::fs::create_dir_all(&wallets).unwrap();
    std::fs::write(
        wallets.join("keypair.json"),
        serde_json::to_string(&wallet.to_keypair_bytes().to_vec()).unwrap(),
    )
    .unwrap();
    wallet
}

/// Poll the node's RPC until it answers
async fn wait_for_rpc(port: u16) -> HttpClient {
    let client = HttpClientBuilder::default()
        .build(format!("http://127.0.0.1:{}", port))
        .unwrap();
    for _ in 0..100 {
        if client
            .request::<u64, _>("getChainId", rpc_params![])
            .await
            .is_ok()
        {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("node RPC never came up on port {}", port);
}

#[tokio::test]
async fn test_invalid_config_starts_nothing() {
    let dir = tempdir().unwrap();
    let mut config = node_config(dir.path(), "http://127.0.0.1:1", "forwarder", 0, 0);
    config.node.forwarder.target.clear();

    let cancel = CancellationToken::new();
    let shutdown = run_node(cancel.clone(), config, context()).await.unwrap();

    assert_eq!(shutdown, Shutdown::InvalidConfig);
    assert!(!dir.path().join("chain").exists());
    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn test_forwarder_runs_until_cancelled() {
    let dir = tempdir().unwrap();
    let l1 = spawn_l1(0).await;
    let rpc_port = free_port().await;
    let ws_port = free_port().await;
    let config = node_config(dir.path(), &format!("http://{}", l1), "forwarder", rpc_port, ws_port);

    let cancel = CancellationToken::new();
    let node = tokio::spawn(run_node(cancel.clone(), config, context()));

    let client = wait_for_rpc(rpc_port).await;
    let chain_id: u64 = client.request("getChainId", rpc_params![]).await.unwrap();
    assert_eq!(chain_id, 42);
    let version: Value = client.request("getVersion", rpc_params![]).await.unwrap();
    assert_eq!(version["batcher"], "forwarder");

    cancel.cancel();
    let shutdown = node.await.unwrap().unwrap();
    assert_eq!(shutdown, Shutdown::Cancelled);
    assert!(dir.path().join("chain").join("db").exists());
}

#[tokio::test]
async fn test_sequencer_sequences_transactions() {
    let dir = tempdir().unwrap();
    write_keystore(dir.path());
    let l1 = spawn_l1(1_000_000).await;
    let rpc_port = free_port().await;
    let ws_port = free_port().await;
    let config = node_config(dir.path(), &format!("http://{}", l1), "sequencer", rpc_port, ws_port);

    let cancel = CancellationToken::new();
    let node = tokio::spawn(run_node(cancel.clone(), config, context()));

    let client = wait_for_rpc(rpc_port).await;
    let version: Value = client.request("getVersion", rpc_params![]).await.unwrap();
    assert_eq!(version["batcher"], "sequencer");

    let _hash: String = client
        .request("sendTransaction", rpc_params!["dHJhbnNmZXI="])
        .await
        .unwrap();

    let mut height = 0;
    for _ in 0..60 {
        height = client.request("getBlockHeight", rpc_params![]).await.unwrap();
        if height > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(height >= 1);

    cancel.cancel();
    assert_eq!(node.await.unwrap().unwrap(), Shutdown::Cancelled);
}

#[tokio::test]
async fn test_cancel_while_l1_unreachable() {
    let dir = tempdir().unwrap();
    let config = node_config(dir.path(), "http://127.0.0.1:1", "forwarder", 0, 0);

    let cancel = CancellationToken::new();
    let node = tokio::spawn(run_node(cancel.clone(), config, context()));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!node.is_finished());
    cancel.cancel();

    let shutdown = tokio::time::timeout(Duration::from_secs(5), node)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(shutdown, Shutdown::Cancelled);
}

#[tokio::test]
async fn test_missing_keystore_is_fatal() {
    let dir = tempdir().unwrap();
    let l1 = spawn_l1(1_000_000).await;
    let mut config = node_config(dir.path(), &format!("http://{}", l1), "aggregator", 0, 0);
    config.node.aggregator.inbox_address = ROLLUP.to_string();

    let cancel = CancellationToken::new();
    let err = run_node(cancel.clone(), config, context())
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("keystore"));
    // releases ran, cancelling every background task
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn test_rpc_bind_failure_is_fatal() {
    let dir = tempdir().unwrap();
    let l1 = spawn_l1(0).await;
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rpc_port = taken.local_addr().unwrap().port();
    let ws_port = free_port().await;
    let config = node_config(dir.path(), &format!("http://{}", l1), "forwarder", rpc_port, ws_port);

    let cancel = CancellationToken::new();
    let err = tokio::time::timeout(Duration::from_secs(10), run_node(cancel.clone(), config, context()))
        .await
        .unwrap()
        .unwrap_err();
    assert!(format!("{:#}", err).contains("public server failed"));
    assert!(cancel.is_cancelled());
    drop(taken);
}
