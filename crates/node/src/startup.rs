//! Node startup
//!
//! Brings subsystems up in a fixed order, each one assuming the previous ones
//! are live, then hands the running node to the [`Supervisor`].

use crate::config::NodeConfig;
use crate::debug::DebugServer;
use crate::health::publish_health_config;
use crate::lockout::{construct_batcher, NodeBatcherFactory};
use crate::mode::resolve_batcher_mode;
use crate::retry::{retry_until_ready, RetryError, RETRY_DELAY};
use crate::supervisor::{ReleaseStack, Supervisor, Termination};
use crate::validate::{usage, validate, ConfigError};
use anyhow::Context;
use l1_bridge::{L1Client, RpcL1Client, BALANCE_POLL_INTERVAL};
use l2_batcher::{TransactionBatcher, TxDb, TXDB_POLL_INTERVAL};
use l2_monitor::{feed_channel, FeedClient, FeedMessage, Monitor};
use node_health::{health_channel, start_node_health_check, MetricsConfig, LARGE_CHANNEL_BUFFER};
use rpc_server::{generate_server, launch_public_server, AggregatorServer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Capacity of the batcher and server fatal error channel
const FATAL_ERROR_BUFFER: usize = 4;

/// How the node stopped without a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Configuration was rejected; nothing was started
    InvalidConfig,
    /// The cancellation token fired
    Cancelled,
}

/// Process-level dependencies handed to [`run_node`]
pub struct NodeContext {
    /// Name shown in usage text
    pub program: String,
    pub metrics: MetricsConfig,
    /// Diagnostic server, when enabled
    pub debug: Option<DebugServer>,
    pub retry_delay: Duration,
    pub balance_poll: Duration,
}

impl NodeContext {
    pub fn new(program: &str, metrics: MetricsConfig) -> Self {
        Self {
            program: program.to_string(),
            metrics,
            debug: None,
            retry_delay: RETRY_DELAY,
            balance_poll: BALANCE_POLL_INTERVAL,
        }
    }

    pub fn with_debug(mut self, debug: DebugServer) -> Self {
        self.debug = Some(debug);
        self
    }
}

/// Print usage followed by every configuration error
pub fn report_config_errors(program: &str, errors: &[ConfigError]) {
    println!("{}", usage(program));
    for error in errors {
        println!("error: {}", error);
    }
}

/// Validate `config`, start the node and run it until it stops
///
/// Rejected configuration and cancellation are clean stops; any other
/// failure is returned as an error after the node's resources are released.
pub async fn run_node(
    cancel: CancellationToken,
    config: NodeConfig,
    context: NodeContext,
) -> anyhow::Result<Shutdown> {
    let validated = match validate(config) {
        Ok(validated) => validated,
        Err(errors) => {
            report_config_errors(&context.program, &errors);
            return Ok(Shutdown::InvalidConfig);
        }
    };
    let config = &validated.config;
    let chain_id = validated.chain_id();

    let mut releases = ReleaseStack::new();
    let release_cancel = cancel.clone();
    releases.defer("cancel", move || release_cancel.cancel());
    releases.defer("shutdown log", || tracing::info!("Cleanly shutting down node"));

    tracing::info!(
        chain_id,
        rollup = %validated.rollup,
        node_type = %validated.role,
        "Launching L2 node"
    );

    if let Some(debug) = context.debug {
        debug.spawn(cancel.clone());
    }

    let monitor = Arc::new(
        Monitor::open(config.node_database_path(), &config.rollup.machine.filename)
            .context("error opening monitor")?,
    );
    let closing = monitor.clone();
    releases.defer("monitor", move || {
        if let Err(e) = closing.close() {
            tracing::error!("error closing monitor: {}", e);
        }
    });

    let (health, health_events) = health_channel(LARGE_CHANNEL_BUFFER);
    let health_cancel = cancel.clone();
    let metrics_handle = context.metrics.handle();
    tokio::spawn(async move {
        if let Err(e) = start_node_health_check(health_cancel, health_events, metrics_handle).await {
            tracing::error!("healthcheck server failed: {:#}", e);
        }
    });
    publish_health_config(&health, &validated);

    let feed = subscribe_feeds(&cancel, config);

    let l1: Arc<dyn L1Client> =
        Arc::new(RpcL1Client::connect(&config.l1.url).context("error creating L1 client")?);

    let inbox_params = format!(
        "url={} rollup={} bridge_utils={}",
        config.l1.url, validated.rollup, validated.bridge_utils
    );
    let inbox_reader = match retry_until_ready(
        &cancel,
        "start inbox reader",
        &inbox_params,
        context.retry_delay,
        || {
            monitor.start_inbox_reader(
                &cancel,
                l1.clone(),
                validated.rollup,
                config.rollup.from_block,
                validated.bridge_utils,
                health.clone(),
                feed.as_ref(),
            )
        },
    )
    .await
    {
        Ok(reader) => reader,
        Err(RetryError::Cancelled(action)) => return Ok(cancelled(action)),
    };

    let resolved =
        match resolve_batcher_mode(&cancel, &validated, l1.as_ref(), context.balance_poll).await {
            Ok(resolved) => resolved,
            Err(_) if cancel.is_cancelled() => return Ok(cancelled("waiting for balance")),
            Err(e) => return Err(e),
        };

    monitor
        .storage()
        .node_store()
        .register_metrics(&context.metrics)
        .context("error registering node store metrics")?;

    let (db, txdb_errors) = TxDb::open(
        &cancel,
        monitor.core(),
        monitor.storage().node_store(),
        TXDB_POLL_INTERVAL,
    )
    .context("error opening txdb")?;
    let closing = db.clone();
    releases.defer("txdb", move || {
        if let Err(e) = closing.close() {
            tracing::error!("error closing txdb: {}", e);
        }
    });

    if validated.wait_to_catch_up {
        tracing::info!("Waiting for inbox reader to catch up");
        match inbox_reader.wait_to_catch_up(&cancel).await {
            Ok(()) => tracing::info!(l1_block = inbox_reader.latest_l1_block(), "Inbox reader caught up"),
            Err(_) if cancel.is_cancelled() => return Ok(cancelled("waiting to catch up")),
            Err(e) => return Err(e).context("error waiting for inbox reader"),
        }
    }

    let (err_tx, err_rx) = mpsc::channel(FATAL_ERROR_BUFFER);

    let factory = NodeBatcherFactory {
        cancel: &cancel,
        l1: l1.clone(),
        rollup: validated.rollup,
        chain_id,
        db: &db,
        max_batch_time: config.max_batch_time(),
        mode: &resolved.mode,
        signer: resolved.signer.clone(),
        core: monitor.core(),
        inbox_reader: inbox_reader.clone(),
        err_sink: err_tx.clone(),
    };
    let batcher_params = format!(
        "mode={} chain_id={} lockout={}",
        resolved.mode.name(),
        chain_id,
        validated.lockout.is_some()
    );
    let batcher = match retry_until_ready(
        &cancel,
        "setup batcher",
        &batcher_params,
        context.retry_delay,
        || construct_batcher(&factory, validated.lockout.as_ref()),
    )
    .await
    {
        Ok(batcher) => batcher,
        Err(RetryError::Cancelled(action)) => return Ok(cancelled(action)),
    };
    start_batcher(&cancel, batcher.clone(), err_tx.clone());

    context.metrics.register_system_metrics(cancel.clone());
    context
        .metrics
        .register_static_metrics(validated.role.as_str(), chain_id);

    let server = Arc::new(AggregatorServer::new(
        batcher,
        db.clone(),
        chain_id,
        validated.rollup,
    ));
    let public = generate_server(server);
    let rpc = config.node.rpc.clone();
    let ws = config.node.ws.clone();
    let server_cancel = cancel.clone();
    let server_errors = err_tx;
    tokio::spawn(async move {
        if let Err(e) =
            launch_public_server(server_cancel, public, &rpc.addr, rpc.port, &ws.addr, ws.port).await
        {
            let _ = server_errors
                .send(anyhow::Error::new(e).context("public server failed"))
                .await;
        }
    });

    tracing::info!(
        rpc = %format!("{}:{}", config.node.rpc.addr, config.node.rpc.port),
        ws = %format!("{}:{}", config.node.ws.addr, config.node.ws.port),
        "L2 node started"
    );

    match Supervisor::new(releases).run(&cancel, txdb_errors, err_rx).await {
        Termination::Cancelled => Ok(Shutdown::Cancelled),
        Termination::Fatal(e) => Err(e),
    }
}

fn cancelled(action: &str) -> Shutdown {
    tracing::info!("Cancelled while {}", action);
    Shutdown::Cancelled
}

/// Connect to every configured sequencer feed
fn subscribe_feeds(
    cancel: &CancellationToken,
    config: &NodeConfig,
) -> Option<broadcast::Sender<FeedMessage>> {
    let urls = &config.feed.input.urls;
    if urls.is_empty() {
        tracing::warn!("Missing --feed.input.url so not subscribing to feed");
        return None;
    }

    let hub = feed_channel();
    for url in urls {
        FeedClient::new(url, config.feed_timeout()).connect_in_background(cancel.clone(), hub.clone());
    }
    tracing::info!(feeds = urls.len(), "Subscribed to sequencer feed");
    Some(hub)
}

/// Run the batcher, reporting its failure as fatal
fn start_batcher(
    cancel: &CancellationToken,
    batcher: Arc<dyn TransactionBatcher>,
    errors: mpsc::Sender<anyhow::Error>,
) {
    let name = batcher.name();
    let run = batcher.start(cancel.clone());
    tokio::spawn(async move {
        let error = match run.await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => anyhow::Error::new(e),
            Err(e) => anyhow::anyhow!("task panicked: {}", e),
        };
        let _ = errors
            .send(error.context(format!("{} batcher stopped", name)))
            .await;
    });
    tracing::info!(batcher = name, "Batcher started");
}
