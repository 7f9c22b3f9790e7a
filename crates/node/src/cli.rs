//! Command line flags
//!
//! Flags override values loaded from `--conf`.

use clap::error::ErrorKind;
use clap::Parser;
use l2_node::validate::validate_log;
use l2_node::{ConfigError, NodeConfig};
use std::ffi::OsString;
use std::path::PathBuf;

/// L2 node
#[derive(Parser, Debug)]
#[command(name = "l2-node")]
#[command(about = "L2 rollup node: forwarder, aggregator or sequencer", long_about = None)]
pub struct Args {
    /// JSON configuration file
    #[arg(long)]
    pub conf: Option<PathBuf>,

    #[arg(long = "persistent.global-config")]
    pub global_config: Option<String>,

    /// Chain directory holding the database and wallets
    #[arg(long = "persistent.chain")]
    pub chain: Option<String>,

    /// L1 JSON-RPC URL
    #[arg(long = "l1.url")]
    pub l1_url: Option<String>,

    #[arg(long = "rollup.address")]
    pub rollup_address: Option<String>,

    /// L1 block to start reading the inbox from
    #[arg(long = "rollup.from-block")]
    pub rollup_from_block: Option<u64>,

    #[arg(long = "rollup.machine.filename")]
    pub machine_filename: Option<String>,

    #[arg(long = "bridge-utils-address")]
    pub bridge_utils_address: Option<String>,

    /// forwarder, aggregator or sequencer
    #[arg(long = "node.type")]
    pub node_type: Option<String>,

    #[arg(long = "node.chain-id")]
    pub chain_id: Option<u64>,

    /// Node that receives forwarded transactions
    #[arg(long = "node.forwarder.target")]
    pub forwarder_target: Option<String>,

    #[arg(long = "node.aggregator.inbox-address")]
    pub inbox_address: Option<String>,

    /// Track pending submissions locally
    #[arg(long = "node.aggregator.stateful")]
    pub stateful: bool,

    /// Seconds between sealed batches
    #[arg(long = "node.aggregator.max-batch-time")]
    pub max_batch_time: Option<u64>,

    #[arg(long = "node.sequencer.create-batch-block-interval")]
    pub create_batch_block_interval: Option<u64>,

    #[arg(long = "node.sequencer.delayed-messages-target-delay")]
    pub delayed_messages_target_delay: Option<u64>,

    /// Redis address for sequencer lockout
    #[arg(long = "node.sequencer.lockout.redis")]
    pub lockout_redis: Option<String>,

    /// This node's RPC URL, advertised while holding the lockout
    #[arg(long = "node.sequencer.lockout.self-rpc-url")]
    pub lockout_self_rpc_url: Option<String>,

    #[arg(long = "node.rpc.addr")]
    pub rpc_addr: Option<String>,

    #[arg(long = "node.rpc.port")]
    pub rpc_port: Option<u16>,

    #[arg(long = "node.ws.addr")]
    pub ws_addr: Option<String>,

    #[arg(long = "node.ws.port")]
    pub ws_port: Option<u16>,

    /// Sequencer feed URL, repeatable
    #[arg(long = "feed.input.url", value_delimiter = ',')]
    pub feed_urls: Vec<String>,

    /// Feed connect timeout in seconds
    #[arg(long = "feed.input.timeout")]
    pub feed_timeout: Option<u64>,

    #[arg(long = "healthcheck.enable")]
    pub healthcheck_enable: bool,

    #[arg(long = "healthcheck.metrics")]
    pub healthcheck_metrics: bool,

    #[arg(long = "healthcheck.metrics-prefix")]
    pub metrics_prefix: Option<String>,

    /// Check the primary node is alive
    #[arg(long = "healthcheck.sequencer")]
    pub healthcheck_sequencer: bool,

    /// Check the L1 node is alive
    #[arg(long = "healthcheck.l1-node")]
    pub healthcheck_l1_node: bool,

    #[arg(long = "healthcheck.addr")]
    pub healthcheck_addr: Option<String>,

    #[arg(long = "healthcheck.port")]
    pub healthcheck_port: Option<u16>,

    /// Signing keypair (defaults to <chain>/wallets/keypair.json)
    #[arg(long = "wallet.keypair-file")]
    pub keypair_file: Option<PathBuf>,

    #[arg(long = "log.rpc")]
    pub log_rpc: Option<String>,

    #[arg(long = "log.core")]
    pub log_core: Option<String>,

    /// Serve diagnostics on --debug.addr
    #[arg(long = "debug.enable")]
    pub debug_enable: bool,

    #[arg(long = "debug.addr")]
    pub debug_addr: Option<String>,

    /// Wait for the inbox reader to catch up before batching
    #[arg(long = "wait-to-catch-up")]
    pub wait_to_catch_up: bool,
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl Args {
    /// Overlay the flags that were given onto `config`
    pub fn apply(self, config: &mut NodeConfig) {
        set(&mut config.persistent.global_config, self.global_config);
        set(&mut config.persistent.chain, self.chain);
        set(&mut config.l1.url, self.l1_url);
        set(&mut config.rollup.address, self.rollup_address);
        set(&mut config.rollup.from_block, self.rollup_from_block);
        set(&mut config.rollup.machine.filename, self.machine_filename);
        set(&mut config.bridge_utils_address, self.bridge_utils_address);

        let node = &mut config.node;
        set(&mut node.node_type, self.node_type);
        set(&mut node.chain_id, self.chain_id);
        set(&mut node.forwarder.target, self.forwarder_target);
        set(&mut node.aggregator.inbox_address, self.inbox_address);
        node.aggregator.stateful |= self.stateful;
        set(&mut node.aggregator.max_batch_time, self.max_batch_time);
        set(
            &mut node.sequencer.create_batch_block_interval,
            self.create_batch_block_interval,
        );
        set(
            &mut node.sequencer.delayed_messages_target_delay,
            self.delayed_messages_target_delay,
        );
        set(&mut node.sequencer.lockout.redis, self.lockout_redis);
        set(&mut node.sequencer.lockout.self_rpc_url, self.lockout_self_rpc_url);
        set(&mut node.rpc.addr, self.rpc_addr);
        set(&mut node.rpc.port, self.rpc_port);
        set(&mut node.ws.addr, self.ws_addr);
        set(&mut node.ws.port, self.ws_port);

        if !self.feed_urls.is_empty() {
            config.feed.input.urls = self.feed_urls;
        }
        set(&mut config.feed.input.timeout, self.feed_timeout);

        let health = &mut config.healthcheck;
        health.enable |= self.healthcheck_enable;
        health.metrics |= self.healthcheck_metrics;
        health.sequencer |= self.healthcheck_sequencer;
        health.l1_node |= self.healthcheck_l1_node;
        set(&mut health.metrics_prefix, self.metrics_prefix);
        set(&mut health.addr, self.healthcheck_addr);
        set(&mut health.port, self.healthcheck_port);

        if self.keypair_file.is_some() {
            config.wallet.keypair_file = self.keypair_file;
        }
        set(&mut config.log.rpc, self.log_rpc);
        set(&mut config.log.core, self.log_core);
        config.debug.enable |= self.debug_enable;
        set(&mut config.debug.addr, self.debug_addr);
        config.wait_to_catch_up |= self.wait_to_catch_up;
    }
}

/// Why the command line did not produce a configuration
#[derive(Debug)]
pub enum Rejected {
    /// `--help` or `--version`; clap renders the text
    Info(clap::Error),
    /// Bad flags, an unreadable `--conf` file or unusable log levels
    Invalid(Vec<ConfigError>),
}

/// Parse flags, load `--conf` and overlay the flags onto it
///
/// Log levels are checked here because logging is installed before the
/// rest of the configuration is validated.
pub fn config_from_args<I, T>(argv: I) -> Result<NodeConfig, Rejected>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = Args::try_parse_from(argv).map_err(|e| match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Rejected::Info(e),
        _ => Rejected::Invalid(vec![flag_error(&e)]),
    })?;

    let mut config = match &args.conf {
        Some(path) => NodeConfig::load(path).map_err(|e| Rejected::Invalid(vec![e]))?,
        None => NodeConfig::default(),
    };
    args.apply(&mut config);
    validate_log(&config.log).map_err(Rejected::Invalid)?;
    Ok(config)
}

/// First line of a clap error without its `error: ` prefix
fn flag_error(e: &clap::Error) -> ConfigError {
    let rendered = e.to_string();
    let line = rendered.lines().next().unwrap_or_default();
    ConfigError::InvalidFlag(line.trim_start_matches("error: ").to_string())
}
