//! Node Configuration
//!
//! Loaded once at startup, from CLI flags or a JSON `--conf` file, and never
//! mutated after validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub persistent: PersistentConfig,
    pub l1: L1Config,
    pub rollup: RollupConfig,
    pub bridge_utils_address: String,
    pub node: NodeSection,
    pub feed: FeedConfig,
    pub healthcheck: HealthcheckConfig,
    pub wallet: WalletConfig,
    pub log: LogConfig,
    pub debug: DebugConfig,
    /// Wait for the inbox reader to catch up before batching
    pub wait_to_catch_up: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentConfig {
    /// Directory for state shared by all chains
    pub global_config: String,
    /// Directory for this chain's database and wallets
    pub chain: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct L1Config {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RollupConfig {
    pub address: String,
    /// L1 block to start reading the inbox from
    pub from_block: u64,
    pub machine: MachineConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    #[serde(rename = "type")]
    pub node_type: String,
    pub chain_id: u64,
    pub forwarder: ForwarderConfig,
    pub aggregator: AggregatorConfig,
    pub sequencer: SequencerSection,
    pub rpc: ListenConfig,
    pub ws: ListenConfig,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            node_type: "forwarder".to_string(),
            chain_id: 0,
            forwarder: ForwarderConfig::default(),
            aggregator: AggregatorConfig::default(),
            sequencer: SequencerSection::default(),
            rpc: ListenConfig::new("0.0.0.0", 8547),
            ws: ListenConfig::new("0.0.0.0", 8548),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// RPC URL of the node transactions are forwarded to
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub inbox_address: String,
    pub stateful: bool,
    /// Seconds between sealed batches
    pub max_batch_time: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            inbox_address: String::new(),
            stateful: false,
            max_batch_time: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerSection {
    pub create_batch_block_interval: u64,
    pub delayed_messages_target_delay: u64,
    pub lockout: LockoutSection,
}

impl Default for SequencerSection {
    fn default() -> Self {
        Self {
            create_batch_block_interval: 270,
            delayed_messages_target_delay: 12,
            lockout: LockoutSection::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutSection {
    pub redis: String,
    pub self_rpc_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub addr: String,
    pub port: u16,
}

impl ListenConfig {
    pub fn new(addr: &str, port: u16) -> Self {
        Self {
            addr: addr.to_string(),
            port,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub input: FeedInputConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            input: FeedInputConfig {
                urls: Vec::new(),
                timeout: 20,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedInputConfig {
    pub urls: Vec<String>,
    /// Connect timeout in seconds
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthcheckConfig {
    pub enable: bool,
    pub metrics: bool,
    pub metrics_prefix: String,
    /// Check the primary (forwarding target) is alive
    pub sequencer: bool,
    /// Check the L1 node is alive
    pub l1_node: bool,
    pub addr: String,
    pub port: u16,
}

impl Default for HealthcheckConfig {
    fn default() -> Self {
        Self {
            enable: false,
            metrics: false,
            metrics_prefix: String::new(),
            sequencer: false,
            l1_node: false,
            addr: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Keypair file; defaults to `<chain>/wallets/keypair.json`
    pub keypair_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub rpc: String,
    pub core: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            rpc: "info".to_string(),
            core: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enable: bool,
    pub addr: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enable: false,
            addr: "127.0.0.1:8081".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load a JSON configuration file
    pub fn load(path: &Path) -> Result<Self, crate::validate::ConfigError> {
        let load_error = |message: String| crate::validate::ConfigError::Load {
            path: path.display().to_string(),
            message,
        };
        let data = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        serde_json::from_str(&data).map_err(|e| load_error(e.to_string()))
    }

    /// Node database directory
    pub fn node_database_path(&self) -> PathBuf {
        Path::new(&self.persistent.chain).join("db")
    }

    /// Signing keypair file
    pub fn keypair_path(&self) -> PathBuf {
        self.wallet
            .keypair_file
            .clone()
            .unwrap_or_else(|| Path::new(&self.persistent.chain).join("wallets").join("keypair.json"))
    }

    pub fn max_batch_time(&self) -> Duration {
        Duration::from_secs(self.node.aggregator.max_batch_time)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed.input.timeout)
    }

    /// Health-check listen address (`addr:port`)
    pub fn healthcheck_rpc(&self) -> String {
        format!("{}:{}", self.healthcheck.addr, self.healthcheck.port)
    }
}

/// Node role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Forwards transactions to another node
    Forwarder,
    /// Batches transactions and submits them
    Aggregator,
    /// Exclusive block producer, optionally under lockout
    Sequencer,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Forwarder => "forwarder",
            NodeRole::Aggregator => "aggregator",
            NodeRole::Sequencer => "sequencer",
        }
    }
}

impl FromStr for NodeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forwarder" => Ok(NodeRole::Forwarder),
            "aggregator" => Ok(NodeRole::Aggregator),
            "sequencer" => Ok(NodeRole::Sequencer),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
