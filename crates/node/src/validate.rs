//! Configuration validation
//!
//! Every rule is checked independently and all violations are reported
//! together, so an operator sees the complete list in a single run.

use crate::config::{LogConfig, NodeConfig, NodeRole};
use l1_bridge::Pubkey;
use l2_lockout::LockoutConfig;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing --{0}")]
    Missing(&'static str),

    #[error("{role} node requires --{field}")]
    RoleRequires { role: NodeRole, field: &'static str },

    #[error("unrecognized node type {0:?}")]
    UnrecognizedRole(String),

    #[error("lockout is only supported by sequencer nodes, not {0}")]
    LockoutNotSequencer(String),

    #[error("--node.sequencer.lockout.redis and --node.sequencer.lockout.self-rpc-url must be set together")]
    LockoutIncomplete,

    #[error("{0}")]
    Lockout(String),

    #[error("invalid level for --{field}: {value:?}")]
    InvalidLogLevel { field: &'static str, value: String },

    #[error("{0}")]
    InvalidFlag(String),

    #[error("invalid address for --{field}: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("failed to load config {path}: {message}")]
    Load { path: String, message: String },
}

/// Configuration that passed validation
///
/// Addresses are parsed once here; nothing downstream re-checks them.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub role: NodeRole,
    pub config: NodeConfig,
    pub rollup: Pubkey,
    pub bridge_utils: Pubkey,
    /// Aggregator inbox; only present for aggregators
    pub inbox: Option<Pubkey>,
    pub lockout: Option<LockoutConfig>,
    /// Forced on for sequencers
    pub wait_to_catch_up: bool,
}

impl ValidatedConfig {
    pub fn chain_id(&self) -> u64 {
        self.config.node.chain_id
    }
}

/// Check `config` against every rule
pub fn validate(config: NodeConfig) -> Result<ValidatedConfig, Vec<ConfigError>> {
    let mut errors = Vec::new();

    let mut require = |value: bool, field: &'static str| {
        if !value {
            errors.push(ConfigError::Missing(field));
        }
    };
    require(!config.persistent.chain.is_empty(), "persistent.chain");
    require(!config.l1.url.is_empty(), "l1.url");
    require(!config.rollup.address.is_empty(), "rollup.address");
    require(!config.bridge_utils_address.is_empty(), "bridge-utils-address");
    require(config.node.chain_id != 0, "node.chain-id");
    require(!config.rollup.machine.filename.is_empty(), "rollup.machine.filename");

    let rollup = parse_address(&mut errors, "rollup.address", &config.rollup.address);
    let bridge_utils = parse_address(
        &mut errors,
        "bridge-utils-address",
        &config.bridge_utils_address,
    );

    let role = match NodeRole::from_str(&config.node.node_type) {
        Ok(role) => Some(role),
        Err(other) => {
            errors.push(ConfigError::UnrecognizedRole(other));
            None
        }
    };

    let mut inbox = None;
    match role {
        Some(role @ NodeRole::Forwarder) if config.node.forwarder.target.is_empty() => {
            errors.push(ConfigError::RoleRequires {
                role,
                field: "node.forwarder.target",
            });
        }
        Some(role @ NodeRole::Aggregator) => {
            let address = &config.node.aggregator.inbox_address;
            if address.is_empty() {
                errors.push(ConfigError::RoleRequires {
                    role,
                    field: "node.aggregator.inbox-address",
                });
            } else {
                inbox = parse_address(&mut errors, "node.aggregator.inbox-address", address);
            }
        }
        _ => {}
    }

    let flags = &config.node.sequencer.lockout;
    let mut lockout = None;
    if !flags.redis.is_empty() && role != Some(NodeRole::Sequencer) {
        errors.push(ConfigError::LockoutNotSequencer(config.node.node_type.clone()));
    }
    if flags.redis.is_empty() != flags.self_rpc_url.is_empty() {
        errors.push(ConfigError::LockoutIncomplete);
    } else if !flags.redis.is_empty() && role == Some(NodeRole::Sequencer) {
        match LockoutConfig::new(&flags.redis, &flags.self_rpc_url) {
            Ok(parsed) => lockout = Some(parsed),
            Err(e) => errors.push(ConfigError::Lockout(e.to_string())),
        }
    }

    if let Err(log_errors) = validate_log(&config.log) {
        errors.extend(log_errors);
    }

    match (role, rollup, bridge_utils) {
        (Some(role), Some(rollup), Some(bridge_utils)) if errors.is_empty() => {
            let wait_to_catch_up = role == NodeRole::Sequencer || config.wait_to_catch_up;
            Ok(ValidatedConfig {
                role,
                config,
                rollup,
                bridge_utils,
                inbox,
                lockout,
                wait_to_catch_up,
            })
        }
        _ => Err(errors),
    }
}

/// Check that both log levels name a `tracing` level
pub fn validate_log(log: &LogConfig) -> Result<(), Vec<ConfigError>> {
    let errors: Vec<_> = [("log.core", &log.core), ("log.rpc", &log.rpc)]
        .into_iter()
        .filter(|(_, value)| tracing::Level::from_str(value).is_err())
        .map(|(field, value)| ConfigError::InvalidLogLevel {
            field,
            value: value.clone(),
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parse_address(errors: &mut Vec<ConfigError>, field: &'static str, value: &str) -> Option<Pubkey> {
    if value.is_empty() {
        return None;
    }
    match Pubkey::from_str(value) {
        Ok(address) => Some(address),
        Err(_) => {
            errors.push(ConfigError::InvalidAddress {
                field,
                value: value.to_string(),
            });
            None
        }
    }
}

/// Usage text printed when the configuration is rejected
pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [OPTIONS] --persistent.chain <dir> --l1.url <url> \\
    --rollup.address <address> --bridge-utils-address <address> \\
    --node.chain-id <id> --rollup.machine.filename <file> --node.type <type>

Node types: forwarder, aggregator, sequencer

Examples:
  {program} --node.type forwarder --node.forwarder.target http://sequencer:8547 ...
  {program} --node.type aggregator --node.aggregator.inbox-address <address> ...
  {program} --node.type sequencer \\
      --node.sequencer.lockout.redis redis:6379 \\
      --node.sequencer.lockout.self-rpc-url http://seq-1:8547 ...

Configuration can also be loaded from a JSON file with --conf <file>.
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLLUP: &str = "11111111111111111111111111111112";
    const BRIDGE: &str = "SysvarC1ock11111111111111111111111111111111";

    fn valid(node_type: &str) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.persistent.chain = "/tmp/chain".to_string();
        config.l1.url = "http://localhost:8899".to_string();
        config.rollup.address = ROLLUP.to_string();
        config.bridge_utils_address = BRIDGE.to_string();
        config.node.chain_id = 42;
        config.rollup.machine.filename = "machine.bin".to_string();
        config.node.node_type = node_type.to_string();
        config.node.forwarder.target = "http://primary:8547".to_string();
        config.node.aggregator.inbox_address = ROLLUP.to_string();
        config
    }

    #[test]
    fn test_valid_roles() {
        for role in ["forwarder", "aggregator", "sequencer"] {
            let validated = validate(valid(role)).unwrap();
            assert_eq!(validated.role.as_str(), role);
            assert_eq!(validated.chain_id(), 42);
        }
    }

    #[test]
    fn test_reports_every_missing_field() {
        let errors = validate(NodeConfig::default()).unwrap_err();
        assert!(errors.contains(&ConfigError::Missing("persistent.chain")));
        assert!(errors.contains(&ConfigError::Missing("l1.url")));
        assert!(errors.contains(&ConfigError::Missing("rollup.address")));
        assert!(errors.contains(&ConfigError::Missing("bridge-utils-address")));
        assert!(errors.contains(&ConfigError::Missing("node.chain-id")));
        assert!(errors.contains(&ConfigError::Missing("rollup.machine.filename")));
        // default role is forwarder without a target
        assert!(errors.contains(&ConfigError::RoleRequires {
            role: NodeRole::Forwarder,
            field: "node.forwarder.target",
        }));
        assert_eq!(errors.len(), 7);
    }

    #[test]
    fn test_single_missing_field_fails() {
        let cases: [fn(&mut NodeConfig); 6] = [
            |c| c.persistent.chain.clear(),
            |c| c.l1.url.clear(),
            |c| c.rollup.address.clear(),
            |c| c.bridge_utils_address.clear(),
            |c| c.node.chain_id = 0,
            |c| c.rollup.machine.filename.clear(),
        ];
        for clear in cases {
            let mut config = valid("aggregator");
            clear(&mut config);
            assert_eq!(validate(config).unwrap_err().len(), 1);
        }
    }

    #[test]
    fn test_forwarder_requires_target() {
        let mut config = valid("forwarder");
        config.node.forwarder.target.clear();
        let errors = validate(config).unwrap_err();
        assert_eq!(
            errors,
            vec![ConfigError::RoleRequires {
                role: NodeRole::Forwarder,
                field: "node.forwarder.target",
            }]
        );
    }

    #[test]
    fn test_aggregator_requires_inbox() {
        let mut config = valid("aggregator");
        config.node.aggregator.inbox_address.clear();
        assert!(matches!(
            validate(config).unwrap_err().as_slice(),
            [ConfigError::RoleRequires { role: NodeRole::Aggregator, .. }]
        ));
    }

    #[test]
    fn test_lockout_only_for_sequencer() {
        for role in ["forwarder", "aggregator"] {
            let mut config = valid(role);
            config.node.sequencer.lockout.redis = "r:6379".to_string();
            config.node.sequencer.lockout.self_rpc_url = "http://self:8547".to_string();
            assert_eq!(
                validate(config).unwrap_err(),
                vec![ConfigError::LockoutNotSequencer(role.to_string())]
            );
        }

        let mut config = valid("sequencer");
        config.node.sequencer.lockout.redis = "r:6379".to_string();
        config.node.sequencer.lockout.self_rpc_url = "http://self:8547".to_string();
        let validated = validate(config).unwrap();
        let lockout = validated.lockout.unwrap();
        assert_eq!(lockout.redis_url(), "redis://r:6379");
    }

    #[test]
    fn test_lockout_half_configured() {
        // redis without self url
        let mut config = valid("sequencer");
        config.node.sequencer.lockout.redis = "r:6379".to_string();
        assert_eq!(validate(config).unwrap_err(), vec![ConfigError::LockoutIncomplete]);

        // self url without redis, on any role
        for role in ["forwarder", "aggregator", "sequencer"] {
            let mut config = valid(role);
            config.node.sequencer.lockout.self_rpc_url = "http://self:8547".to_string();
            assert_eq!(validate(config).unwrap_err(), vec![ConfigError::LockoutIncomplete]);
        }
    }

    #[test]
    fn test_lockout_construction_error_is_reported() {
        let mut config = valid("sequencer");
        config.node.sequencer.lockout.redis = "r:6379".to_string();
        config.node.sequencer.lockout.self_rpc_url = "seq-1:8547".to_string();
        assert!(matches!(
            validate(config).unwrap_err().as_slice(),
            [ConfigError::Lockout(message)] if message.contains("http")
        ));
    }

    #[test]
    fn test_log_levels() {
        let mut config = valid("forwarder");
        config.log.core = "loud".to_string();
        config.log.rpc = "DEBUG".to_string();
        assert_eq!(
            validate(config).unwrap_err(),
            vec![ConfigError::InvalidLogLevel {
                field: "log.core",
                value: "loud".to_string(),
            }]
        );
    }

    #[test]
    fn test_unrecognized_role() {
        let errors = validate(valid("validator")).unwrap_err();
        assert_eq!(errors, vec![ConfigError::UnrecognizedRole("validator".to_string())]);
    }

    #[test]
    fn test_invalid_addresses() {
        let mut config = valid("aggregator");
        config.rollup.address = "not-base58!".to_string();
        config.node.aggregator.inbox_address = "0x1234".to_string();
        let errors = validate(config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ConfigError::InvalidAddress { .. })));
    }

    #[test]
    fn test_sequencer_forces_catch_up() {
        assert!(validate(valid("sequencer")).unwrap().wait_to_catch_up);
        assert!(!validate(valid("forwarder")).unwrap().wait_to_catch_up);
        assert!(!validate(valid("aggregator")).unwrap().wait_to_catch_up);

        let mut config = valid("sequencer");
        config.wait_to_catch_up = false;
        assert!(validate(config).unwrap().wait_to_catch_up);
    }

    #[test]
    fn test_usage_lists_examples() {
        let text = usage("l2-node");
        assert!(text.contains("--node.type forwarder"));
        assert!(text.contains("--node.sequencer.lockout.redis"));
    }
}
