//! L2 Node - startup orchestration and supervision
//!
//! Turns a configuration into a running node:
//! - Validates the configuration, reporting every problem at once
//! - Retries flaky startup dependencies every five seconds until cancelled
//! - Resolves the batcher mode and, for sequencers, an optional lockout
//! - Supervises the running node and releases resources in reverse order

pub mod config;
pub mod debug;
pub mod health;
pub mod lockout;
pub mod logging;
pub mod mode;
pub mod retry;
pub mod startup;
pub mod supervisor;
pub mod validate;

pub use config::{NodeConfig, NodeRole};
pub use retry::{retry_until_ready, RetryError, RETRY_DELAY};
pub use startup::{report_config_errors, run_node, NodeContext, Shutdown};
pub use supervisor::{ReleaseStack, Supervisor, SupervisorState, Termination};
pub use validate::{validate, ConfigError, ValidatedConfig};
