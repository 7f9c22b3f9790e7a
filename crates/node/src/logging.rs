//! Logging setup

use crate::config::LogConfig;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directives for the configured levels
///
/// `log.core` is the default level and `log.rpc` applies to the RPC server.
pub fn filter_directives(log: &LogConfig) -> anyhow::Result<String> {
    let core = Level::from_str(&log.core)
        .map_err(|_| anyhow::anyhow!("invalid --log.core level {:?}", log.core))?;
    let rpc = Level::from_str(&log.rpc)
        .map_err(|_| anyhow::anyhow!("invalid --log.rpc level {:?}", log.rpc))?;
    Ok(format!("{},rpc_server={}", core, rpc).to_lowercase())
}

pub fn log_filter(log: &LogConfig) -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::try_new(filter_directives(log)?)?)
}

/// Install the global subscriber; `RUST_LOG` takes precedence
pub fn init_logging(log: &LogConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => log_filter(log)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        let log = LogConfig {
            core: "warn".to_string(),
            rpc: "DEBUG".to_string(),
        };
        assert_eq!(filter_directives(&log).unwrap(), "warn,rpc_server=debug");
        log_filter(&log).unwrap();
    }

    #[test]
    fn test_rejects_unknown_level() {
        let log = LogConfig {
            core: "loud".to_string(),
            rpc: "info".to_string(),
        };
        assert!(filter_directives(&log).is_err());
    }
}
