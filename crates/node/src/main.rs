//! L2 Node
//!
//! Runs a forwarder, aggregator or sequencer until Ctrl+C or SIGTERM.

use l2_node::debug::DebugServer;
use l2_node::logging::init_logging;
use l2_node::{report_config_errors, run_node, NodeConfig, NodeContext, Shutdown};
use node_health::MetricsConfig;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

mod cli;

const PROGRAM: &str = "l2-node";

#[tokio::main]
async fn main() -> ExitCode {
    let config = match cli::config_from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(cli::Rejected::Info(e)) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(cli::Rejected::Invalid(errors)) => {
            report_config_errors(PROGRAM, &errors);
            return ExitCode::SUCCESS;
        }
    };

    if let Err(e) = init_logging(&config.log) {
        eprintln!("failed to initialise logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(Shutdown::InvalidConfig) | Ok(Shutdown::Cancelled) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: NodeConfig) -> anyhow::Result<Shutdown> {
    let prefix = config.healthcheck.metrics_prefix.clone();
    let metrics = if config.healthcheck.metrics {
        MetricsConfig::with_prometheus(&prefix)?
    } else {
        MetricsConfig::new(&prefix)
    };

    let mut context = NodeContext::new(PROGRAM, metrics);
    if config.debug.enable {
        context = context.with_debug(DebugServer::new(&config.debug.addr, &config)?);
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    run_node(cancel, config, context).await
}

/// Cancel the node on Ctrl+C or SIGTERM
async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = cancel.cancelled() => return,
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!("failed to listen for Ctrl+C: {}", e);
                return;
            }
        }
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
