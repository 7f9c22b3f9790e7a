//! Batcher mode resolution
//!
//! Maps the validated role onto a [`BatcherMode`]. Roles that sign batches
//! first load their keystore and block until the signing account is funded;
//! that wait runs once and its failure is fatal.

use crate::config::NodeRole;
use crate::validate::ValidatedConfig;
use anyhow::Context;
use l1_bridge::{load_keystore, wait_for_balance, DataSigner, L1Client, Wallet};
use l2_batcher::BatcherMode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Mode plus the signer batchers use to sign blocks
pub struct ResolvedMode {
    pub mode: BatcherMode,
    pub signer: Option<DataSigner>,
}

/// Pure role-to-mode mapping
///
/// `auth` must be present for every role except forwarder.
pub fn resolve_mode(
    config: &ValidatedConfig,
    auth: Option<Arc<Wallet>>,
) -> anyhow::Result<BatcherMode> {
    let node = &config.config.node;
    let mode = match config.role {
        NodeRole::Forwarder => BatcherMode::Forwarder {
            target_url: node.forwarder.target.clone(),
        },
        NodeRole::Sequencer => BatcherMode::Sequencer {
            auth: require_auth(config.role, auth)?,
            delayed_messages_target_delay: node.sequencer.delayed_messages_target_delay,
            create_batch_block_interval: node.sequencer.create_batch_block_interval,
        },
        NodeRole::Aggregator => {
            let auth = require_auth(config.role, auth)?;
            let inbox_address = config
                .inbox
                .context("aggregator node requires an inbox address")?;
            if node.aggregator.stateful {
                BatcherMode::StatefulAggregator {
                    auth,
                    inbox_address,
                }
            } else {
                BatcherMode::StatelessAggregator {
                    auth,
                    inbox_address,
                }
            }
        }
    };
    Ok(mode)
}

fn require_auth(role: NodeRole, auth: Option<Arc<Wallet>>) -> anyhow::Result<Arc<Wallet>> {
    auth.with_context(|| format!("{} node requires a signing identity", role))
}

/// Load the signing identity when needed and resolve the mode
pub async fn resolve_batcher_mode(
    cancel: &CancellationToken,
    config: &ValidatedConfig,
    l1: &dyn L1Client,
    balance_poll: Duration,
) -> anyhow::Result<ResolvedMode> {
    if config.role == NodeRole::Forwarder {
        tracing::info!(
            target_url = %config.config.node.forwarder.target,
            "Starting in forwarder mode"
        );
        return Ok(ResolvedMode {
            mode: resolve_mode(config, None)?,
            signer: None,
        });
    }

    let path = config.config.keypair_path();
    let wallet = Arc::new(load_keystore(&path).context("error loading keystore")?);
    let address = wallet.address();
    tracing::info!(from = %address, role = %config.role, "Submitting batches");

    wait_for_balance(cancel, l1, &address, balance_poll)
        .await
        .context("error waiting for balance")?;

    let signer = wallet.signer();
    Ok(ResolvedMode {
        mode: resolve_mode(config, Some(wallet))?,
        signer: Some(signer),
    })
}
