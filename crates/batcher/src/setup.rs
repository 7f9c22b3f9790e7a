//! Batcher construction

use crate::aggregator::BatchSubmitter;
use crate::batcher::BatcherHandle;
use crate::error::BatcherError;
use crate::forwarder::ForwarderBatcher;
use crate::mode::BatcherMode;
use crate::sequencer::{SequencerBatcher, SequencerConfig};
use crate::txdb::TxDb;
use l1_bridge::{DataSigner, L1Client, Pubkey};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Build the batcher selected by `mode`
///
/// Batchers that sign blocks first confirm L1 is reachable, so a failure here
/// is transient and the whole construction can be retried.
#[allow(clippy::too_many_arguments)]
pub async fn setup_batcher(
    cancel: &CancellationToken,
    l1: Arc<dyn L1Client>,
    rollup: Pubkey,
    chain_id: u64,
    db: &Arc<TxDb>,
    max_batch_time: Duration,
    mode: &BatcherMode,
    signer: Option<DataSigner>,
) -> Result<BatcherHandle, BatcherError> {
    let handle = match mode {
        BatcherMode::Forwarder { target_url } => {
            BatcherHandle::Forwarder(Arc::new(ForwarderBatcher::new(target_url)?))
        }
        BatcherMode::Sequencer {
            auth,
            delayed_messages_target_delay,
            create_batch_block_interval,
        } => {
            let signer = connect_signer(cancel, l1.as_ref(), rollup, chain_id, mode, signer).await?;
            BatcherHandle::Sequencer(Arc::new(SequencerBatcher::new(
                db.core(),
                signer,
                auth.address(),
                SequencerConfig {
                    block_time: max_batch_time,
                    create_batch_block_interval: *create_batch_block_interval,
                    delayed_messages_target_delay: *delayed_messages_target_delay,
                },
            )))
        }
        BatcherMode::StatefulAggregator {
            auth,
            inbox_address,
        }
        | BatcherMode::StatelessAggregator {
            auth,
            inbox_address,
        } => {
            let signer = connect_signer(cancel, l1.as_ref(), rollup, chain_id, mode, signer).await?;
            BatcherHandle::Aggregator(Arc::new(BatchSubmitter::new(
                db.core(),
                signer,
                auth.address(),
                *inbox_address,
                max_batch_time,
                matches!(mode, BatcherMode::StatefulAggregator { .. }),
            )))
        }
    };
    Ok(handle)
}

/// Check the signer is present and L1 answers
async fn connect_signer(
    cancel: &CancellationToken,
    l1: &dyn L1Client,
    rollup: Pubkey,
    chain_id: u64,
    mode: &BatcherMode,
    signer: Option<DataSigner>,
) -> Result<DataSigner, BatcherError> {
    let signer = signer.ok_or(BatcherError::MissingSigner(mode.name()))?;
    let l1_block = tokio::select! {
        _ = cancel.cancelled() => return Err(BatcherError::Cancelled("setting up batcher")),
        latest = l1.latest_block() => latest?,
    };
    tracing::info!(
        chain_id,
        rollup = %rollup,
        l1_block,
        mode = mode.name(),
        "Batcher connected to L1"
    );
    Ok(signer)
}
