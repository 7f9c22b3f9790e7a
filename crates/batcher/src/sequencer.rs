//! Sequencer batcher
//!
//! Orders incoming transactions into signed L2 blocks. A sequencer only seals
//! while active; under lockout the active flag follows lock ownership.

use crate::batcher::{TransactionBatcher, TxQueue};
use crate::error::BatcherError;
use crate::{MAX_TXS_PER_BATCH, TX_QUEUE_CAPACITY};
use async_trait::async_trait;
use l1_bridge::{DataSigner, Pubkey};
use l2_monitor::{tx_hash, BlockSource, ExecutionCore, L2Block};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Sequencer timing parameters
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Interval between sealing attempts
    pub block_time: Duration,
    /// L1 blocks after which an empty block is sealed to keep pace with L1
    pub create_batch_block_interval: u64,
    /// Target delay, in L1 blocks, before delayed messages are included
    pub delayed_messages_target_delay: u64,
}

pub struct SequencerBatcher {
    core: Arc<ExecutionCore>,
    signer: DataSigner,
    sequencer: Pubkey,
    config: SequencerConfig,
    queue: TxQueue,
    active: AtomicBool,
    last_sealed_l1: AtomicU64,
}

impl SequencerBatcher {
    pub fn new(
        core: Arc<ExecutionCore>,
        signer: DataSigner,
        sequencer: Pubkey,
        config: SequencerConfig,
    ) -> Self {
        let last_sealed_l1 = core.l1_cursor();
        Self {
            core,
            signer,
            sequencer,
            config,
            queue: TxQueue::new(TX_QUEUE_CAPACITY),
            active: AtomicBool::new(true),
            last_sealed_l1: AtomicU64::new(last_sealed_l1),
        }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn sequencer(&self) -> &Pubkey {
        &self.sequencer
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Enable or disable block production
    pub fn set_active(&self, active: bool) {
        let was = self.active.swap(active, Ordering::SeqCst);
        if was != active {
            tracing::info!(active, "Sequencer activity changed");
        }
    }

    /// Seal pending transactions into a block
    ///
    /// An empty block is sealed once L1 has advanced by the batch block
    /// interval since the last sealed block.
    pub fn seal_block(&self) -> Result<Option<L2Block>, BatcherError> {
        if !self.is_active() {
            return Ok(None);
        }

        let txs = self.queue.drain(MAX_TXS_PER_BATCH);
        let l1_cursor = self.core.l1_cursor();
        let heartbeat_due = self.config.create_batch_block_interval > 0
            && l1_cursor
                >= self.last_sealed_l1.load(Ordering::SeqCst)
                    + self.config.create_batch_block_interval;
        if txs.is_empty() && !heartbeat_due {
            return Ok(None);
        }

        let mut digest = self.core.block_count().to_be_bytes().to_vec();
        digest.extend(txs.iter().flat_map(|tx| tx_hash(tx)));
        let signature = (self.signer)(&digest);

        let block = self
            .core
            .append_block(txs, BlockSource::Sequencer, Some(signature))?;
        self.last_sealed_l1.store(block.l1_block, Ordering::SeqCst);

        tracing::debug!(
            "Sequenced block {} ({} txs, l1 {})",
            block.number,
            block.transactions.len(),
            block.l1_block
        );
        Ok(Some(block))
    }
}

#[async_trait]
impl TransactionBatcher for SequencerBatcher {
    fn name(&self) -> &'static str {
        "sequencer"
    }

    async fn send_transaction(&self, raw: Vec<u8>) -> Result<[u8; 32], BatcherError> {
        if raw.is_empty() {
            return Err(BatcherError::EmptyTransaction);
        }
        if !self.is_active() {
            return Err(BatcherError::Inactive);
        }
        let hash = tx_hash(&raw);
        self.queue.push(raw)?;
        Ok(hash)
    }

    fn pending_count(&self) -> usize {
        self.queue.len()
    }

    fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<Result<(), BatcherError>> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.block_time);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                sequencer = %self.sequencer,
                block_time = ?self.config.block_time,
                create_batch_block_interval = self.config.create_batch_block_interval,
                delayed_messages_target_delay = self.config.delayed_messages_target_delay,
                "Sequencer started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        self.seal_block()?;
                    }
                }
            }

            self.seal_block()?;
            tracing::info!(blocks = self.core.block_count(), "Sequencer stopped");
            Ok::<(), BatcherError>(())
        })
    }
}
