//! Batch Submitter - aggregator batching loop
//!
//! Queues incoming transactions and every `max_batch_time` seals the queue
//! into a signed batch appended to the execution core. The stateful variant
//! remembers pending transaction hashes and drops resubmissions.

use crate::batcher::{TransactionBatcher, TxQueue};
use crate::error::BatcherError;
use crate::{MAX_TXS_PER_BATCH, TX_QUEUE_CAPACITY};
use async_trait::async_trait;
use l1_bridge::{DataSigner, Pubkey};
use l2_monitor::{tx_hash, BlockSource, ExecutionCore, L2Block};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct BatchSubmitter {
    core: Arc<ExecutionCore>,
    signer: DataSigner,
    aggregator: Pubkey,
    inbox_address: Pubkey,
    max_batch_time: Duration,
    queue: TxQueue,
    /// Hashes queued but not yet sealed; only tracked when stateful
    pending: Option<Mutex<HashSet<[u8; 32]>>>,
}

impl BatchSubmitter {
    pub fn new(
        core: Arc<ExecutionCore>,
        signer: DataSigner,
        aggregator: Pubkey,
        inbox_address: Pubkey,
        max_batch_time: Duration,
        stateful: bool,
    ) -> Self {
        Self {
            core,
            signer,
            aggregator,
            inbox_address,
            max_batch_time,
            queue: TxQueue::new(TX_QUEUE_CAPACITY),
            pending: stateful.then(|| Mutex::new(HashSet::new())),
        }
    }

    pub fn is_stateful(&self) -> bool {
        self.pending.is_some()
    }

    pub fn inbox_address(&self) -> &Pubkey {
        &self.inbox_address
    }

    /// Seal queued transactions into a signed batch
    pub fn seal_batch(&self) -> Result<Option<L2Block>, BatcherError> {
        let txs = self.queue.drain(MAX_TXS_PER_BATCH);
        if txs.is_empty() {
            return Ok(None);
        }

        let digest: Vec<u8> = txs.iter().flat_map(|tx| tx_hash(tx)).collect();
        let signature = (self.signer)(&digest);

        if let Some(pending) = &self.pending {
            let mut pending = pending.lock();
            for tx in &txs {
                pending.remove(&tx_hash(tx));
            }
        }

        let block = self.core.append_block(
            txs,
            BlockSource::Batch {
                aggregator: self.aggregator.to_bytes(),
            },
            Some(signature),
        )?;
        tracing::debug!(
            "Sealed batch {} with {} txs for inbox {}",
            block.number,
            block.transactions.len(),
            self.inbox_address
        );
        Ok(Some(block))
    }
}

#[async_trait]
impl TransactionBatcher for BatchSubmitter {
    fn name(&self) -> &'static str {
        if self.is_stateful() {
            "stateful aggregator"
        } else {
            "stateless aggregator"
        }
    }

    async fn send_transaction(&self, raw: Vec<u8>) -> Result<[u8; 32], BatcherError> {
        if raw.is_empty() {
            return Err(BatcherError::EmptyTransaction);
        }
        let hash = tx_hash(&raw);

        match &self.pending {
            Some(pending) => {
                let mut pending = pending.lock();
                if !pending.insert(hash) {
                    tracing::debug!("Dropping resubmitted transaction");
                    return Ok(hash);
                }
                if let Err(e) = self.queue.push(raw) {
                    pending.remove(&hash);
                    return Err(e);
                }
            }
            None => self.queue.push(raw)?,
        }
        Ok(hash)
    }

    fn pending_count(&self) -> usize {
        self.queue.len()
    }

    fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<Result<(), BatcherError>> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.max_batch_time);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                "Batch submitter started ({}, every {:?})",
                self.name(),
                self.max_batch_time
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        self.seal_batch()?;
                    }
                }
            }

            // Seal whatever is left so accepted transactions are not lost
            self.seal_batch()?;
            tracing::info!("Batch submitter stopped");
            Ok::<(), BatcherError>(())
        })
    }
}
