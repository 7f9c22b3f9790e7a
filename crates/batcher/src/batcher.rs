//! Transaction batcher interface

use crate::aggregator::BatchSubmitter;
use crate::error::BatcherError;
use crate::forwarder::ForwarderBatcher;
use crate::sequencer::SequencerBatcher;
use async_trait::async_trait;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Accepts raw L2 transactions on behalf of the node
#[async_trait]
pub trait TransactionBatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Queue or forward a transaction, returning its hash
    async fn send_transaction(&self, raw: Vec<u8>) -> Result<[u8; 32], BatcherError>;

    /// Transactions accepted but not yet sealed
    fn pending_count(&self) -> usize;

    /// Launch the run loop; the handle resolves with its fatal error, if any
    fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<Result<(), BatcherError>>;
}

/// Concrete batcher built by [`crate::setup_batcher`]
#[derive(Clone)]
pub enum BatcherHandle {
    Forwarder(Arc<ForwarderBatcher>),
    Aggregator(Arc<BatchSubmitter>),
    Sequencer(Arc<SequencerBatcher>),
}

impl BatcherHandle {
    pub fn into_dyn(self) -> Arc<dyn TransactionBatcher> {
        match self {
            BatcherHandle::Forwarder(b) => b,
            BatcherHandle::Aggregator(b) => b,
            BatcherHandle::Sequencer(b) => b,
        }
    }
}

/// Bounded intake queue shared by the sealing batchers
pub(crate) struct TxQueue {
    sender: Sender<Vec<u8>>,
    receiver: Receiver<Vec<u8>>,
}

impl TxQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    pub(crate) fn push(&self, raw: Vec<u8>) -> Result<(), BatcherError> {
        self.sender.try_send(raw).map_err(|e| match e {
            TrySendError::Full(_) | TrySendError::Disconnected(_) => BatcherError::QueueFull,
        })
    }

    /// Take up to `max` queued transactions
    pub(crate) fn drain(&self, max: usize) -> Vec<Vec<u8>> {
        let mut txs = Vec::new();
        while txs.len() < max {
            match self.receiver.try_recv() {
                Ok(tx) => txs.push(tx),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        txs
    }

    pub(crate) fn len(&self) -> usize {
        self.receiver.len()
    }
}
