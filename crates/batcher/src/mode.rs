//! Batcher mode descriptor

use l1_bridge::{Pubkey, Wallet};
use std::sync::Arc;

/// Which batcher a node runs
///
/// Exactly one variant is chosen per process and never changes.
#[derive(Debug, Clone)]
pub enum BatcherMode {
    /// Forward every transaction to another node
    Forwarder { target_url: String },
    /// Order transactions into blocks, possibly under lockout
    Sequencer {
        auth: Arc<Wallet>,
        delayed_messages_target_delay: u64,
        create_batch_block_interval: u64,
    },
    /// Batch and submit, tracking pending submissions locally
    StatefulAggregator { auth: Arc<Wallet>, inbox_address: Pubkey },
    /// Batch and submit without local submission state
    StatelessAggregator { auth: Arc<Wallet>, inbox_address: Pubkey },
}

impl BatcherMode {
    pub fn name(&self) -> &'static str {
        match self {
            BatcherMode::Forwarder { .. } => "forwarder",
            BatcherMode::Sequencer { .. } => "sequencer",
            BatcherMode::StatefulAggregator { .. } => "stateful aggregator",
            BatcherMode::StatelessAggregator { .. } => "stateless aggregator",
        }
    }

    /// Signing identity, absent for forwarders
    pub fn auth(&self) -> Option<&Arc<Wallet>> {
        match self {
            BatcherMode::Forwarder { .. } => None,
            BatcherMode::Sequencer { auth, .. }
            | BatcherMode::StatefulAggregator { auth, .. }
            | BatcherMode::StatelessAggregator { auth, .. } => Some(auth),
        }
    }

    pub fn is_sequencer(&self) -> bool {
        matches!(self, BatcherMode::Sequencer { .. })
    }
}
