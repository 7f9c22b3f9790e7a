//! L2 Batcher - transaction intake for every node role
//!
//! - [`BatcherMode`]: which batcher a node runs, resolved once at startup
//! - Forwarder, aggregator and sequencer batchers behind [`TransactionBatcher`]
//! - [`TxDb`]: indexes blocks appended to the execution core

pub mod aggregator;
pub mod batcher;
pub mod error;
pub mod forwarder;
pub mod mode;
pub mod sequencer;
pub mod setup;
pub mod txdb;

pub use aggregator::BatchSubmitter;
pub use batcher::{BatcherHandle, TransactionBatcher};
pub use error::BatcherError;
pub use forwarder::ForwarderBatcher;
pub use mode::BatcherMode;
pub use sequencer::{SequencerBatcher, SequencerConfig};
pub use setup::setup_batcher;
pub use txdb::{TxDb, TXDB_POLL_INTERVAL};

/// Maximum transactions sealed into one block or batch
pub const MAX_TXS_PER_BATCH: usize = 512;

/// Capacity of a batcher's intake queue
pub const TX_QUEUE_CAPACITY: usize = 4096;
