//! L2 Monitor - node database and execution core
//!
//! This crate owns the node's persistent state:
//! - sled-backed ordered log of L2 blocks (the execution core)
//! - Node store indexing transactions by hash
//! - Inbox reader tracking L1 progress and sequencer feed messages

pub mod error;
pub mod execution;
pub mod feed;
pub mod inbox_reader;
pub mod monitor;
pub mod storage;

pub use error::MonitorError;
pub use execution::{tx_hash, BlockSource, ExecutionCore, L2Block};
pub use feed::{feed_channel, FeedClient, FeedMessage};
pub use inbox_reader::{InboxReader, INBOX_POLL_INTERVAL};
pub use monitor::Monitor;
pub use storage::{NodeStorage, NodeStore};
