//! L2 Lockout - leader election between redundant sequencers
//!
//! Sequencer instances race for a lease in a shared store. The holder is the
//! only instance that seals blocks; the others forward transactions to it.
//! The lease value is the holder's public RPC URL.

pub mod batcher;
pub mod config;
pub mod error;
pub mod store;

pub use batcher::{setup_lockout, LockoutBatcher};
pub use config::{LockoutConfig, LockoutTiming};
pub use error::LockoutError;
pub use store::{LockoutStore, MemoryLockoutStore, RedisLockoutStore};
