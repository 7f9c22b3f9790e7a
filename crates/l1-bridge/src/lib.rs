//! L1 Bridge - connectivity to the settlement layer
//!
//! Handles everything the node needs from L1 before batching:
//! - JSON-RPC client for slot height and account balances
//! - Loading the batch-signing identity from a keystore file
//! - Blocking until the signing identity is funded

pub mod balance;
pub mod client;
pub mod error;
pub mod keystore;

pub use balance::{wait_for_balance, BALANCE_POLL_INTERVAL};
pub use client::{L1Client, RpcL1Client};
pub use error::L1Error;
pub use keystore::{load_keystore, DataSigner, Wallet};
pub use solana_pubkey::Pubkey;
