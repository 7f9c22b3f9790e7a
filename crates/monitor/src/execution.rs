//! Execution Core - ordered log of L2 blocks
//!
//! Blocks are numbered densely from zero and stored under big-endian keys so
//! that sled iteration order matches block order.

use crate::error::MonitorError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

const L1_CURSOR_KEY: &[u8] = b"l1_cursor";

/// Hash identifying a raw transaction
pub fn tx_hash(raw: &[u8]) -> [u8; 32] {
    *blake3::hash(raw).as_bytes()
}

/// Where a block's transactions came from
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum BlockSource {
    /// Sealed locally by the sequencer
    Sequencer,
    /// Batch submitted by an aggregator
    Batch { aggregator: [u8; 32] },
    /// Received from the sequencer feed
    Feed { sequence_number: u64 },
}

/// A block in the core's log
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct L2Block {
    pub number: u64,
    pub transactions: Vec<Vec<u8>>,
    pub source: BlockSource,
    /// L1 block the core had reached when this block was appended
    pub l1_block: u64,
    pub timestamp: i64,
    /// Signature of the submitting identity, when batched
    pub signature: Option<Vec<u8>>,
}

impl L2Block {
    pub fn tx_hashes(&self) -> impl Iterator<Item = [u8; 32]> + '_ {
        self.transactions.iter().map(|tx| tx_hash(tx))
    }
}

/// The node's execution core
pub struct ExecutionCore {
    blocks: sled::Tree,
    meta: sled::Tree,
    block_count: AtomicU64,
    l1_cursor: AtomicU64,
    append_lock: Mutex<()>,
}

impl ExecutionCore {
    pub(crate) fn open(db: &sled::Db) -> Result<Self, MonitorError> {
        let blocks = db.open_tree("blocks")?;
        let meta = db.open_tree("core_meta")?;

        let block_count = match blocks.last()? {
            Some((key, _)) => decode_number(&key) + 1,
            None => 0,
        };
        let l1_cursor = meta
            .get(L1_CURSOR_KEY)?
            .map(|v| decode_number(&v))
            .unwrap_or(0);

        Ok(Self {
            blocks,
            meta,
            block_count: AtomicU64::new(block_count),
            l1_cursor: AtomicU64::new(l1_cursor),
            append_lock: Mutex::new(()),
        })
    }

    /// Append a block at the end of the log
    pub fn append_block(
        &self,
        transactions: Vec<Vec<u8>>,
        source: BlockSource,
        signature: Option<Vec<u8>>,
    ) -> Result<L2Block, MonitorError> {
        let _guard = self.append_lock.lock();
        let number = self.block_count.load(Ordering::SeqCst);
        let block = L2Block {
            number,
            transactions,
            source,
            l1_block: self.l1_cursor(),
            timestamp: chrono::Utc::now().timestamp(),
            signature,
        };

        self.blocks
            .insert(number.to_be_bytes(), bincode::serialize(&block)?)?;
        self.block_count.store(number + 1, Ordering::SeqCst);

        tracing::debug!(
            "Appended block {} ({} txs, {:?})",
            number,
            block.transactions.len(),
            block.source
        );
        Ok(block)
    }

    /// Number of blocks in the log
    pub fn block_count(&self) -> u64 {
        self.block_count.load(Ordering::SeqCst)
    }

    pub fn block(&self, number: u64) -> Result<Option<L2Block>, MonitorError> {
        match self.blocks.get(number.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Latest L1 block processed by the inbox reader
    pub fn l1_cursor(&self) -> u64 {
        self.l1_cursor.load(Ordering::SeqCst)
    }

    /// Move the L1 cursor forward; never moves backwards
    pub fn advance_l1_cursor(&self, block: u64) -> Result<(), MonitorError> {
        let previous = self.l1_cursor.fetch_max(block, Ordering::SeqCst);
        if block > previous {
            self.meta.insert(L1_CURSOR_KEY, &block.to_be_bytes())?;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<(), MonitorError> {
        self.blocks.flush()?;
        self.meta.flush()?;
        Ok(())
    }
}

pub(crate) fn decode_number(bytes: &[u8]) -> u64 {
    let arr: [u8; 8] = bytes.try_into().unwrap_or([0u8; 8]);
    u64::from_be_bytes(arr)
}
