//! Persistence Layer for node state
//!
//! Uses the sled embedded database under the node database path. The node
//! store indexes every transaction hash to the block that included it.

use crate::error::MonitorError;
use crate::execution::{decode_number, L2Block};
use metrics::{gauge, Gauge};
use node_health::MetricsConfig;
use parking_lot::RwLock;
use sled::Db;
use std::path::Path;
use std::sync::Arc;

const INDEXED_HEIGHT_KEY: &[u8] = b"indexed_height";

/// Gauges updated as blocks are indexed
struct StoreGauges {
    indexed_blocks: Gauge,
    indexed_transactions: Gauge,
}

/// Transaction index over the execution core's blocks
pub struct NodeStore {
    /// Transaction hash -> block number
    tx_index: sled::Tree,
    /// Index progress
    meta: sled::Tree,
    gauges: RwLock<Option<StoreGauges>>,
}

impl NodeStore {
    fn open(db: &Db) -> Result<Self, MonitorError> {
        Ok(Self {
            tx_index: db.open_tree("tx_index")?,
            meta: db.open_tree("node_store_meta")?,
            gauges: RwLock::new(None),
        })
    }

    /// Number of blocks indexed so far
    pub fn indexed_height(&self) -> Result<u64, MonitorError> {
        Ok(self
            .meta
            .get(INDEXED_HEIGHT_KEY)?
            .map(|v| decode_number(&v))
            .unwrap_or(0))
    }

    /// Index one block; blocks must be indexed in order
    pub fn index_block(&self, block: &L2Block) -> Result<(), MonitorError> {
        let number = block.number.to_be_bytes();
        for hash in block.tx_hashes() {
            self.tx_index.insert(hash, &number)?;
        }
        self.meta
            .insert(INDEXED_HEIGHT_KEY, &(block.number + 1).to_be_bytes())?;

        if let Some(gauges) = self.gauges.read().as_ref() {
            gauges.indexed_blocks.set((block.number + 1) as f64);
            gauges.indexed_transactions.set(self.tx_index.len() as f64);
        }
        Ok(())
    }

    /// Block that included the transaction, if indexed
    pub fn lookup(&self, hash: &[u8; 32]) -> Result<Option<u64>, MonitorError> {
        Ok(self.tx_index.get(hash)?.map(|v| decode_number(&v)))
    }

    /// Number of indexed transactions
    pub fn tx_count(&self) -> usize {
        self.tx_index.len()
    }

    /// Export index sizes as gauges
    pub fn register_metrics(&self, config: &MetricsConfig) -> Result<(), MonitorError> {
        let gauges = StoreGauges {
            indexed_blocks: gauge!(config.name("node_store_indexed_blocks")),
            indexed_transactions: gauge!(config.name("node_store_indexed_transactions")),
        };
        gauges.indexed_blocks.set(self.indexed_height()? as f64);
        gauges.indexed_transactions.set(self.tx_count() as f64);
        *self.gauges.write() = Some(gauges);
        Ok(())
    }

    pub fn flush(&self) -> Result<(), MonitorError> {
        self.tx_index.flush()?;
        self.meta.flush()?;
        Ok(())
    }
}

/// Persistent storage for the node
pub struct NodeStorage {
    db: Db,
    node_store: Arc<NodeStore>,
}

impl NodeStorage {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MonitorError> {
        std::fs::create_dir_all(&path)?;
        let db = sled::open(&path)?;
        let node_store = Arc::new(NodeStore::open(&db)?);

        tracing::info!("Opened node database at {:?}", path.as_ref());

        Ok(Self { db, node_store })
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    /// Transaction index
    pub fn node_store(&self) -> Arc<NodeStore> {
        self.node_store.clone()
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), MonitorError> {
        self.db.flush()?;
        Ok(())
    }
}
