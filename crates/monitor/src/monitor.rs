//! Monitor - owner of the node database and execution core

use crate::error::MonitorError;
use crate::execution::ExecutionCore;
use crate::feed::FeedMessage;
use crate::inbox_reader::InboxReader;
use crate::storage::NodeStorage;
use l1_bridge::{L1Client, Pubkey};
use node_health::HealthSink;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub struct Monitor {
    storage: NodeStorage,
    core: Arc<ExecutionCore>,
    machine_hash: [u8; 32],
}

impl Monitor {
    /// Open the node database and load the rollup machine
    pub fn open<D: AsRef<Path>, M: AsRef<Path>>(
        db_path: D,
        machine_file: M,
    ) -> Result<Self, MonitorError> {
        let machine = std::fs::read(machine_file.as_ref()).map_err(|source| {
            MonitorError::Machine {
                path: machine_file.as_ref().display().to_string(),
                source,
            }
        })?;
        let machine_hash = *blake3::hash(&machine).as_bytes();

        let storage = NodeStorage::open(db_path)?;
        let core = Arc::new(ExecutionCore::open(storage.db())?);

        tracing::info!(
            blocks = core.block_count(),
            l1_cursor = core.l1_cursor(),
            machine = %blake3::Hash::from(machine_hash).to_hex(),
            "Monitor opened"
        );

        Ok(Self {
            storage,
            core,
            machine_hash,
        })
    }

    pub fn core(&self) -> Arc<ExecutionCore> {
        self.core.clone()
    }

    pub fn storage(&self) -> &NodeStorage {
        &self.storage
    }

    /// blake3 hash of the rollup machine file
    pub fn machine_hash(&self) -> [u8; 32] {
        self.machine_hash
    }

    /// Connect an inbox reader to L1 and start it
    ///
    /// Fails when L1 is unreachable; callers retry.
    #[allow(clippy::too_many_arguments)]
    pub async fn start_inbox_reader(
        &self,
        cancel: &CancellationToken,
        l1: Arc<dyn L1Client>,
        rollup: Pubkey,
        from_block: u64,
        bridge_utils: Pubkey,
        health: HealthSink,
        feed: Option<&broadcast::Sender<FeedMessage>>,
    ) -> Result<Arc<InboxReader>, MonitorError> {
        let latest = l1.latest_block().await?;
        self.core.advance_l1_cursor(from_block)?;

        let reader = Arc::new(InboxReader::new(
            self.core.clone(),
            l1,
            rollup,
            bridge_utils,
            health,
            latest,
        ));
        reader.start(cancel.clone(), feed.map(|hub| hub.subscribe()));
        Ok(reader)
    }

    /// Flush the database
    pub fn close(&self) -> Result<(), MonitorError> {
        self.core.flush()?;
        self.storage.node_store().flush()?;
        self.storage.flush()?;
        tracing::info!("Monitor closed");
        Ok(())
    }
}
