//! Transaction database
//!
//! Follows the execution core and indexes every new block into the node
//! store. Indexing failures are fatal and reported on the error receiver
//! returned by [`TxDb::open`].

use crate::error::BatcherError;
use l2_monitor::{ExecutionCore, NodeStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How often the core is checked for new blocks
pub const TXDB_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct TxDb {
    core: Arc<ExecutionCore>,
    node_store: Arc<NodeStore>,
    stop: CancellationToken,
}

impl TxDb {
    /// Index existing blocks and start following the core
    pub fn open(
        cancel: &CancellationToken,
        core: Arc<ExecutionCore>,
        node_store: Arc<NodeStore>,
        poll_interval: Duration,
    ) -> Result<(Arc<Self>, mpsc::Receiver<BatcherError>), BatcherError> {
        let db = Arc::new(Self {
            core,
            node_store,
            stop: cancel.child_token(),
        });
        let indexed = db.catch_up()?;
        tracing::info!(indexed, "Transaction database opened");

        let (err_tx, err_rx) = mpsc::channel(1);
        let follower = db.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = follower.stop.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = follower.catch_up() {
                            tracing::error!("transaction database indexing failed: {}", e);
                            let _ = err_tx.send(e).await;
                            break;
                        }
                    }
                }
            }
        });

        Ok((db, err_rx))
    }

    /// Index blocks the node store has not seen, returning how many
    fn catch_up(&self) -> Result<u64, BatcherError> {
        let from = self.node_store.indexed_height()?;
        let to = self.core.block_count();
        for number in from..to {
            let block = self
                .core
                .block(number)?
                .ok_or(BatcherError::MissingBlock(number))?;
            self.node_store.index_block(&block)?;
        }
        Ok(to.saturating_sub(from))
    }

    pub fn core(&self) -> Arc<ExecutionCore> {
        self.core.clone()
    }

    /// Block that included a transaction
    pub fn transaction_block(&self, hash: &[u8; 32]) -> Result<Option<u64>, BatcherError> {
        Ok(self.node_store.lookup(hash)?)
    }

    /// Number of indexed blocks
    pub fn block_height(&self) -> Result<u64, BatcherError> {
        Ok(self.node_store.indexed_height()?)
    }

    /// Stop following the core and flush the index
    pub fn close(&self) -> Result<(), BatcherError> {
        self.stop.cancel();
        self.node_store.flush()?;
        tracing::info!("Transaction database closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use l2_monitor::{tx_hash, BlockSource, Monitor};
    use tempfile::{tempdir, TempDir};

    fn open_monitor() -> (TempDir, Monitor) {
        let dir = tempdir().unwrap();
        let machine = dir.path().join("machine.bin");
        std::fs::write(&machine, b"machine").unwrap();
        let monitor = Monitor::open(dir.path().join("db"), &machine).unwrap();
        (dir, monitor)
    }

    #[tokio::test(start_paused = true)]
    async fn test_indexes_existing_and_new_blocks() {
        let (_dir, monitor) = open_monitor();
        let core = monitor.core();
        core.append_block(vec![b"early".to_vec()], BlockSource::Sequencer, None)
            .unwrap();

        let cancel = CancellationToken::new();
        let (db, _errors) = TxDb::open(
            &cancel,
            core.clone(),
            monitor.storage().node_store(),
            TXDB_POLL_INTERVAL,
        )
        .unwrap();
        assert_eq!(db.transaction_block(&tx_hash(b"early")).unwrap(), Some(0));

        core.append_block(vec![b"late".to_vec()], BlockSource::Sequencer, None)
            .unwrap();
        tokio::time::sleep(TXDB_POLL_INTERVAL * 2).await;
        assert_eq!(db.transaction_block(&tx_hash(b"late")).unwrap(), Some(1));
        assert_eq!(db.block_height().unwrap(), 2);

        db.close().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_indexing() {
        let (_dir, monitor) = open_monitor();
        let core = monitor.core();
        let cancel = CancellationToken::new();
        let (db, mut errors) = TxDb::open(
            &cancel,
            core.clone(),
            monitor.storage().node_store(),
            TXDB_POLL_INTERVAL,
        )
        .unwrap();

        db.close().unwrap();
        core.append_block(vec![b"after".to_vec()], BlockSource::Sequencer, None)
            .unwrap();
        tokio::time::sleep(TXDB_POLL_INTERVAL * 2).await;
        assert_eq!(db.block_height().unwrap(), 0);

        // Follower exited without reporting an error
        assert!(errors.recv().await.is_none());
    }
}
