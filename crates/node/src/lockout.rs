//! Batcher construction with optional lockout
//!
//! Building the batcher and wrapping it with a lockout form one attempt. If
//! the wrap fails the sequencer it was given is discarded and the next
//! attempt builds a fresh one.

use async_trait::async_trait;
use l1_bridge::{DataSigner, L1Client, Pubkey};
use l2_batcher::{
    setup_batcher, BatcherHandle, BatcherMode, SequencerBatcher, TransactionBatcher, TxDb,
};
use l2_lockout::{setup_lockout, LockoutConfig};
use l2_monitor::{ExecutionCore, InboxReader};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The two steps of a batcher construction attempt
#[async_trait]
pub trait BatcherFactory: Send + Sync {
    /// Build the batcher for the resolved mode
    async fn build(&self) -> anyhow::Result<BatcherHandle>;

    /// Put a freshly built sequencer under lockout
    async fn wrap(
        &self,
        sequencer: Arc<SequencerBatcher>,
        lockout: &LockoutConfig,
    ) -> anyhow::Result<Arc<dyn TransactionBatcher>>;
}

/// One construction attempt: build, then wrap when lockout is configured
pub async fn construct_batcher(
    factory: &dyn BatcherFactory,
    lockout: Option<&LockoutConfig>,
) -> anyhow::Result<Arc<dyn TransactionBatcher>> {
    match (factory.build().await?, lockout) {
        (BatcherHandle::Sequencer(sequencer), Some(lockout)) => {
            factory.wrap(sequencer, lockout).await
        }
        (handle, _) => Ok(handle.into_dyn()),
    }
}

/// Builds batchers from the node's running subsystems
pub struct NodeBatcherFactory<'a> {
    pub cancel: &'a CancellationToken,
    pub l1: Arc<dyn L1Client>,
    pub rollup: Pubkey,
    pub chain_id: u64,
    pub db: &'a Arc<TxDb>,
    pub max_batch_time: Duration,
    pub mode: &'a BatcherMode,
    pub signer: Option<DataSigner>,
    pub core: Arc<ExecutionCore>,
    pub inbox_reader: Arc<InboxReader>,
    /// Where the lockout reports a lost store
    pub err_sink: mpsc::Sender<anyhow::Error>,
}

#[async_trait]
impl BatcherFactory for NodeBatcherFactory<'_> {
    async fn build(&self) -> anyhow::Result<BatcherHandle> {
        let handle = setup_batcher(
            self.cancel,
            self.l1.clone(),
            self.rollup,
            self.chain_id,
            self.db,
            self.max_batch_time,
            self.mode,
            self.signer.clone(),
        )
        .await?;
        Ok(handle)
    }

    async fn wrap(
        &self,
        sequencer: Arc<SequencerBatcher>,
        lockout: &LockoutConfig,
    ) -> anyhow::Result<Arc<dyn TransactionBatcher>> {
        let batcher: Arc<dyn TransactionBatcher> = setup_lockout(
            self.cancel,
            sequencer,
            self.core.clone(),
            self.inbox_reader.clone(),
            lockout,
            self.err_sink.clone(),
        )
        .await?;
        Ok(batcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{retry_until_ready, RETRY_DELAY};
    use l1_bridge::Wallet;
    use l2_batcher::SequencerConfig;
    use l2_monitor::Monitor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{tempdir, TempDir};

    struct CountingFactory {
        _dir: TempDir,
        monitor: Monitor,
        sequencer: bool,
        wrap_failures: usize,
        builds: AtomicUsize,
        wraps: AtomicUsize,
    }

    impl CountingFactory {
        fn new(sequencer: bool, wrap_failures: usize) -> Self {
            let dir = tempdir().unwrap();
            let machine = dir.path().join("machine.bin");
            std::fs::write(&machine, b"machine").unwrap();
            let monitor = Monitor::open(dir.path().join("db"), &machine).unwrap();
            Self {
                _dir: dir,
                monitor,
                sequencer,
                wrap_failures,
                builds: AtomicUsize::new(0),
                wraps: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BatcherFactory for CountingFactory {
        async fn build(&self) -> anyhow::Result<BatcherHandle> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            let wallet = Arc::new(Wallet::from_secret([1u8; 32]));
            let handle = if self.sequencer {
                BatcherHandle::Sequencer(Arc::new(SequencerBatcher::new(
                    self.monitor.core(),
                    wallet.signer(),
                    wallet.address(),
                    SequencerConfig {
                        block_time: Duration::from_secs(1),
                        create_batch_block_interval: 10,
                        delayed_messages_target_delay: 1,
                    },
                )))
            } else {
                BatcherHandle::Forwarder(Arc::new(l2_batcher::ForwarderBatcher::new(
                    "http://127.0.0.1:1",
                )?))
            };
            Ok(handle)
        }

        async fn wrap(
            &self,
            sequencer: Arc<SequencerBatcher>,
            _lockout: &LockoutConfig,
        ) -> anyhow::Result<Arc<dyn TransactionBatcher>> {
            if self.wraps.fetch_add(1, Ordering::SeqCst) < self.wrap_failures {
                anyhow::bail!("redis unreachable");
            }
            let batcher: Arc<dyn TransactionBatcher> = sequencer;
            Ok(batcher)
        }
    }

    fn lockout() -> LockoutConfig {
        LockoutConfig::new("r:6379", "http://self:8547").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrap_failure_rebuilds_batcher() {
        let factory = CountingFactory::new(true, 2);
        let lockout = lockout();
        let cancel = CancellationToken::new();

        let batcher = retry_until_ready(&cancel, "setup batcher", "mode=sequencer", RETRY_DELAY, || {
            construct_batcher(&factory, Some(&lockout))
        })
        .await
        .unwrap();

        assert_eq!(batcher.name(), "sequencer");
        assert_eq!(factory.builds.load(Ordering::SeqCst), 3);
        assert_eq!(factory.wraps.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_lockout_skips_wrap() {
        let factory = CountingFactory::new(true, 0);
        construct_batcher(&factory, None).await.unwrap();
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert_eq!(factory.wraps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_sequencer_never_wrapped() {
        let factory = CountingFactory::new(false, 0);
        let batcher = construct_batcher(&factory, Some(&lockout())).await.unwrap();
        assert_eq!(batcher.name(), "forwarder");
        assert_eq!(factory.wraps.load(Ordering::SeqCst), 0);
    }
}
