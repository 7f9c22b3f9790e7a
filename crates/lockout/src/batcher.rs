//! Lockout batcher
//!
//! Wraps a sequencer so that only the lease holder seals blocks. While
//! another instance holds the lease, transactions are forwarded to the
//! holder's RPC URL. The lease is only contended for once the inbox reader
//! has caught up with L1.

use crate::config::{LockoutConfig, LockoutTiming};
use crate::error::LockoutError;
use crate::store::{LockoutStore, RedisLockoutStore};
use async_trait::async_trait;
use l2_batcher::{BatcherError, ForwarderBatcher, SequencerBatcher, TransactionBatcher};
use l2_monitor::{ExecutionCore, InboxReader};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct LockoutBatcher {
    inner: Arc<SequencerBatcher>,
    core: Arc<ExecutionCore>,
    inbox_reader: Arc<InboxReader>,
    store: Arc<dyn LockoutStore>,
    config: LockoutConfig,
    timing: LockoutTiming,
    err_sink: mpsc::Sender<anyhow::Error>,
    /// Forwarder to the current holder, keyed by its URL
    forwarder: Mutex<Option<Arc<ForwarderBatcher>>>,
}

impl LockoutBatcher {
    /// Wrap `inner`; it stays inactive until the lease is won
    pub fn new(
        inner: Arc<SequencerBatcher>,
        core: Arc<ExecutionCore>,
        inbox_reader: Arc<InboxReader>,
        store: Arc<dyn LockoutStore>,
        config: LockoutConfig,
        timing: LockoutTiming,
        err_sink: mpsc::Sender<anyhow::Error>,
    ) -> Self {
        inner.set_active(false);
        Self {
            inner,
            core,
            inbox_reader,
            store,
            config,
            timing,
            err_sink,
            forwarder: Mutex::new(None),
        }
    }

    /// Whether this instance holds the lease
    pub fn is_holder(&self) -> bool {
        self.inner.is_active()
    }

    fn forwarder_for(&self, url: &str) -> Result<Arc<ForwarderBatcher>, BatcherError> {
        let mut cached = self.forwarder.lock();
        if let Some(forwarder) = cached.as_ref().filter(|f| f.target_url() == url) {
            return Ok(forwarder.clone());
        }
        let forwarder = Arc::new(ForwarderBatcher::new(url)?);
        *cached = Some(forwarder.clone());
        Ok(forwarder)
    }

    /// Bound a store call by the configured timeout
    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, LockoutError>>,
    ) -> Result<T, LockoutError> {
        tokio::time::timeout(self.timing.store_timeout, call)
            .await
            .unwrap_or(Err(LockoutError::Timeout(self.timing.store_timeout)))
    }

    /// Stop sealing and report the lease as lost
    async fn step_down(&self, confirmed: Instant) {
        self.inner.set_active(false);
        let _ = self
            .err_sink
            .send(LockoutError::LeaseExpired(confirmed.elapsed()).into())
            .await;
    }

    async fn run_lockout(&self, cancel: CancellationToken) {
        let me = self.config.self_rpc_url.as_str();
        let hold_limit = self.timing.hold_limit();
        let mut interval = tokio::time::interval(self.timing.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Issue time of the last successful acquire or renew
        let mut confirmed = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if self.is_holder() {
                if confirmed.elapsed() >= hold_limit {
                    self.step_down(confirmed).await;
                    return;
                }
                let issued = Instant::now();
                match self.bounded(self.store.renew(me, self.timing.lease)).await {
                    Ok(true) => confirmed = issued,
                    Ok(false) => {
                        tracing::warn!("Lockout lease lost to another sequencer");
                        self.inner.set_active(false);
                    }
                    Err(e) => {
                        tracing::warn!("failed to renew lockout lease: {}", e);
                        if confirmed.elapsed() >= hold_limit {
                            self.step_down(confirmed).await;
                            return;
                        }
                    }
                }
            } else if self.inbox_reader.is_caught_up() {
                let issued = Instant::now();
                match self.bounded(self.store.try_acquire(me, self.timing.lease)).await {
                    Ok(true) => {
                        confirmed = issued;
                        self.inner.set_active(true);
                        tracing::info!(
                            rpc_url = me,
                            height = self.core.block_count(),
                            "Acquired sequencer lockout"
                        );
                    }
                    Ok(false) => {}
                    Err(e) => tracing::warn!("failed to acquire lockout lease: {}", e),
                }
            }
        }

        if self.is_holder() {
            self.inner.set_active(false);
            match self.bounded(self.store.release(me)).await {
                Ok(_) => tracing::info!("Released sequencer lockout"),
                Err(e) => tracing::warn!("failed to release lockout lease: {}", e),
            }
        }
    }
}

#[async_trait]
impl TransactionBatcher for LockoutBatcher {
    fn name(&self) -> &'static str {
        "lockout sequencer"
    }

    async fn send_transaction(&self, raw: Vec<u8>) -> Result<[u8; 32], BatcherError> {
        if self.is_holder() {
            return self.inner.send_transaction(raw).await;
        }

        let holder = self.store.holder().await.map_err(|e| BatcherError::Forward {
            url: self.config.redis.clone(),
            message: e.to_string(),
        })?;
        match holder {
            Some(url) if url != self.config.self_rpc_url => {
                self.forwarder_for(&url)?.send_transaction(raw).await
            }
            _ => Err(BatcherError::Inactive),
        }
    }

    fn pending_count(&self) -> usize {
        self.inner.pending_count()
    }

    fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<Result<(), BatcherError>> {
        tokio::spawn(async move {
            let mut inner = self.inner.clone().start(cancel.clone());
            tokio::select! {
                result = &mut inner => return flatten(result),
                _ = self.run_lockout(cancel.clone()) => {}
            }
            flatten(inner.await)
        })
    }
}

fn flatten(
    result: Result<Result<(), BatcherError>, tokio::task::JoinError>,
) -> Result<(), BatcherError> {
    result.map_err(|e| BatcherError::Task(e.to_string()))?
}

/// Wrap a sequencer with a Redis lockout
///
/// Fails when the store cannot be reached; callers rebuild the sequencer and
/// try again.
pub async fn setup_lockout(
    cancel: &CancellationToken,
    sequencer: Arc<SequencerBatcher>,
    core: Arc<ExecutionCore>,
    inbox_reader: Arc<InboxReader>,
    config: &LockoutConfig,
    err_sink: mpsc::Sender<anyhow::Error>,
) -> Result<Arc<LockoutBatcher>, LockoutError> {
    let store = RedisLockoutStore::open(&config.redis_url())?;
    let holder = tokio::select! {
        _ = cancel.cancelled() => return Err(LockoutError::Cancelled("connecting to lockout store")),
        holder = store.holder() => holder?,
    };
    tracing::info!(
        redis = %config.redis,
        rpc_url = %config.self_rpc_url,
        holder = ?holder,
        "Connected to lockout store"
    );

    Ok(Arc::new(LockoutBatcher::new(
        sequencer,
        core,
        inbox_reader,
        Arc::new(store),
        config.clone(),
        LockoutTiming::default(),
        err_sink,
    )))
}
