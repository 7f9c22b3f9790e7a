//! Inbox Reader - tracks L1 progress and applies sequencer feed messages
//!
//! The reader polls L1 for the latest block and walks the core's L1 cursor
//! towards it in bounded steps. Once the cursor reaches the L1 head the reader
//! is caught up; sequencers wait for that before producing blocks.

use crate::error::MonitorError;
use crate::execution::{BlockSource, ExecutionCore};
use crate::feed::FeedMessage;
use l1_bridge::{L1Client, Pubkey};
use node_health::HealthSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

/// Interval between L1 polls
pub const INBOX_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Largest cursor step taken in one poll
const MAX_BLOCKS_PER_POLL: u64 = 1000;

/// Health component names
const INBOX_COMPONENT: &str = "inboxReader";
const CAUGHT_UP_COMPONENT: &str = "inboxReaderCaughtUp";

/// Running inbox reader
pub struct InboxReader {
    core: Arc<ExecutionCore>,
    l1: Arc<dyn L1Client>,
    rollup: Pubkey,
    bridge_utils: Pubkey,
    health: HealthSink,
    caught_up: watch::Sender<bool>,
    latest_l1: AtomicU64,
}

impl InboxReader {
    pub(crate) fn new(
        core: Arc<ExecutionCore>,
        l1: Arc<dyn L1Client>,
        rollup: Pubkey,
        bridge_utils: Pubkey,
        health: HealthSink,
        latest_l1: u64,
    ) -> Self {
        let (caught_up, _) = watch::channel(false);
        Self {
            core,
            l1,
            rollup,
            bridge_utils,
            health,
            caught_up,
            latest_l1: AtomicU64::new(latest_l1),
        }
    }

    /// Spawn the polling loop
    pub(crate) fn start(
        self: &Arc<Self>,
        cancel: CancellationToken,
        feed: Option<broadcast::Receiver<FeedMessage>>,
    ) {
        let reader = self.clone();
        tokio::spawn(async move { reader.run(cancel, feed).await });
    }

    pub fn rollup(&self) -> &Pubkey {
        &self.rollup
    }

    pub fn bridge_utils(&self) -> &Pubkey {
        &self.bridge_utils
    }

    /// Latest L1 block observed
    pub fn latest_l1_block(&self) -> u64 {
        self.latest_l1.load(Ordering::SeqCst)
    }

    pub fn is_caught_up(&self) -> bool {
        *self.caught_up.borrow()
    }

    /// Block until the core has processed L1 up to the observed head
    pub async fn wait_to_catch_up(&self, cancel: &CancellationToken) -> Result<(), MonitorError> {
        let mut rx = self.caught_up.subscribe();
        tokio::select! {
            _ = cancel.cancelled() => Err(MonitorError::Cancelled("waiting for inbox reader to catch up")),
            result = rx.wait_for(|caught_up| *caught_up) => {
                result.map(|_| ()).map_err(|_| MonitorError::Cancelled("waiting for inbox reader to catch up"))
            }
        }
    }

    async fn run(
        self: Arc<Self>,
        cancel: CancellationToken,
        mut feed: Option<broadcast::Receiver<FeedMessage>>,
    ) {
        let mut interval = tokio::time::interval(INBOX_POLL_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut l1_healthy = true;
        let mut last_sequence: Option<u64> = None;

        tracing::info!(rollup = %self.rollup, "Inbox reader started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let result = self.poll_l1().await;
                    if result.is_ok() != l1_healthy {
                        l1_healthy = result.is_ok();
                        self.health.status(
                            INBOX_COMPONENT,
                            l1_healthy,
                            result.as_ref().err().map(|e| e.to_string()),
                        );
                    }
                    if let Err(e) = result {
                        tracing::warn!("inbox reader poll failed: {}", e);
                    }
                }
                received = recv_feed(&mut feed) => match received {
                    Ok(message) => {
                        if let Err(e) = self.apply_feed(&message, &mut last_sequence) {
                            tracing::warn!(seq = message.sequence_number, "failed to apply feed message: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("inbox reader lagged {} feed messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => feed = None,
                },
            }
        }

        tracing::info!("Inbox reader stopped");
    }

    async fn poll_l1(&self) -> Result<(), MonitorError> {
        let latest = self.l1.latest_block().await?;
        self.latest_l1.store(latest, Ordering::SeqCst);

        let target = latest.min(self.core.l1_cursor().saturating_add(MAX_BLOCKS_PER_POLL));
        self.core.advance_l1_cursor(target)?;

        if self.core.l1_cursor() >= latest {
            let newly = self.caught_up.send_if_modified(|caught_up| {
                let changed = !*caught_up;
                *caught_up = true;
                changed
            });
            if newly {
                tracing::info!(l1_block = latest, "Inbox reader caught up");
                self.health.status(CAUGHT_UP_COMPONENT, true, None);
            }
        }
        Ok(())
    }

    fn apply_feed(
        &self,
        message: &FeedMessage,
        last_sequence: &mut Option<u64>,
    ) -> Result<(), MonitorError> {
        if last_sequence.is_some_and(|last| message.sequence_number <= last) {
            return Ok(());
        }
        let raw = message.decode_transaction().map_err(|e| MonitorError::Feed {
            url: "hub".to_string(),
            message: e.to_string(),
        })?;
        self.core.append_block(
            vec![raw],
            BlockSource::Feed {
                sequence_number: message.sequence_number,
            },
            None,
        )?;
        *last_sequence = Some(message.sequence_number);
        Ok(())
    }
}

async fn recv_feed(
    feed: &mut Option<broadcast::Receiver<FeedMessage>>,
) -> Result<FeedMessage, broadcast::error::RecvError> {
    match feed {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
