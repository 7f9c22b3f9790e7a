//! Fire-and-forget health event sink
//!
//! Publishing never waits: a full or closed channel drops the event.

use crate::event::HealthEvent;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Capacity of the health event channel
pub const LARGE_CHANNEL_BUFFER: usize = 200;

/// Create a bounded health event channel
pub fn health_channel(capacity: usize) -> (HealthSink, mpsc::Receiver<HealthEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (HealthSink { tx }, rx)
}

/// Sending half of the health event channel
#[derive(Clone, Debug)]
pub struct HealthSink {
    tx: mpsc::Sender<HealthEvent>,
}

impl HealthSink {
    /// Publish an event, returning whether it was accepted
    pub fn publish(&self, event: HealthEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(?event, "health channel full; dropping event");
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::debug!(?event, "health channel closed; dropping event");
                false
            }
        }
    }

    /// Report the status of a component
    pub fn status(&self, component: &str, healthy: bool, detail: Option<String>) -> bool {
        self.publish(HealthEvent::status(component, healthy, detail))
    }
}
