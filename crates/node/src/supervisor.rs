//! Runtime supervision
//!
//! Once every subsystem is running the node waits on three sources: the
//! transaction database's fatal errors, fatal errors from the batcher and the
//! public servers, and cancellation. The first to fire ends the node, and
//! deferred releases then run in reverse acquisition order.

use l2_batcher::BatcherError;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Supervisor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Draining,
    Terminated,
}

type Release = Box<dyn FnOnce() + Send>;

/// Deferred release actions
///
/// Actions run last-in first-out, either through [`ReleaseStack::release_all`]
/// or when the stack is dropped on an early return.
#[derive(Default)]
pub struct ReleaseStack {
    actions: Vec<(&'static str, Release)>,
}

impl ReleaseStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action to run at shutdown
    pub fn defer(&mut self, name: &'static str, action: impl FnOnce() + Send + 'static) {
        self.actions.push((name, Box::new(action)));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every pending action, newest first
    pub fn release_all(&mut self) {
        while let Some((name, action)) = self.actions.pop() {
            tracing::debug!(resource = name, "releasing");
            action();
        }
    }
}

impl Drop for ReleaseStack {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Why the node stopped
#[derive(Debug)]
pub enum Termination {
    /// The shared cancellation token fired
    Cancelled,
    /// A running subsystem failed
    Fatal(anyhow::Error),
}

/// Owns the node's releases while it runs
pub struct Supervisor {
    state: watch::Sender<SupervisorState>,
    releases: ReleaseStack,
}

impl Supervisor {
    pub fn new(releases: ReleaseStack) -> Self {
        let (state, _) = watch::channel(SupervisorState::Starting);
        Self { state, releases }
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SupervisorState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(?previous, ?next, "supervisor state");
    }

    /// Wait for the first termination cause, then release everything
    ///
    /// A closed error channel stops being watched; it does not end the node.
    pub async fn run(
        mut self,
        cancel: &CancellationToken,
        mut txdb_errors: mpsc::Receiver<BatcherError>,
        mut errors: mpsc::Receiver<anyhow::Error>,
    ) -> Termination {
        self.transition(SupervisorState::Running);

        let termination = tokio::select! {
            biased;
            Some(e) = txdb_errors.recv() => {
                Termination::Fatal(anyhow::Error::new(e).context("transaction database failed"))
            }
            Some(e) = errors.recv() => Termination::Fatal(e),
            _ = cancel.cancelled() => Termination::Cancelled,
        };

        self.transition(SupervisorState::Draining);
        match &termination {
            Termination::Cancelled => tracing::info!("Shutdown requested"),
            Termination::Fatal(e) => tracing::error!("Fatal error: {:#}", e),
        }
        drop(txdb_errors);
        drop(errors);
        self.releases.release_all();
        self.transition(SupervisorState::Terminated);

        termination
    }
}
