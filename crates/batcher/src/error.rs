//! Batcher Errors

use l1_bridge::L1Error;
use l2_monitor::MonitorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatcherError {
    #[error("forward to {url} failed: {message}")]
    Forward { url: String, message: String },

    #[error("transaction queue full")]
    QueueFull,

    #[error("empty transaction")]
    EmptyTransaction,

    #[error("sequencer is not active")]
    Inactive,

    #[error("missing signer for {0} batcher")]
    MissingSigner(&'static str),

    #[error("block {0} missing from execution core")]
    MissingBlock(u64),

    #[error("batcher task failed: {0}")]
    Task(String),

    #[error("L1: {0}")]
    L1(#[from] L1Error),

    #[error("monitor: {0}")]
    Monitor(#[from] MonitorError),

    #[error("cancelled while {0}")]
    Cancelled(&'static str),
}
