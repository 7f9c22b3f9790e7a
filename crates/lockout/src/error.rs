//! Lockout Errors

use l2_batcher::BatcherError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockoutError {
    #[error("lockout store: {0}")]
    Store(#[from] redis::RedisError),

    #[error("lockout store task failed: {0}")]
    Task(String),

    #[error("invalid lockout configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("lockout store did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("lease lost: store unreachable for {0:?}")]
    LeaseExpired(std::time::Duration),

    #[error("batcher: {0}")]
    Batcher(#[from] BatcherError),

    #[error("cancelled while {0}")]
    Cancelled(&'static str),
}
