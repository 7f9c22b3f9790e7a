//! Monitor Errors

use l1_bridge::L1Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("machine file {path}: {source}")]
    Machine {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("node database: {0}")]
    Database(#[from] sled::Error),

    #[error("record encoding: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("feed {url}: {message}")]
    Feed { url: String, message: String },

    #[error("L1 unavailable: {0}")]
    L1(#[from] L1Error),

    #[error("cancelled while {0}")]
    Cancelled(&'static str),
}
