//! L1 Bridge Errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum L1Error {
    #[error("failed to build L1 client for {url}: {message}")]
    Client { url: String, message: String },

    #[error("L1 request {method} failed: {message}")]
    Rpc { method: &'static str, message: String },

    #[error("keystore {path}: {message}")]
    Keystore { path: String, message: String },

    #[error("cancelled while {0}")]
    Cancelled(&'static str),
}
