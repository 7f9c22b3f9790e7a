//! L1 Client - JSON-RPC access to the settlement layer

use crate::error::L1Error;
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::Deserialize;
use solana_pubkey::Pubkey;
use std::time::Duration;

/// Default timeout for a single L1 request
pub const L1_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Read access to L1 used during startup and by the inbox reader
#[async_trait]
pub trait L1Client: Send + Sync {
    /// Endpoint this client talks to
    fn url(&self) -> &str;

    /// Latest L1 block (slot) height
    async fn latest_block(&self) -> Result<u64, L1Error>;

    /// Balance of an account in base units
    async fn balance(&self, account: &Pubkey) -> Result<u64, L1Error>;
}

/// `{"context": {...}, "value": T}` response envelope
#[derive(Debug, Deserialize)]
struct RpcValue<T> {
    value: T,
}

/// L1 client over HTTP JSON-RPC
pub struct RpcL1Client {
    url: String,
    client: HttpClient,
}

impl RpcL1Client {
    /// Build a client; no request is made until first use
    pub fn connect(url: &str) -> Result<Self, L1Error> {
        Self::with_timeout(url, L1_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self, L1Error> {
        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(url)
            .map_err(|e| L1Error::Client {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl L1Client for RpcL1Client {
    fn url(&self) -> &str {
        &self.url
    }

    async fn latest_block(&self) -> Result<u64, L1Error> {
        self.client
            .request::<u64, _>("getSlot", rpc_params![])
            .await
            .map_err(|e| L1Error::Rpc {
                method: "getSlot",
                message: e.to_string(),
            })
    }

    async fn balance(&self, account: &Pubkey) -> Result<u64, L1Error> {
        let response: RpcValue<u64> = self
            .client
            .request("getBalance", rpc_params![account.to_string()])
            .await
            .map_err(|e| L1Error::Rpc {
                method: "getBalance",
                message: e.to_string(),
            })?;
        Ok(response.value)
    }
}
