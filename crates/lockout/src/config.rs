//! Lockout configuration

use crate::error::LockoutError;
use std::time::Duration;

/// Shared store and this node's advertised RPC URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutConfig {
    pub redis: String,
    pub self_rpc_url: String,
}

impl LockoutConfig {
    pub fn new(redis: &str, self_rpc_url: &str) -> Result<Self, LockoutError> {
        if redis.is_empty() {
            return Err(LockoutError::InvalidConfig("redis address is empty"));
        }
        if self_rpc_url.is_empty() {
            return Err(LockoutError::InvalidConfig("self RPC URL is empty"));
        }
        if !self_rpc_url.starts_with("http://") && !self_rpc_url.starts_with("https://") {
            // standbys forward transactions to this URL over HTTP JSON-RPC
            return Err(LockoutError::InvalidConfig("self RPC URL must be an http(s) URL"));
        }
        Ok(Self {
            redis: redis.to_string(),
            self_rpc_url: self_rpc_url.to_string(),
        })
    }

    /// Redis connection URL; bare `host:port` addresses get a scheme
    pub fn redis_url(&self) -> String {
        if self.redis.contains("://") {
            self.redis.clone()
        } else {
            format!("redis://{}", self.redis)
        }
    }
}

/// Lease timing
#[derive(Debug, Clone, Copy)]
pub struct LockoutTiming {
    /// How long a lease lasts without renewal
    pub lease: Duration,
    /// Interval between acquire/renew attempts
    pub poll_interval: Duration,
    /// Upper bound on one store call
    pub store_timeout: Duration,
}

impl LockoutTiming {
    /// How long after the last confirmed renewal the holder may keep sealing
    ///
    /// A renewal issued at `t` keeps the lease until at least `t + lease` in
    /// the store. The holder steps down one poll and one store call earlier,
    /// so it is inactive before a standby can take the lease.
    pub fn hold_limit(&self) -> Duration {
        self.lease
            .saturating_sub(self.poll_interval)
            .saturating_sub(self.store_timeout)
    }
}

impl Default for LockoutTiming {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            store_timeout: Duration::from_secs(2),
        }
    }
}
