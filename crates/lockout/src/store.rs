//! Lockout stores
//!
//! A lease is a single key holding the owner's RPC URL with an expiry. Only
//! the owner can renew or release it.

use crate::error::LockoutError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Key under which the sequencer lease is stored
pub const LOCKOUT_KEY: &str = "l2:sequencer:lockout";

/// Timeout for one Redis connection attempt; whole calls are bounded by
/// [`LockoutTiming::store_timeout`](crate::LockoutTiming)
const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

const RENEW_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
end
return 0
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// Shared lease store
#[async_trait]
pub trait LockoutStore: Send + Sync {
    /// Take the lease if nobody holds it
    async fn try_acquire(&self, holder: &str, lease: Duration) -> Result<bool, LockoutError>;

    /// Extend the lease if `holder` still owns it
    async fn renew(&self, holder: &str, lease: Duration) -> Result<bool, LockoutError>;

    /// Drop the lease if `holder` owns it
    async fn release(&self, holder: &str) -> Result<bool, LockoutError>;

    /// Current lease owner
    async fn holder(&self) -> Result<Option<String>, LockoutError>;
}

/// Lease stored in Redis
pub struct RedisLockoutStore {
    client: redis::Client,
    key: String,
}

impl RedisLockoutStore {
    /// Parse the URL; no connection is made
    pub fn open(url: &str) -> Result<Self, LockoutError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            key: LOCKOUT_KEY.to_string(),
        })
    }

    async fn run<T, F>(&self, op: F) -> Result<T, LockoutError>
    where
        T: Send + 'static,
        F: FnOnce(&mut redis::Connection, &str) -> redis::RedisResult<T> + Send + 'static,
    {
        let client = self.client.clone();
        let key = self.key.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut con = client.get_connection_with_timeout(REDIS_CONNECT_TIMEOUT)?;
            op(&mut con, &key)
        })
        .await
        .map_err(|e| LockoutError::Task(e.to_string()))?;
        Ok(result?)
    }
}

#[async_trait]
impl LockoutStore for RedisLockoutStore {
    async fn try_acquire(&self, holder: &str, lease: Duration) -> Result<bool, LockoutError> {
        let holder = holder.to_string();
        let set: Option<String> = self
            .run(move |con, key| {
                redis::cmd("SET")
                    .arg(key)
                    .arg(holder)
                    .arg("NX")
                    .arg("PX")
                    .arg(lease.as_millis() as u64)
                    .query(con)
            })
            .await?;
        Ok(set.is_some())
    }

    async fn renew(&self, holder: &str, lease: Duration) -> Result<bool, LockoutError> {
        let holder = holder.to_string();
        let renewed: i64 = self
            .run(move |con, key| {
                redis::Script::new(RENEW_SCRIPT)
                    .key(key)
                    .arg(holder)
                    .arg(lease.as_millis() as u64)
                    .invoke(con)
            })
            .await?;
        Ok(renewed == 1)
    }

    async fn release(&self, holder: &str) -> Result<bool, LockoutError> {
        let holder = holder.to_string();
        let released: i64 = self
            .run(move |con, key| {
                redis::Script::new(RELEASE_SCRIPT)
                    .key(key)
                    .arg(holder)
                    .invoke(con)
            })
            .await?;
        Ok(released == 1)
    }

    async fn holder(&self) -> Result<Option<String>, LockoutError> {
        self.run(|con, key| redis::cmd("GET").arg(key).query(con))
            .await
    }
}

/// In-process lease, for single-host setups and tests
#[derive(Default)]
pub struct MemoryLockoutStore {
    lease: Mutex<Option<(String, Instant)>>,
}

impl MemoryLockoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Clear an expired lease; callers hold the lock across check and update
fn live(lease: &mut Option<(String, Instant)>) -> Option<&str> {
    if matches!(lease, Some((_, expires)) if *expires <= Instant::now()) {
        *lease = None;
    }
    lease.as_ref().map(|(holder, _)| holder.as_str())
}

#[async_trait]
impl LockoutStore for MemoryLockoutStore {
    async fn try_acquire(&self, holder: &str, lease: Duration) -> Result<bool, LockoutError> {
        let mut current = self.lease.lock();
        if live(&mut current).is_some() {
            return Ok(false);
        }
        *current = Some((holder.to_string(), Instant::now() + lease));
        Ok(true)
    }

    async fn renew(&self, holder: &str, lease: Duration) -> Result<bool, LockoutError> {
        let mut current = self.lease.lock();
        if live(&mut current) != Some(holder) {
            return Ok(false);
        }
        *current = Some((holder.to_string(), Instant::now() + lease));
        Ok(true)
    }

    async fn release(&self, holder: &str) -> Result<bool, LockoutError> {
        let mut current = self.lease.lock();
        if live(&mut current) != Some(holder) {
            return Ok(false);
        }
        *current = None;
        Ok(true)
    }

    async fn holder(&self) -> Result<Option<String>, LockoutError> {
        Ok(live(&mut self.lease.lock()).map(String::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_memory_lease_lifecycle() {
        let store = MemoryLockoutStore::new();
        let lease = Duration::from_secs(10);

        assert!(store.try_acquire("http://a", lease).await.unwrap());
        assert!(!store.try_acquire("http://b", lease).await.unwrap());
        assert!(!store.renew("http://b", lease).await.unwrap());
        assert!(!store.release("http://b").await.unwrap());
        assert_eq!(store.holder().await.unwrap().as_deref(), Some("http://a"));

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(store.renew("http://a", lease).await.unwrap());
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(store.holder().await.unwrap().as_deref(), Some("http://a"));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(store.holder().await.unwrap(), None);
        assert!(store.try_acquire("http://b", lease).await.unwrap());
        assert!(store.release("http://b").await.unwrap());
        assert_eq!(store.holder().await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_has_one_winner() {
        let store = Arc::new(MemoryLockoutStore::new());
        let barrier = Arc::new(tokio::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    store
                        .try_acquire(&format!("http://seq-{}", i), Duration::from_secs(10))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(store.holder().await.unwrap().is_some());
    }

    #[test]
    fn test_redis_url_must_parse() {
        assert!(RedisLockoutStore::open("redis://127.0.0.1:6379").is_ok());
        assert!(RedisLockoutStore::open("not a url").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_error() {
        let store = RedisLockoutStore::open("redis://127.0.0.1:1").unwrap();
        assert!(matches!(store.holder().await, Err(LockoutError::Store(_))));
    }
}
