//! Redis-backed counter store.
//!
//! Lets several processes enforce one shared quota per key by keeping counter
//! state in Redis.
//!
//! ## Architecture
//!
//! - Keys: `{prefix}{class length}:{class}:{caller}`, so no pair of class and
//!   caller can collide with another
//! - Values: bincode-encoded [`CounterState`]
//! - Expiry: each key expires when its window does (`PXAT`), so Redis does the
//!   scavenging and [`evict_expired`](CounterStore::evict_expired) is a no-op
//!
//! ## Atomicity
//!
//! A read-modify-write reads the current bytes, evaluates locally, then
//! swaps in the new bytes with a Lua compare-and-set that only succeeds if the
//! key still holds what was read. A lost race re-reads and re-evaluates, up to
//! `max_attempts` times, after which [`StoreError::Contention`] is returned and
//! the service's failure mode decides.
//!
//! Requires Redis 6.2 or later for `PXAT`.
//!
//! ## Limitations
//!
//! - Keys are not counted: `len()` always returns 0, so `is_empty()` returns
//!   true whatever Redis holds. Counting would need a full SCAN
//! - The store interface is synchronous. Calls from inside a multi-threaded
//!   tokio runtime use `block_in_place`; calls from outside any runtime
//!   drive a temporary one. A current-thread runtime cannot block and gets
//!   [`StoreError::Unavailable`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use admission_control::{AdmissionService, RedisCounterStore, RedisStorageConfig};
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() {
//!     let config = RedisStorageConfig {
//!         key_prefix: "myapp:admission:".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let store = RedisCounterStore::connect_with_config("redis://127.0.0.1/", config)
//!         .await
//!         .expect("Failed to connect to Redis");
//!
//!     let service = AdmissionService::builder()
//!         .with_store(store)
//!         .build()
//!         .unwrap();
//! }
//! ```

use crate::application::ports::{CounterStore, StoreError};
use crate::domain::{counter::CounterState, key::CounterKey, time::Timestamp};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};
use std::fmt;
use std::future::Future;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Swap `KEYS[1]` from `ARGV[1]` (empty for "absent") to `ARGV[2]`, expiring
/// at unix milliseconds `ARGV[3]`. Returns 1 on success, 0 if the value moved.
const COMPARE_AND_SET: &str = r#"
local current = redis.call('GET', KEYS[1])
if current == false then
  current = ''
end
if current ~= ARGV[1] then
  return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'PXAT', ARGV[3])
return 1
"#;

/// Configuration for Redis storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisStorageConfig {
    /// Key prefix for Redis keys (default: "admission:")
    pub key_prefix: String,
    /// Compare-and-set attempts per request before giving up (default: 16)
    pub max_attempts: u32,
}

impl Default for RedisStorageConfig {
    fn default() -> Self {
        Self {
            key_prefix: "admission:".to_string(),
            max_attempts: 16,
        }
    }
}

/// Redis-backed counter store for limits shared across processes.
#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
    script: Script,
    config: RedisStorageConfig,
}

impl fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisCounterStore {
    /// Connect to Redis with default configuration.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., "redis://127.0.0.1/")
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        Self::connect_with_config(url, RedisStorageConfig::default()).await
    }

    /// Connect to Redis with custom configuration.
    ///
    /// # Errors
    /// Returns error if connection fails.
    pub async fn connect_with_config(
        url: &str,
        config: RedisStorageConfig,
    ) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self::from_connection(connection, config))
    }

    /// Wrap an existing connection manager.
    pub fn from_connection(connection: ConnectionManager, config: RedisStorageConfig) -> Self {
        Self {
            connection,
            script: Script::new(COMPARE_AND_SET),
            config,
        }
    }

    /// Get the storage configuration.
    pub fn config(&self) -> &RedisStorageConfig {
        &self.config
    }

    /// Get the Redis key for a counter key.
    pub fn redis_key(&self, key: &CounterKey) -> String {
        let class = key.class().as_str();
        format!(
            "{}{}:{}:{}",
            self.config.key_prefix,
            class.len(),
            class,
            key.caller()
        )
    }

    /// Read the raw bytes and decoded state of a key.
    ///
    /// Bytes that fail to decode are treated as absent so the next write
    /// replaces them.
    async fn load(
        &self,
        redis_key: &str,
    ) -> Result<(Vec<u8>, Option<CounterState>), StoreError> {
        let mut conn = self.connection.clone();
        let bytes: Option<Vec<u8>> = conn.get(redis_key).await.map_err(unavailable)?;

        match bytes {
            None => Ok((Vec::new(), None)),
            Some(bytes) => match bincode::deserialize::<CounterState>(&bytes) {
                Ok(state) => Ok((bytes, Some(state))),
                Err(error) => {
                    tracing::warn!(
                        key = redis_key,
                        error = %error,
                        "discarding undecodable counter state"
                    );
                    Ok((bytes, None))
                }
            },
        }
    }

    /// Read a counter without blocking the runtime.
    pub async fn get_async(&self, key: &CounterKey) -> Result<Option<CounterState>, StoreError> {
        let (_, state) = self.load(&self.redis_key(key)).await?;
        Ok(state)
    }

    /// Overwrite a counter without blocking the runtime.
    pub async fn set_async(&self, key: &CounterKey, state: CounterState) -> Result<(), StoreError> {
        let bytes = encode(&state)?;
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(self.redis_key(key))
            .arg(bytes)
            .arg("PXAT")
            .arg(state.window_reset_at.as_millis())
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    /// Atomically transform a counter without blocking the runtime.
    ///
    /// `f` is called once per attempt.
    pub async fn read_modify_write_async<F, R>(
        &self,
        key: &CounterKey,
        mut f: F,
    ) -> Result<(CounterState, R), StoreError>
    where
        F: FnMut(Option<CounterState>) -> (CounterState, R),
    {
        let redis_key = self.redis_key(key);
        let mut conn = self.connection.clone();

        for attempt in 1..=self.config.max_attempts {
            let (expected, prior) = self.load(&redis_key).await?;
            let (next, value) = f(prior);
            let encoded = encode(&next)?;

            let swapped: i32 = self
                .script
                .key(&redis_key)
                .arg(expected)
                .arg(encoded)
                .arg(next.window_reset_at.as_millis())
                .invoke_async(&mut conn)
                .await
                .map_err(unavailable)?;

            if swapped == 1 {
                return Ok((next, value));
            }
            tracing::trace!(key = %key, attempt, "lost compare-and-set race, retrying");
        }

        Err(StoreError::Contention {
            attempts: self.config.max_attempts,
        })
    }

    /// Delete every key under the configured prefix.
    pub async fn clear_async(&self) -> Result<(), StoreError> {
        let pattern = format!("{}*", self.config.key_prefix);
        let mut conn = self.connection.clone();
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;

            if !keys.is_empty() {
                conn.del::<_, ()>(&keys).await.map_err(unavailable)?;
            }

            if next_cursor == 0 {
                return Ok(());
            }
            cursor = next_cursor;
        }
    }

    /// Drive an async Redis operation to completion from synchronous code.
    fn block_on<Fut, T>(&self, fut: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(fut))
            }
            Ok(_) => Err(StoreError::Unavailable(
                "redis store cannot block inside a current-thread runtime".to_string(),
            )),
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                runtime.block_on(fut)
            }
        }
    }
}

fn unavailable(error: RedisError) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

fn encode(state: &CounterState) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(state).map_err(|e| StoreError::Codec(e.to_string()))
}

impl CounterStore for RedisCounterStore {
    fn get(&self, key: &CounterKey) -> Result<Option<CounterState>, StoreError> {
        self.block_on(self.get_async(key))
    }

    fn set(&self, key: CounterKey, state: CounterState) -> Result<(), StoreError> {
        self.block_on(self.set_async(&key, state))
    }

    fn read_modify_write<F, R>(&self, key: CounterKey, f: F) -> Result<(CounterState, R), StoreError>
    where
        F: FnMut(Option<CounterState>) -> (CounterState, R),
    {
        self.block_on(self.read_modify_write_async(&key, f))
    }

    /// Redis expires keys at the end of their window, so there is nothing to
    /// sweep.
    fn evict_expired(&self, _now: Timestamp) -> Result<usize, StoreError> {
        Ok(0)
    }

    /// # Limitation
    ///
    /// **This always returns 0 for RedisCounterStore**, and the provided
    /// `is_empty` agrees with it.
    ///
    /// Counting keys would require a SCAN of the whole prefix. Use Redis
    /// monitoring for key counts instead.
    fn len(&self) -> usize {
        0
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.block_on(self.clear_async())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_encoding_is_never_empty() {
        // An empty expected value means "absent" to the swap script
        let state = CounterState {
            count: 0,
            window_reset_at: Timestamp::UNIX_EPOCH,
        };
        let bytes = encode(&state).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(bincode::deserialize::<CounterState>(&bytes).unwrap(), state);
    }

    #[test]
    fn test_default_config() {
        let config = RedisStorageConfig::default();
        assert_eq!(config.key_prefix, "admission:");
        assert_eq!(config.max_attempts, 16);
    }
}
