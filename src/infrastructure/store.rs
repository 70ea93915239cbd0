//! In-process counter store.
//!
//! Provides concurrent, sharded storage for counter state.

use crate::application::ports::{CounterStore, StoreError};
use crate::domain::{counter::CounterState, key::CounterKey, time::Timestamp};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Thread-safe sharded counter store backed by DashMap.
///
/// DashMap provides lock-free reads and fine-grained locking for writes. A
/// read-modify-write holds the lock of the key's shard for its duration, so
/// updates to one key are serialized while keys in other shards proceed in
/// parallel.
#[derive(Debug)]
pub struct ShardedCounterStore {
    map: DashMap<CounterKey, CounterState, ahash::RandomState>,
}

impl ShardedCounterStore {
    /// Create a new sharded store.
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Create a store pre-sized for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: DashMap::with_capacity_and_hasher(capacity, ahash::RandomState::new()),
        }
    }

    /// Approximate heap bytes held by keys and states.
    pub fn memory_usage(&self) -> usize {
        self.map
            .iter()
            .map(|entry| {
                entry.key().heap_size()
                    + std::mem::size_of::<CounterKey>()
                    + std::mem::size_of::<CounterState>()
            })
            .sum()
    }
}

impl Default for ShardedCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for ShardedCounterStore {
    fn get(&self, key: &CounterKey) -> Result<Option<CounterState>, StoreError> {
        Ok(self.map.get(key).map(|entry| *entry.value()))
    }

    fn set(&self, key: CounterKey, state: CounterState) -> Result<(), StoreError> {
        self.map.insert(key, state);
        Ok(())
    }

    fn read_modify_write<F, R>(&self, key: CounterKey, mut f: F) -> Result<(CounterState, R), StoreError>
    where
        F: FnMut(Option<CounterState>) -> (CounterState, R),
    {
        // The entry guard holds the shard lock until it is dropped
        match self.map.entry(key) {
            Entry::Occupied(mut entry) => {
                let (next, value) = f(Some(*entry.get()));
                entry.insert(next);
                Ok((next, value))
            }
            Entry::Vacant(entry) => {
                let (next, value) = f(None);
                entry.insert(next);
                Ok((next, value))
            }
        }
    }

    fn evict_expired(&self, now: Timestamp) -> Result<usize, StoreError> {
        let mut removed = 0;
        self.map.retain(|_, state| {
            let keep = !state.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.map.clear();
        Ok(())
    }
}
