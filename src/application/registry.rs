//! Registry pairing the counter store with the clock.
//!
//! Every access goes through the registry so the timestamp an evaluation sees
//! comes from one place, and tests can substitute a mock clock.

use crate::application::ports::{Clock, CounterStore, StoreError};
use crate::domain::{counter::CounterState, key::CounterKey, time::Timestamp};
use std::sync::Arc;

/// Counter store plus the clock that timestamps its evaluations.
///
/// This type is generic over the store implementation. In production, use
/// `Arc<ShardedCounterStore>` or a `RedisCounterStore`.
#[derive(Debug, Clone)]
pub struct CounterRegistry<S>
where
    S: CounterStore + Clone,
{
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S> CounterRegistry<S>
where
    S: CounterStore + Clone,
{
    /// Create a new registry with a store and a clock.
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Atomically transform the counter for `key`.
    ///
    /// The callback receives the stored state and the current time, read once
    /// before the store is touched.
    pub fn with_counter<F, R>(&self, key: CounterKey, mut f: F) -> Result<(CounterState, R), StoreError>
    where
        F: FnMut(Option<CounterState>, Timestamp) -> (CounterState, R),
    {
        let now = self.clock.now();
        self.store.read_modify_write(key, |prior| f(prior, now))
    }

    /// Read the counter for `key` without changing it.
    pub fn get(&self, key: &CounterKey) -> Result<Option<CounterState>, StoreError> {
        self.store.get(key)
    }

    /// Remove counters whose window has elapsed.
    pub fn scavenge(&self) -> Result<usize, StoreError> {
        self.store.evict_expired(self.clock.now())
    }

    /// Current time according to the registry's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// The clock used for evaluations.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the number of tracked keys.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Clear all tracked state.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.clear()
    }
}
