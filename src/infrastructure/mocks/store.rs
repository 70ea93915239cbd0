//! Counter store test double with injectable failures.

use crate::application::ports::{CounterStore, StoreError};
use crate::domain::{counter::CounterState, key::CounterKey, time::Timestamp};
use crate::infrastructure::store::ShardedCounterStore;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory store that can be told to fail or panic.
///
/// Clones share state and failure settings, so a test can keep one clone to
/// steer a store that has been moved into a service.
///
/// # Examples
///
/// ```
/// use admission_control::infrastructure::mocks::FailingStore;
/// use admission_control::application::ports::CounterStore;
/// use admission_control::CounterKey;
///
/// let store = FailingStore::new();
/// store.fail_next(1);
///
/// let key = CounterKey::new("auth", "user:1");
/// assert!(store.get(&key).is_err());
/// assert!(store.get(&key).unwrap().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FailingStore {
    inner: Arc<ShardedCounterStore>,
    fail_all: Arc<AtomicBool>,
    fail_next: Arc<AtomicU32>,
    panic_next: Arc<AtomicU32>,
    calls: Arc<AtomicU64>,
}

impl FailingStore {
    /// Create a store that behaves normally until told otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail until switched off.
    pub fn fail_all(&self, enabled: bool) {
        self.fail_all.store(enabled, Ordering::SeqCst);
    }

    /// Make the next `count` operations fail.
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` read-modify-writes panic.
    pub fn panic_next(&self, count: u32) {
        self.panic_next.store(count, Ordering::SeqCst);
    }

    /// Number of operations attempted against the store.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_one(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn check(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) || Self::take_one(&self.fail_next) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

impl CounterStore for FailingStore {
    fn get(&self, key: &CounterKey) -> Result<Option<CounterState>, StoreError> {
        self.check()?;
        self.inner.get(key)
    }

    fn set(&self, key: CounterKey, state: CounterState) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set(key, state)
    }

    fn read_modify_write<F, R>(&self, key: CounterKey, f: F) -> Result<(CounterState, R), StoreError>
    where
        F: FnMut(Option<CounterState>) -> (CounterState, R),
    {
        self.check()?;
        if Self::take_one(&self.panic_next) {
            panic!("injected panic while updating {}", key);
        }
        self.inner.read_modify_write(key, f)
    }

    fn evict_expired(&self, now: Timestamp) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.evict_expired(now)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.check()?;
        self.inner.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_next_is_consumed() {
        let store = FailingStore::new();
        let key = CounterKey::new("auth", "user:1");
        store.fail_next(2);

        assert!(store.get(&key).is_err());
        assert!(store.get(&key).is_err());
        assert!(store.get(&key).is_ok());
        assert_eq!(store.calls(), 3);
    }

    #[test]
    fn test_fail_all_toggle() {
        let store = FailingStore::new();
        store.fail_all(true);
        assert_eq!(
            store.evict_expired(Timestamp::UNIX_EPOCH),
            Err(StoreError::Unavailable("injected failure".to_string()))
        );
        store.fail_all(false);
        assert_eq!(store.evict_expired(Timestamp::UNIX_EPOCH), Ok(0));
    }

    #[test]
    fn test_panic_next() {
        let store = FailingStore::new();
        store.panic_next(1);
        let key = CounterKey::new("auth", "user:1");
        let state = CounterState {
            count: 1,
            window_reset_at: Timestamp::from_millis(10),
        };

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = store.read_modify_write(key.clone(), |_| (state, ()));
        }));
        assert!(result.is_err());
        assert!(store.read_modify_write(key, |_| (state, ())).is_ok());
    }
}
