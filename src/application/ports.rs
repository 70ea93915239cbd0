//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::counter::CounterState;
use crate::domain::key::CounterKey;
use crate::domain::time::Timestamp;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Port for obtaining current time.
///
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current wall-clock time.
    fn now(&self) -> Timestamp;
}

/// Error raised by a counter store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the command
    Unavailable(String),
    /// Optimistic updates kept losing races and gave up
    Contention {
        /// Attempts made before giving up
        attempts: u32,
    },
    /// Stored bytes could not be decoded, or state could not be encoded
    Codec(String),
    /// The store panicked while holding the key
    Panicked,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(reason) => write!(f, "counter store unavailable: {}", reason),
            StoreError::Contention { attempts } => {
                write!(f, "counter update lost {} consecutive races", attempts)
            }
            StoreError::Codec(reason) => write!(f, "counter state codec error: {}", reason),
            StoreError::Panicked => write!(f, "counter store panicked"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Port for keyed counter storage.
///
/// The central contract is [`read_modify_write`](CounterStore::read_modify_write):
/// the whole read-evaluate-write cycle for one key is serialized against every
/// other cycle for the same key, while distinct keys progress independently.
pub trait CounterStore: Send + Sync + Debug {
    /// Read the state of a key.
    fn get(&self, key: &CounterKey) -> Result<Option<CounterState>, StoreError>;

    /// Overwrite the state of a key.
    fn set(&self, key: CounterKey, state: CounterState) -> Result<(), StoreError>;

    /// Atomically transform the state of a key.
    ///
    /// `f` receives the current state (`None` when absent) and returns the next
    /// state together with a caller value, typically the decision computed
    /// alongside it. The next state is stored and returned with that value.
    ///
    /// Optimistic implementations may call `f` again after losing a race, so
    /// `f` must not have side effects.
    fn read_modify_write<F, R>(&self, key: CounterKey, f: F) -> Result<(CounterState, R), StoreError>
    where
        F: FnMut(Option<CounterState>) -> (CounterState, R);

    /// Drop every entry whose window has elapsed at `now`.
    ///
    /// # Returns
    /// The number of entries removed. Backends that expire entries on their
    /// own may return 0.
    fn evict_expired(&self, now: Timestamp) -> Result<usize, StoreError>;

    /// Get the number of tracked keys.
    fn len(&self) -> usize;

    /// Check if the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry.
    fn clear(&self) -> Result<(), StoreError>;
}

// Lets a store be shared between the service and a scavenger
impl<T> CounterStore for Arc<T>
where
    T: CounterStore,
{
    fn get(&self, key: &CounterKey) -> Result<Option<CounterState>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: CounterKey, state: CounterState) -> Result<(), StoreError> {
        (**self).set(key, state)
    }

    fn read_modify_write<F, R>(&self, key: CounterKey, f: F) -> Result<(CounterState, R), StoreError>
    where
        F: FnMut(Option<CounterState>) -> (CounterState, R),
    {
        (**self).read_modify_write(key, f)
    }

    fn evict_expired(&self, now: Timestamp) -> Result<usize, StoreError> {
        (**self).evict_expired(now)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}
