//! Mock clock for testing.

use crate::application::ports::Clock;
use crate::domain::time::Timestamp;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, enabling deterministic
/// testing of window boundaries and recovery timeouts.
///
/// # Examples
///
/// ```
/// use admission_control::infrastructure::mocks::MockClock;
/// use admission_control::application::ports::Clock;
/// use admission_control::Timestamp;
/// use std::time::Duration;
///
/// let clock = MockClock::new(Timestamp::from_millis(1_000));
///
/// // Time starts at the specified timestamp
/// assert_eq!(clock.now(), Timestamp::from_millis(1_000));
///
/// // Advance time explicitly
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now(), Timestamp::from_millis(11_000));
///
/// // Or set to a specific timestamp
/// clock.set(Timestamp::from_millis(60_000));
/// assert_eq!(clock.now(), Timestamp::from_millis(60_000));
/// ```
///
/// # Thread Safety
///
/// `MockClock` is thread-safe and can be cloned to share across threads.
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<Timestamp>>,
}

impl MockClock {
    /// Create a mock clock starting at a specific timestamp.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut time = self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time = time.saturating_add(duration);
    }

    /// Set the clock to a specific timestamp.
    pub fn set(&self, timestamp: Timestamp) {
        let mut time = self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time = timestamp;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Timestamp {
        *self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_mock_clock() {
        let clock = MockClock::new(Timestamp::UNIX_EPOCH);
        assert_eq!(clock.now(), Timestamp::UNIX_EPOCH);

        clock.advance(Duration::from_millis(1_500));
        assert_eq!(clock.now(), Timestamp::from_millis(1_500));

        clock.set(Timestamp::from_millis(100));
        assert_eq!(clock.now(), Timestamp::from_millis(100));
    }

    #[test]
    fn test_clones_share_time() {
        let clock = MockClock::new(Timestamp::UNIX_EPOCH);
        let clock_clone = clock.clone();

        thread::spawn(move || clock_clone.advance(Duration::from_secs(5)))
            .join()
            .unwrap();

        assert_eq!(clock.now(), Timestamp::from_millis(5_000));
    }
}
