//! Clock adapters for time operations.
//!
//! Provides SystemClock implementation for production use.
//!
//! # Testing
//!
//! See `MockClock` (in `crate::infrastructure::mocks`) for a controllable test clock.
//! Available with the `test-helpers` feature or in test builds:
//!
//! ```toml
//! [dev-dependencies]
//! admission-control = { version = "*", features = ["test-helpers"] }
//! ```

use crate::application::ports::Clock;
use crate::domain::time::Timestamp;
use std::time::SystemTime;

/// System clock implementation reading the wall clock.
///
/// Wall-clock milliseconds are used rather than `Instant` so that window
/// deadlines mean the same thing in every process sharing a store.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_system_time(SystemTime::now())
    }
}
