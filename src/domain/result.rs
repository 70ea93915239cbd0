//! The structured result handed back to callers.

use crate::domain::time::Timestamp;
use std::time::Duration;

/// Admission decision for one request, with the quota metadata callers
/// conventionally expose as rate-limit response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionResult {
    /// Whether the request may proceed
    pub allowed: bool,
    /// `max_requests` of the policy that was applied
    pub limit: u32,
    /// Requests still available in the current window
    pub remaining: u32,
    /// When the current window ends
    pub reset_at: Timestamp,
    /// Set when the counter store could not be consulted and the class's
    /// failure mode decided instead
    pub degraded: bool,
}

impl AdmissionResult {
    /// Time from `now` until the window resets (zero once it has).
    pub fn reset_after(&self, now: Timestamp) -> Duration {
        self.reset_at.saturating_duration_since(now)
    }

    /// How long a denied caller should wait before retrying.
    ///
    /// `None` for admitted requests.
    pub fn retry_after(&self, now: Timestamp) -> Option<Duration> {
        if self.allowed {
            None
        } else {
            Some(self.reset_after(now))
        }
    }
}
