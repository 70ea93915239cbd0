//! Per-key consumption state.

use crate::domain::policy::Policy;
use crate::domain::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Consumption recorded for one counter key within its current window.
///
/// Serializable so that shared backends can persist it verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    /// Requests admitted in the current window
    pub count: u32,
    /// When the current window ends
    pub window_reset_at: Timestamp,
}

impl CounterState {
    /// State of a key seen for the first time at `now`: nothing consumed yet,
    /// window ending one policy window from now.
    pub fn fresh(policy: &Policy, now: Timestamp) -> Self {
        Self {
            count: 0,
            window_reset_at: now.saturating_add(policy.window()),
        }
    }

    /// Whether the window has elapsed at `now`.
    ///
    /// An expired state is observably identical to an absent one, which is
    /// what allows stores to drop it at any time.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.window_reset_at
    }
}
