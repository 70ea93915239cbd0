//! Admission algorithms.
//!
//! An algorithm is a pure function of `(policy, now, prior state)` that returns
//! the decision and the next state. Persisting that state atomically is the
//! counter store's job, never the algorithm's.

use crate::domain::counter::CounterState;
use crate::domain::policy::Policy;
use crate::domain::time::Timestamp;
use std::fmt::Debug;

/// Outcome of evaluating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// The request may proceed
    Admit,
    /// The request must be rejected
    Deny,
}

impl AdmissionDecision {
    /// Check if this decision is Admit.
    pub fn is_admit(&self) -> bool {
        matches!(self, AdmissionDecision::Admit)
    }

    /// Check if this decision is Deny.
    pub fn is_deny(&self) -> bool {
        matches!(self, AdmissionDecision::Deny)
    }
}

/// Decision plus the state the store must persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// Admit or deny
    pub decision: AdmissionDecision,
    /// Requests still available in the window after this one
    pub remaining: u32,
    /// Next counter state
    pub state: CounterState,
}

/// A rate-limiting algorithm.
///
/// Implementations must be pure: optimistic stores may call `evaluate` more
/// than once for a single request when they retry after a lost race.
pub trait AdmissionAlgorithm: Send + Sync + Debug {
    /// Decide on one request and compute the next counter state.
    ///
    /// # Arguments
    /// * `policy` - Quota of the request's resource class
    /// * `now` - Evaluation time
    /// * `prior` - Stored state, or `None` for a key never seen (or scavenged)
    fn evaluate(&self, policy: &Policy, now: Timestamp, prior: Option<CounterState>)
        -> Evaluation;
}

/// Fixed-window counter.
///
/// Each key gets `max_requests` per window; the counter resets entirely when
/// the window elapses. State is O(1) per key. A caller may be admitted up to
/// twice the nominal rate across a window boundary (`max_requests` at the end
/// of one window, `max_requests` at the start of the next).
///
/// # Example
/// ```
/// use admission_control::{AdmissionAlgorithm, FixedWindow, Policy, Timestamp};
/// use std::time::Duration;
///
/// let policy = Policy::new(2, Duration::from_secs(60)).unwrap();
/// let t0 = Timestamp::from_millis(0);
///
/// let first = FixedWindow.evaluate(&policy, t0, None);
/// assert!(first.decision.is_admit());
/// assert_eq!(first.remaining, 1);
///
/// let second = FixedWindow.evaluate(&policy, t0, Some(first.state));
/// let third = FixedWindow.evaluate(&policy, t0, Some(second.state));
/// assert!(third.decision.is_deny());
///
/// // Next window
/// let later = Timestamp::from_millis(60_000);
/// assert!(FixedWindow.evaluate(&policy, later, Some(third.state)).decision.is_admit());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedWindow;

impl AdmissionAlgorithm for FixedWindow {
    fn evaluate(
        &self,
        policy: &Policy,
        now: Timestamp,
        prior: Option<CounterState>,
    ) -> Evaluation {
        let max = policy.max_requests();

        let current = match prior {
            Some(state) if !state.is_expired(now) => state,
            _ => CounterState::fresh(policy, now),
        };

        if current.count < max {
            let state = CounterState {
                count: current.count + 1,
                window_reset_at: current.window_reset_at,
            };
            Evaluation {
                decision: AdmissionDecision::Admit,
                remaining: max - state.count,
                state,
            }
        } else {
            Evaluation {
                decision: AdmissionDecision::Deny,
                remaining: 0,
                state: current,
            }
        }
    }
}
