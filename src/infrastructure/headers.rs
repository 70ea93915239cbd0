//! Rate-limit response headers.
//!
//! Renders an [`AdmissionResult`] as the conventional `X-RateLimit-*` header
//! set without tying the crate to an HTTP library.

use crate::domain::{result::AdmissionResult, time::Timestamp};

/// Header carrying the applied quota.
pub const LIMIT: &str = "X-RateLimit-Limit";
/// Header carrying the requests left in the window.
pub const REMAINING: &str = "X-RateLimit-Remaining";
/// Header carrying the seconds until the window resets.
pub const RESET: &str = "X-RateLimit-Reset";
/// Header telling a denied caller how many seconds to wait.
pub const RETRY_AFTER: &str = "Retry-After";

/// Header values for one admission result.
///
/// Durations are whole seconds, rounded up so a client that waits the
/// advertised time never arrives early.
///
/// # Example
/// ```
/// use admission_control::{AdmissionResult, RateLimitHeaders, Timestamp};
///
/// let result = AdmissionResult {
///     allowed: false,
///     limit: 5,
///     remaining: 0,
///     reset_at: Timestamp::from_millis(60_000),
///     degraded: false,
/// };
///
/// let headers = RateLimitHeaders::from_result(&result, Timestamp::from_millis(100));
/// assert_eq!(headers.reset_secs, 60);
/// assert_eq!(headers.retry_after_secs, Some(60));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHeaders {
    /// Value of `X-RateLimit-Limit`
    pub limit: u32,
    /// Value of `X-RateLimit-Remaining`
    pub remaining: u32,
    /// Value of `X-RateLimit-Reset`
    pub reset_secs: u64,
    /// Value of `Retry-After`, present only when the request was denied
    pub retry_after_secs: Option<u64>,
}

impl RateLimitHeaders {
    /// Compute header values for `result` as seen at `now`.
    pub fn from_result(result: &AdmissionResult, now: Timestamp) -> Self {
        let reset_secs = ceil_secs(result.reset_after(now).as_millis());
        Self {
            limit: result.limit,
            remaining: result.remaining,
            reset_secs,
            retry_after_secs: (!result.allowed).then_some(reset_secs),
        }
    }

    /// Header name and value pairs, in a stable order.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (LIMIT, self.limit.to_string()),
            (REMAINING, self.remaining.to_string()),
            (RESET, self.reset_secs.to_string()),
        ];
        if let Some(retry) = self.retry_after_secs {
            pairs.push((RETRY_AFTER, retry.to_string()));
        }
        pairs
    }
}

fn ceil_secs(millis: u128) -> u64 {
    u64::try_from(millis.div_ceil(1_000)).unwrap_or(u64::MAX)
}
