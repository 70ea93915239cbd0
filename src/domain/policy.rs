//! Quota policies and the table that maps resource classes to them.
//!
//! A [`Policy`] is a request budget (`max_requests`) that resets every
//! `window`. The [`PolicyTable`] resolves a resource class to its policy and
//! falls back to a designated default for classes it does not know.

use crate::domain::key::ResourceClass;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Error returned when a policy or policy table is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// `max_requests` must be greater than zero
    ZeroMaxRequests,
    /// Window must be at least one millisecond
    ZeroWindow,
    /// The default policy admits more traffic than a configured class
    PermissiveDefault {
        /// The configured class the default is more permissive than
        class: String,
    },
    /// A table needs at least one class or an explicit default
    EmptyTable,
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::ZeroMaxRequests => write!(f, "max_requests must be greater than 0"),
            PolicyError::ZeroWindow => write!(f, "window must be at least 1ms"),
            PolicyError::PermissiveDefault { class } => write!(
                f,
                "default policy is more permissive than the policy for class '{}'",
                class
            ),
            PolicyError::EmptyTable => {
                write!(f, "policy table needs at least one class or a default policy")
            }
        }
    }
}

impl std::error::Error for PolicyError {}

/// Quota parameters for one resource class.
///
/// # Example
/// ```
/// use admission_control::Policy;
/// use std::time::Duration;
///
/// let auth = Policy::new(5, Duration::from_secs(15 * 60)).unwrap();
/// assert_eq!(auth.max_requests(), 5);
/// assert_eq!(auth.window_millis(), 900_000);
///
/// assert!(Policy::new(0, Duration::from_secs(1)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Policy {
    max_requests: u32,
    window: Duration,
}

impl Policy {
    /// Create a policy allowing `max_requests` per `window`.
    ///
    /// # Errors
    /// Returns `PolicyError::ZeroMaxRequests` or `PolicyError::ZeroWindow` when
    /// either parameter is zero. Windows shorter than a millisecond count as zero.
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, PolicyError> {
        if max_requests == 0 {
            return Err(PolicyError::ZeroMaxRequests);
        }
        if window.as_millis() == 0 {
            return Err(PolicyError::ZeroWindow);
        }
        Ok(Self {
            max_requests,
            window,
        })
    }

    /// Create a policy from a window expressed in milliseconds.
    pub fn from_millis(max_requests: u32, window_ms: u64) -> Result<Self, PolicyError> {
        Self::new(max_requests, Duration::from_millis(window_ms))
    }

    /// Requests admitted per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in whole milliseconds.
    pub fn window_millis(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }

    /// Whether this policy's sustained rate is at most `other`'s.
    ///
    /// Compares `max_requests / window` by cross-multiplication so no
    /// precision is lost.
    pub fn rate_at_most(&self, other: &Policy) -> bool {
        let lhs = u128::from(self.max_requests) * u128::from(other.window_millis());
        let rhs = u128::from(other.max_requests) * u128::from(self.window_millis());
        lhs <= rhs
    }

    /// Whether this policy grants no more than `other` on either axis: its
    /// burst (`max_requests`) and its sustained rate are both at most
    /// `other`'s.
    pub fn is_at_least_as_restrictive_as(&self, other: &Policy) -> bool {
        self.max_requests <= other.max_requests && self.rate_at_most(other)
    }
}

/// Maps resource classes to policies, with a default for unknown classes.
///
/// Built once at startup and read-only afterwards, so it can be shared
/// between threads without locking.
///
/// # Example
/// ```
/// use admission_control::{Policy, PolicyTable};
/// use std::time::Duration;
///
/// let table = PolicyTable::builder()
///     .with_policy("auth", Policy::new(5, Duration::from_secs(900)).unwrap())
///     .with_policy("listing", Policy::new(100, Duration::from_secs(60)).unwrap())
///     .build()
///     .unwrap();
///
/// assert_eq!(table.policy_for("listing").max_requests(), 100);
/// // Unknown classes never get more than the strictest configured class.
/// assert_eq!(table.policy_for("unheard-of"), table.policy_for("auth"));
/// ```
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<ResourceClass, Policy, ahash::RandomState>,
    default_policy: Policy,
}

impl PolicyTable {
    /// Start building a table.
    pub fn builder() -> PolicyTableBuilder {
        PolicyTableBuilder::default()
    }

    /// Resolve the policy for a class. Never fails: unknown classes receive the
    /// default policy.
    pub fn policy_for(&self, class: &str) -> &Policy {
        self.policies.get(class).unwrap_or(&self.default_policy)
    }

    /// Whether the class has its own policy.
    pub fn is_configured(&self, class: &str) -> bool {
        self.policies.contains_key(class)
    }

    /// The policy applied to unconfigured classes.
    pub fn default_policy(&self) -> &Policy {
        &self.default_policy
    }

    /// Iterate over configured classes and their policies.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceClass, &Policy)> {
        self.policies.iter()
    }

    /// Number of configured classes (the default is not counted).
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether no class is configured.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Builder for [`PolicyTable`].
#[derive(Debug, Clone, Default)]
pub struct PolicyTableBuilder {
    policies: Vec<(ResourceClass, Policy)>,
    default_policy: Option<Policy>,
}

impl PolicyTableBuilder {
    /// Configure a class. Configuring the same class twice keeps the last policy.
    pub fn with_policy(mut self, class: impl Into<ResourceClass>, policy: Policy) -> Self {
        self.policies.push((class.into(), policy));
        self
    }

    /// Set the default policy explicitly.
    ///
    /// When unset, the default is derived from the configured policies: the
    /// smallest configured burst over a window that keeps the lowest
    /// configured rate.
    pub fn with_default(mut self, policy: Policy) -> Self {
        self.default_policy = Some(policy);
        self
    }

    /// Validate and build the table.
    ///
    /// # Errors
    /// - `PolicyError::EmptyTable` when there is neither a class nor a default.
    /// - `PolicyError::PermissiveDefault` when an explicit default admits a
    ///   larger burst or a higher sustained rate than some configured class.
    pub fn build(self) -> Result<PolicyTable, PolicyError> {
        let mut policies = HashMap::with_hasher(ahash::RandomState::new());
        for (class, policy) in self.policies {
            policies.insert(class, policy);
        }

        let default_policy = match self.default_policy {
            Some(default) => {
                // Report the first violated class by name so errors are stable
                let mut violated: Vec<_> = policies
                    .iter()
                    .filter(|(_, policy)| !default.is_at_least_as_restrictive_as(policy))
                    .map(|(class, _)| class)
                    .collect();
                violated.sort();
                if let Some(class) = violated.first() {
                    return Err(PolicyError::PermissiveDefault {
                        class: class.to_string(),
                    });
                }
                default
            }
            None => derive_default(policies.values()).ok_or(PolicyError::EmptyTable)?,
        };

        Ok(PolicyTable {
            policies,
            default_policy,
        })
    }
}

/// The most generous policy that is still at least as restrictive as every
/// one given: the smallest burst, over a window long enough to keep the
/// lowest sustained rate.
fn derive_default<'a>(policies: impl Iterator<Item = &'a Policy>) -> Option<Policy> {
    let mut policies = policies.peekable();
    let first = **policies.peek()?;

    let (burst, slowest) = policies.fold((first.max_requests, first), |(burst, slowest), p| {
        let slowest = if p.rate_at_most(&slowest) { *p } else { slowest };
        (burst.min(p.max_requests), slowest)
    });

    // Smallest whole-millisecond window with burst / window <= slowest rate
    let numerator = u128::from(burst) * u128::from(slowest.window_millis());
    let window_ms = numerator.div_ceil(u128::from(slowest.max_requests));
    let window_ms = u64::try_from(window_ms).unwrap_or(u64::MAX);

    Some(Policy {
        max_requests: burst,
        window: Duration::from_millis(window_ms),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max: u32, secs: u64) -> Policy {
        Policy::new(max, Duration::from_secs(secs)).unwrap()
    }

    #[test]
    fn test_policy_validation() {
        assert_eq!(
            Policy::new(0, Duration::from_secs(1)),
            Err(PolicyError::ZeroMaxRequests)
        );
        assert_eq!(Policy::new(1, Duration::ZERO), Err(PolicyError::ZeroWindow));
        assert_eq!(
            Policy::new(1, Duration::from_micros(999)),
            Err(PolicyError::ZeroWindow)
        );
        assert!(Policy::new(1, Duration::from_millis(1)).is_ok());
    }

    #[test]
    fn test_from_millis() {
        let p = Policy::from_millis(5, 60_000).unwrap();
        assert_eq!(p.window(), Duration::from_secs(60));
        assert_eq!(p.window_millis(), 60_000);
    }

    #[test]
    fn test_rate_comparison() {
        let five_per_minute = policy(5, 60);
        let ten_per_two_minutes = policy(10, 120);
        let hundred_per_minute = policy(100, 60);

        // Equal rates compare both ways
        assert!(five_per_minute.rate_at_most(&ten_per_two_minutes));
        assert!(ten_per_two_minutes.rate_at_most(&five_per_minute));

        assert!(five_per_minute.rate_at_most(&hundred_per_minute));
        assert!(!hundred_per_minute.rate_at_most(&five_per_minute));
    }

    #[test]
    fn test_restrictiveness_needs_smaller_burst_and_rate() {
        let five_per_minute = policy(5, 60);
        let ten_per_two_minutes = policy(10, 120);
        let thousand_per_day = policy(1_000, 86_400);

        // Same rate, larger burst
        assert!(five_per_minute.is_at_least_as_restrictive_as(&ten_per_two_minutes));
        assert!(!ten_per_two_minutes.is_at_least_as_restrictive_as(&five_per_minute));

        // Lower rate, but a burst two hundred times larger
        assert!(thousand_per_day.rate_at_most(&five_per_minute));
        assert!(!thousand_per_day.is_at_least_as_restrictive_as(&five_per_minute));
        assert!(!five_per_minute.is_at_least_as_restrictive_as(&thousand_per_day));
    }

    #[test]
    fn test_known_and_unknown_classes() {
        let table = PolicyTable::builder()
            .with_policy("auth", policy(5, 900))
            .with_policy("listing", policy(100, 60))
            .with_default(policy(1, 3600))
            .build()
            .unwrap();

        assert_eq!(table.policy_for("auth"), &policy(5, 900));
        assert_eq!(table.policy_for("listing"), &policy(100, 60));
        assert_eq!(table.policy_for("nope"), &policy(1, 3600));
        assert_eq!(table.policy_for(""), &policy(1, 3600));
        assert!(table.is_configured("auth"));
        assert!(!table.is_configured("nope"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_derived_default_is_least_permissive() {
        let table = PolicyTable::builder()
            .with_policy("listing", policy(100, 60))
            .with_policy("mint", policy(5, 3600))
            .with_policy("auth", policy(5, 900))
            .build()
            .unwrap();

        assert_eq!(table.default_policy(), &policy(5, 3600));
    }

    #[test]
    fn test_derived_default_with_equal_rates() {
        let table = PolicyTable::builder()
            .with_policy("b", policy(10, 120))
            .with_policy("a", policy(5, 60))
            .build()
            .unwrap();

        assert_eq!(table.default_policy(), &policy(5, 60));
    }

    #[test]
    fn test_derived_default_takes_smallest_burst_and_lowest_rate() {
        let table = PolicyTable::builder()
            .with_policy("auth", policy(5, 60))
            .with_policy("bulk", policy(1_000, 86_400))
            .build()
            .unwrap();

        // Five requests, spread so the rate matches bulk's 1000 per day
        let default = table.default_policy();
        assert_eq!(default.max_requests(), 5);
        assert_eq!(default.window(), Duration::from_secs(432));
        assert!(default.is_at_least_as_restrictive_as(table.policy_for("auth")));
        assert!(default.is_at_least_as_restrictive_as(table.policy_for("bulk")));
    }

    #[test]
    fn test_derived_default_window_rounds_up() {
        let table = PolicyTable::builder()
            .with_policy("a", Policy::from_millis(2, 1).unwrap())
            .with_policy("b", Policy::from_millis(3, 2).unwrap())
            .build()
            .unwrap();

        // 2 requests at b's rate of 3 per 2ms needs 4/3ms, rounded up to 2ms
        assert_eq!(table.default_policy(), &Policy::from_millis(2, 2).unwrap());
    }

    #[test]
    fn test_large_burst_default_rejected() {
        let err = PolicyTable::builder()
            .with_policy("auth", policy(5, 60))
            .with_default(policy(10_000, 7 * 86_400))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            PolicyError::PermissiveDefault {
                class: "auth".to_string()
            }
        );
    }

    #[test]
    fn test_permissive_default_rejected() {
        let err = PolicyTable::builder()
            .with_policy("auth", policy(5, 900))
            .with_policy("listing", policy(100, 60))
            .with_default(policy(60, 60))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            PolicyError::PermissiveDefault {
                class: "auth".to_string()
            }
        );
    }

    #[test]
    fn test_default_equal_to_strictest_accepted() {
        let table = PolicyTable::builder()
            .with_policy("auth", policy(5, 900))
            .with_default(policy(5, 900))
            .build();
        assert!(table.is_ok());
    }

    #[test]
    fn test_default_only_table() {
        let table = PolicyTable::builder()
            .with_default(policy(10, 60))
            .build()
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.policy_for("anything"), &policy(10, 60));
    }

    #[test]
    fn test_empty_table_rejected() {
        assert_eq!(
            PolicyTable::builder().build().unwrap_err(),
            PolicyError::EmptyTable
        );
    }

    #[test]
    fn test_last_configuration_wins() {
        let table = PolicyTable::builder()
            .with_policy("auth", policy(5, 900))
            .with_policy("auth", policy(3, 900))
            .build()
            .unwrap();
        assert_eq!(table.policy_for("auth").max_requests(), 3);
    }
}
