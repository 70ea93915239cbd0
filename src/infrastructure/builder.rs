//! Builder wiring an [`AdmissionService`] from validated configuration.

use crate::application::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig},
    metrics::Metrics,
    ports::{Clock, CounterStore},
    registry::CounterRegistry,
    service::AdmissionService,
};
use crate::domain::{
    evaluator::{AdmissionAlgorithm, FixedWindow},
    failure::{FailureMode, FailurePolicy},
    key::ResourceClass,
    policy::{Policy, PolicyError, PolicyTable},
};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::config::{AdmissionConfig, PolicyConfig};
use crate::infrastructure::store::ShardedCounterStore;
use std::sync::Arc;
use std::time::Duration;

/// Error returned when building an admission service fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The policy table as a whole is invalid
    Policy(PolicyError),
    /// A class was configured with an invalid quota
    InvalidPolicy {
        /// The offending class
        class: String,
        /// Why its quota was rejected
        source: PolicyError,
    },
    /// A failure mode override names a class with no configured quota
    UnknownFailureModeClass {
        /// The unknown class
        class: String,
    },
    /// Circuit breaker failure threshold must be greater than zero
    ZeroFailureThreshold,
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Policy(e) => write!(f, "policy configuration error: {}", e),
            BuildError::InvalidPolicy { class, source } => {
                write!(f, "invalid policy for class '{}': {}", class, source)
            }
            BuildError::UnknownFailureModeClass { class } => {
                write!(f, "failure mode configured for unknown class '{}'", class)
            }
            BuildError::ZeroFailureThreshold => {
                write!(f, "circuit breaker failure threshold must be greater than 0")
            }
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Policy(e) | BuildError::InvalidPolicy { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

impl From<PolicyError> for BuildError {
    fn from(e: PolicyError) -> Self {
        BuildError::Policy(e)
    }
}

/// Builder for constructing an [`AdmissionService`].
///
/// Quotas are given as raw numbers and validated together in
/// [`build`](Self::build), so a single misconfigured class surfaces as one
/// descriptive error at startup.
pub struct AdmissionServiceBuilder<S = Arc<ShardedCounterStore>> {
    policies: Vec<(ResourceClass, u32, Duration)>,
    default_policy: Option<(u32, Duration)>,
    default_failure_mode: FailureMode,
    failure_overrides: Vec<(ResourceClass, FailureMode)>,
    clock: Option<Arc<dyn Clock>>,
    algorithm: Option<Arc<dyn AdmissionAlgorithm>>,
    circuit_breaker: CircuitBreakerConfig,
    store: S,
}

impl AdmissionServiceBuilder {
    /// Create a builder with no classes, an in-memory store and the
    /// fixed-window algorithm.
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
            default_policy: None,
            default_failure_mode: FailureMode::default(),
            failure_overrides: Vec::new(),
            clock: None,
            algorithm: None,
            circuit_breaker: CircuitBreakerConfig::default(),
            store: Arc::new(ShardedCounterStore::new()),
        }
    }

    /// Create a builder populated from a static configuration.
    ///
    /// # Example
    /// ```
    /// use admission_control::{AdmissionConfig, AdmissionServiceBuilder};
    ///
    /// let service = AdmissionServiceBuilder::from_config(&AdmissionConfig::reference())
    ///     .build()
    ///     .unwrap();
    ///
    /// let result = service.check_admission("auth", "ip:1.2.3.4");
    /// assert!(result.allowed);
    /// assert_eq!(result.remaining, 4);
    /// ```
    pub fn from_config(config: &AdmissionConfig) -> Self {
        Self::new().with_config(config)
    }
}

impl Default for AdmissionServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> AdmissionServiceBuilder<S> {
    /// Apply every setting of `config` on top of this builder.
    pub fn with_config(mut self, config: &AdmissionConfig) -> Self {
        for (class, class_config) in &config.classes {
            self = self.with_policy(
                class.as_str(),
                class_config.max_requests,
                Duration::from_millis(class_config.window_ms),
            );
            if let Some(mode) = class_config.failure_mode {
                self = self.with_failure_mode(class.as_str(), mode);
            }
        }
        if let Some(PolicyConfig {
            max_requests,
            window_ms,
        }) = config.default_policy
        {
            self = self.with_default_policy(max_requests, Duration::from_millis(window_ms));
        }
        self.default_failure_mode = config.default_failure_mode;
        self.circuit_breaker = config.circuit_breaker.into();
        self
    }

    /// Configure the quota of a resource class.
    ///
    /// The quota will be validated when `build()` is called.
    pub fn with_policy(
        mut self,
        class: impl Into<ResourceClass>,
        max_requests: u32,
        window: Duration,
    ) -> Self {
        self.policies.push((class.into(), max_requests, window));
        self
    }

    /// Set the quota for unconfigured classes.
    ///
    /// When unset, a quota is derived from the smallest burst and the slowest
    /// rate across configured classes.
    pub fn with_default_policy(mut self, max_requests: u32, window: Duration) -> Self {
        self.default_policy = Some((max_requests, window));
        self
    }

    /// Override the failure mode of a configured class.
    pub fn with_failure_mode(mut self, class: impl Into<ResourceClass>, mode: FailureMode) -> Self {
        self.failure_overrides.push((class.into(), mode));
        self
    }

    /// Set the failure mode for classes without an override.
    pub fn with_default_failure_mode(mut self, mode: FailureMode) -> Self {
        self.default_failure_mode = mode;
        self
    }

    /// Set a custom clock (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the fixed-window algorithm.
    pub fn with_algorithm(mut self, algorithm: Arc<dyn AdmissionAlgorithm>) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Configure the circuit breaker guarding the store.
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    /// Use a different counter store.
    pub fn with_store<S2>(self, store: S2) -> AdmissionServiceBuilder<S2>
    where
        S2: CounterStore + Clone,
    {
        AdmissionServiceBuilder {
            policies: self.policies,
            default_policy: self.default_policy,
            default_failure_mode: self.default_failure_mode,
            failure_overrides: self.failure_overrides,
            clock: self.clock,
            algorithm: self.algorithm,
            circuit_breaker: self.circuit_breaker,
            store,
        }
    }
}

impl<S> AdmissionServiceBuilder<S>
where
    S: CounterStore + Clone,
{
    /// Build the service.
    ///
    /// # Errors
    /// Returns `BuildError` if the configuration is invalid.
    pub fn build(self) -> Result<AdmissionService<S>, BuildError> {
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(BuildError::ZeroFailureThreshold);
        }

        let mut table = PolicyTable::builder();
        for (class, max_requests, window) in self.policies {
            let policy = Policy::new(max_requests, window).map_err(|source| {
                BuildError::InvalidPolicy {
                    class: class.to_string(),
                    source,
                }
            })?;
            table = table.with_policy(class, policy);
        }
        if let Some((max_requests, window)) = self.default_policy {
            table = table.with_default(Policy::new(max_requests, window)?);
        }
        let policies = table.build()?;

        let mut failure_policy = FailurePolicy::new(self.default_failure_mode);
        for (class, mode) in self.failure_overrides {
            if !policies.is_configured(class.as_str()) {
                return Err(BuildError::UnknownFailureModeClass {
                    class: class.to_string(),
                });
            }
            failure_policy = failure_policy.with_override(class, mode);
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let algorithm = self.algorithm.unwrap_or_else(|| Arc::new(FixedWindow));
        let circuit_breaker = Arc::new(CircuitBreaker::new(self.circuit_breaker, clock.clone()));
        let registry = CounterRegistry::new(self.store, clock);

        let default = policies.default_policy();
        tracing::info!(
            classes = policies.len(),
            default_max_requests = default.max_requests(),
            default_window_ms = default.window_millis(),
            default_failure_mode = ?failure_policy.default_mode(),
            algorithm = ?algorithm,
            "admission service built"
        );

        Ok(AdmissionService::new(
            policies,
            registry,
            algorithm,
            failure_policy,
            Metrics::new(),
            circuit_breaker,
        ))
    }
}

impl AdmissionService<Arc<ShardedCounterStore>> {
    /// Create a builder for configuring the service.
    ///
    /// Defaults:
    /// - Store: in-memory, sharded
    /// - Algorithm: fixed window
    /// - Clock: system wall clock
    /// - Failure mode: fail open
    /// - Circuit breaker: opens after 5 consecutive failures, probes after 30s
    pub fn builder() -> AdmissionServiceBuilder {
        AdmissionServiceBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time::Timestamp;
    use crate::infrastructure::mocks::MockClock;

    #[test]
    fn test_build_minimal() {
        let service = AdmissionService::builder()
            .with_policy("auth", 5, Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(service.policy_table().len(), 1);
        assert_eq!(service.policy_table().default_policy().max_requests(), 5);
    }

    #[test]
    fn test_default_matching_strictest_class_builds() {
        let service = AdmissionService::builder()
            .with_policy("auth", 5, Duration::from_secs(15 * 60))
            .with_policy("listing", 100, Duration::from_secs(60))
            .with_default_policy(5, Duration::from_secs(15 * 60))
            .build()
            .unwrap();

        let default = service.policy_table().default_policy();
        assert_eq!(default.max_requests(), 5);
        assert_eq!(default.window(), Duration::from_secs(900));
    }

    #[test]
    fn test_empty_builder_is_rejected() {
        assert!(matches!(
            AdmissionService::builder().build(),
            Err(BuildError::Policy(PolicyError::EmptyTable))
        ));
    }

    #[test]
    fn test_invalid_class_policy_names_class() {
        let err = AdmissionService::builder()
            .with_policy("auth", 5, Duration::from_secs(60))
            .with_policy("upload", 0, Duration::from_secs(60))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            BuildError::InvalidPolicy {
                class: "upload".to_string(),
                source: PolicyError::ZeroMaxRequests,
            }
        );
        assert!(err.to_string().contains("upload"));
    }

    #[test]
    fn test_long_window_default_with_large_burst_rejected() {
        let result = AdmissionService::builder()
            .with_policy("auth", 5, Duration::from_secs(60))
            .with_default_policy(10_000, Duration::from_secs(7 * 86_400))
            .build();
        assert_eq!(
            result.unwrap_err(),
            BuildError::Policy(PolicyError::PermissiveDefault {
                class: "auth".to_string()
            })
        );
    }

    #[test]
    fn test_permissive_default_rejected() {
        let result = AdmissionService::builder()
            .with_policy("auth", 5, Duration::from_secs(60))
            .with_default_policy(1_000, Duration::from_secs(60))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::Policy(PolicyError::PermissiveDefault { .. }))
        ));
    }

    #[test]
    fn test_unknown_failure_mode_class() {
        let result = AdmissionService::builder()
            .with_policy("auth", 5, Duration::from_secs(60))
            .with_failure_mode("mint", FailureMode::FailClosed)
            .build();
        assert_eq!(
            result.unwrap_err(),
            BuildError::UnknownFailureModeClass {
                class: "mint".to_string()
            }
        );
    }

    #[test]
    fn test_zero_failure_threshold() {
        let result = AdmissionService::builder()
            .with_policy("auth", 5, Duration::from_secs(60))
            .with_circuit_breaker(CircuitBreakerConfig {
                failure_threshold: 0,
                recovery_timeout: Duration::from_secs(1),
            })
            .build();
        assert!(matches!(result, Err(BuildError::ZeroFailureThreshold)));
    }

    #[test]
    fn test_from_reference_config() {
        let clock = Arc::new(MockClock::new(Timestamp::UNIX_EPOCH));
        let service = AdmissionServiceBuilder::from_config(&AdmissionConfig::reference())
            .with_clock(clock)
            .build()
            .unwrap();

        let table = service.policy_table();
        assert_eq!(table.len(), 5);
        assert_eq!(table.policy_for("upload").max_requests(), 10);
        assert_eq!(table.policy_for("unlisted"), table.policy_for("mint"));

        let failures = service.failure_policy();
        assert_eq!(failures.mode_for("auth"), FailureMode::FailClosed);
        assert_eq!(failures.mode_for("mint"), FailureMode::FailClosed);
        assert_eq!(failures.mode_for("upload"), FailureMode::FailOpen);
        assert_eq!(failures.mode_for("general"), FailureMode::FailOpen);
        assert_eq!(failures.mode_for("unlisted"), FailureMode::FailClosed);

        let result = service.check_admission("mint", "wallet:0xabc");
        assert_eq!(result.reset_at, Timestamp::from_millis(3_600_000));
    }

    #[test]
    fn test_with_store_keeps_settings() {
        let store = Arc::new(ShardedCounterStore::new());
        let service = AdmissionService::builder()
            .with_policy("auth", 2, Duration::from_secs(60))
            .with_store(store.clone())
            .build()
            .unwrap();

        service.check_admission("auth", "user:1");
        assert_eq!(store.len(), 1);
        assert_eq!(service.policy_table().policy_for("auth").max_requests(), 2);
    }
}
