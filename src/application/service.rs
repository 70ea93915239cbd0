//! The admission service: the crate's public entry point.
//!
//! Resolves the policy of a resource class, runs the admission algorithm
//! inside the counter store's atomic section, and translates the outcome into
//! an [`AdmissionResult`].

use crate::application::circuit_breaker::CircuitBreaker;
use crate::application::metrics::Metrics;
use crate::application::ports::{CounterStore, StoreError};
use crate::application::registry::CounterRegistry;
use crate::application::scavenger::{self, Scavenger, ScavengerConfig};
use crate::domain::{
    evaluator::AdmissionAlgorithm,
    failure::FailurePolicy,
    key::{CounterKey, ResourceClass},
    policy::{Policy, PolicyTable},
    result::AdmissionResult,
};
use crate::infrastructure::store::ShardedCounterStore;
use std::panic;
use std::sync::Arc;

/// Decides whether requests may proceed.
///
/// Cheap to clone; clones share the store, metrics and circuit breaker.
/// Construct it with `AdmissionService::builder()`.
#[derive(Clone)]
pub struct AdmissionService<S = Arc<ShardedCounterStore>>
where
    S: CounterStore + Clone,
{
    policies: Arc<PolicyTable>,
    registry: CounterRegistry<S>,
    algorithm: Arc<dyn AdmissionAlgorithm>,
    failure_policy: Arc<FailurePolicy>,
    metrics: Metrics,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl<S> AdmissionService<S>
where
    S: CounterStore + Clone,
{
    /// Assemble a service from its parts.
    ///
    /// Prefer the builder, which validates configuration and wires defaults.
    pub fn new(
        policies: PolicyTable,
        registry: CounterRegistry<S>,
        algorithm: Arc<dyn AdmissionAlgorithm>,
        failure_policy: FailurePolicy,
        metrics: Metrics,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            policies: Arc::new(policies),
            registry,
            algorithm,
            failure_policy: Arc::new(failure_policy),
            metrics,
            circuit_breaker,
        }
    }

    /// Decide whether `caller_identifier` may perform an operation of
    /// `resource_class` now, consuming one unit of its quota if so.
    ///
    /// Unknown classes are evaluated against the default policy and an empty
    /// identifier is an ordinary key. Exactly one store mutation happens per
    /// call, whether the request is admitted or denied. Accounting is never
    /// rolled back, even if the caller abandons the request afterwards.
    ///
    /// # Store Failures
    /// When the store errors, panics, or is bypassed by an open circuit, the
    /// class's [`FailureMode`](crate::FailureMode) decides and the result is
    /// marked `degraded`.
    pub fn check_admission(&self, resource_class: &str, caller_identifier: &str) -> AdmissionResult {
        let policy = *self.policies.policy_for(resource_class);

        let Some(permit) = self.circuit_breaker.try_acquire() else {
            return self.degraded(resource_class, &policy);
        };

        let key = CounterKey::new(ResourceClass::from(resource_class), caller_identifier);
        let algorithm = &self.algorithm;

        let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.registry.with_counter(key, |prior, now| {
                let evaluation = algorithm.evaluate(&policy, now, prior);
                (evaluation.state, evaluation)
            })
        }))
        .unwrap_or(Err(StoreError::Panicked));

        match outcome {
            Ok((state, evaluation)) => {
                self.circuit_breaker.record_success(permit);

                let allowed = evaluation.decision.is_admit();
                if allowed {
                    self.metrics.record_admitted();
                } else {
                    self.metrics.record_denied();
                    tracing::debug!(
                        resource_class,
                        caller = caller_identifier,
                        limit = policy.max_requests(),
                        reset_at = state.window_reset_at.as_millis(),
                        "admission denied"
                    );
                }

                AdmissionResult {
                    allowed,
                    limit: policy.max_requests(),
                    remaining: evaluation.remaining,
                    reset_at: state.window_reset_at,
                    degraded: false,
                }
            }
            Err(error) => {
                self.circuit_breaker.record_failure(permit);
                self.metrics.record_store_failure();
                tracing::warn!(
                    resource_class,
                    error = %error,
                    failure_mode = ?self.failure_policy.mode_for(resource_class),
                    "counter store failed, applying failure mode"
                );
                self.degraded(resource_class, &policy)
            }
        }
    }

    /// Result for a request the store could not account for.
    ///
    /// Fail-open admits with the full budget reported as remaining; fail-closed
    /// denies. Either way the reported window is one policy window from now.
    fn degraded(&self, resource_class: &str, policy: &Policy) -> AdmissionResult {
        let mode = self.failure_policy.mode_for(resource_class);
        let allowed = mode.admits();

        self.metrics.record_degraded();
        if allowed {
            self.metrics.record_admitted();
        } else {
            self.metrics.record_denied();
        }

        AdmissionResult {
            allowed,
            limit: policy.max_requests(),
            remaining: if allowed { policy.max_requests() } else { 0 },
            reset_at: self.registry.now().saturating_add(policy.window()),
            degraded: true,
        }
    }

    /// Remove counters whose window has elapsed.
    ///
    /// Removal never changes a decision: an expired counter and a missing one
    /// are evaluated identically.
    ///
    /// # Returns
    /// The number of counters removed.
    pub fn scavenge(&self) -> Result<usize, StoreError> {
        scavenger::sweep(&self.registry, &self.metrics)
    }

    /// Create a [`Scavenger`] sharing this service's store and metrics.
    ///
    /// Call [`Scavenger::start`] on the result to sweep in the background.
    pub fn scavenger(&self, config: ScavengerConfig) -> Scavenger<S> {
        Scavenger::new(self.registry.clone(), self.metrics.clone(), config)
    }

    /// Get the number of tracked counter keys.
    pub fn tracked_keys(&self) -> usize {
        self.registry.len()
    }

    /// Get a reference to the policy table.
    pub fn policy_table(&self) -> &PolicyTable {
        &self.policies
    }

    /// Get a reference to the failure policy.
    pub fn failure_policy(&self) -> &FailurePolicy {
        &self.failure_policy
    }

    /// Get a reference to the registry.
    pub fn registry(&self) -> &CounterRegistry<S> {
        &self.registry
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Get a reference to the circuit breaker.
    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }
}

impl<S> std::fmt::Debug for AdmissionService<S>
where
    S: CounterStore + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionService")
            .field("policies", &self.policies)
            .field("algorithm", &self.algorithm)
            .field("tracked_keys", &self.registry.len())
            .field("circuit", &self.circuit_breaker.state())
            .finish_non_exhaustive()
    }
}
