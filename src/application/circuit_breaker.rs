//! Circuit breaker guarding the counter store.
//!
//! After repeated store failures the breaker opens and the service stops
//! calling the store, deciding by failure mode instead. Once the recovery
//! timeout has passed a single probe is let through (half-open); its outcome
//! closes or reopens the circuit.

use crate::application::ports::Clock;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Store calls proceed normally
    Closed = 0,
    /// Store is bypassed; failure modes decide
    Open = 1,
    /// One probe request is testing the store
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Grant to call the store while the circuit allows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitPermit {
    /// The circuit is closed
    Normal,
    /// The single trial call of a half-open circuit
    Probe,
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,
    /// Duration to wait before probing the store again
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

/// Lock-free circuit breaker driven by a [`Clock`].
#[derive(Debug)]
pub struct CircuitBreaker {
    state: AtomicU8,
    consecutive_failures: AtomicU64,
    last_failure_millis: AtomicU64,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Create a circuit breaker.
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Closed as u8),
            consecutive_failures: AtomicU64::new(0),
            last_failure_millis: AtomicU64::new(0),
            config,
            clock,
        }
    }

    /// Get the current circuit state.
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Get the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Ask to call the store.
    ///
    /// Returns `None` while the circuit is open and the recovery timeout has
    /// not elapsed. When it has, exactly one caller wins the transition to
    /// half-open and receives [`CircuitPermit::Probe`]. The outcome must be
    /// reported back with the permit.
    pub fn try_acquire(&self) -> Option<CircuitPermit> {
        match self.state() {
            CircuitState::Closed => Some(CircuitPermit::Normal),
            CircuitState::Open => {
                let now = self.clock.now().as_millis();
                let last_failure = self.last_failure_millis.load(Ordering::Acquire);

                if now.saturating_sub(last_failure) < self.recovery_timeout_millis() {
                    return None;
                }
                self.state
                    .compare_exchange(
                        CircuitState::Open as u8,
                        CircuitState::HalfOpen as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .ok()
                    .map(|_| CircuitPermit::Probe)
            }
            // The probe is already in flight
            CircuitState::HalfOpen => None,
        }
    }

    /// Record a successful store operation.
    ///
    /// Only the probe can close a half-open circuit. Normal calls that
    /// started before the circuit tripped and finish afterwards are ignored.
    pub fn record_success(&self, permit: CircuitPermit) {
        match permit {
            CircuitPermit::Probe => {
                let closed = self
                    .state
                    .compare_exchange(
                        CircuitState::HalfOpen as u8,
                        CircuitState::Closed as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok();
                if closed {
                    self.consecutive_failures.store(0, Ordering::Release);
                    tracing::info!("counter store recovered, circuit closed");
                }
            }
            CircuitPermit::Normal => {
                if self.state() == CircuitState::Closed {
                    self.consecutive_failures.store(0, Ordering::Release);
                }
            }
        }
    }

    /// Record a failed store operation.
    ///
    /// A failed probe reopens the circuit. Normal failures count towards the
    /// threshold only while the circuit is closed.
    pub fn record_failure(&self, permit: CircuitPermit) {
        match permit {
            CircuitPermit::Probe => {
                self.last_failure_millis
                    .store(self.clock.now().as_millis(), Ordering::Release);
                let reopened = self
                    .state
                    .compare_exchange(
                        CircuitState::HalfOpen as u8,
                        CircuitState::Open as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok();
                if reopened {
                    tracing::warn!("counter store probe failed, circuit reopened");
                }
            }
            CircuitPermit::Normal => {
                if self.state() != CircuitState::Closed {
                    return;
                }
                let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                if failures < u64::from(self.config.failure_threshold) {
                    return;
                }

                // Stamp before opening so a concurrent acquire sees the new time
                self.last_failure_millis
                    .store(self.clock.now().as_millis(), Ordering::Release);
                let opened = self
                    .state
                    .compare_exchange(
                        CircuitState::Closed as u8,
                        CircuitState::Open as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok();
                if opened {
                    tracing::warn!(
                        consecutive_failures = failures,
                        recovery_timeout_ms = self.recovery_timeout_millis(),
                        "counter store failing, circuit opened"
                    );
                }
            }
        }
    }

    fn recovery_timeout_millis(&self) -> u64 {
        u64::try_from(self.config.recovery_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Get the number of consecutive failures.
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    /// Reset the circuit breaker to closed state.
    pub fn reset(&self) {
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);
        self.consecutive_failures.store(0, Ordering::Release);
    }
}
