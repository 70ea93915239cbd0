//! # admission-control
//!
//! Per-caller, per-resource-class admission control.
//!
//! Every request names a **resource class** (`"auth"`, `"upload"`, ...) and a
//! **caller identifier** (an IP, a user id, a wallet address). The service
//! counts requests per `(class, caller)` pair in fixed windows and admits each
//! one only while the pair is within its class's quota. Every decision comes
//! back as an [`AdmissionResult`] carrying the metadata clients conventionally
//! receive as rate-limit headers.
//!
//! ## Quick Start
//!
//! ```rust
//! use admission_control::AdmissionService;
//! use std::time::Duration;
//!
//! let service = AdmissionService::builder()
//!     .with_policy("auth", 5, Duration::from_secs(15 * 60))
//!     .with_policy("listing", 100, Duration::from_secs(60))
//!     .with_default_policy(5, Duration::from_secs(15 * 60))
//!     .build()
//!     .unwrap();
//!
//! let result = service.check_admission("auth", "ip:1.2.3.4");
//! assert!(result.allowed);
//! assert_eq!(result.limit, 5);
//! assert_eq!(result.remaining, 4);
//!
//! // A default more generous than any configured class is rejected
//! assert!(AdmissionService::builder()
//!     .with_policy("auth", 5, Duration::from_secs(15 * 60))
//!     .with_default_policy(60, Duration::from_secs(60))
//!     .build()
//!     .is_err());
//! ```
//!
//! Or start from the reference configuration, which can also be deserialized
//! from any serde format:
//!
//! ```rust
//! use admission_control::{AdmissionConfig, AdmissionServiceBuilder};
//!
//! let service = AdmissionServiceBuilder::from_config(&AdmissionConfig::reference())
//!     .build()
//!     .unwrap();
//! assert_eq!(service.policy_table().len(), 5);
//! ```
//!
//! ## Semantics
//!
//! - Counting is per key. Different callers, and the same caller under
//!   different classes, never share a quota.
//! - Within one window `remaining` decreases by one per admitted request and
//!   request `max + 1` is denied. Denials do not consume quota.
//! - Once `reset_at` has passed, the next request starts a new window.
//! - Unknown classes are evaluated against the default policy. Its burst and
//!   its sustained rate never exceed those of any configured class.
//! - Concurrent requests for one key are serialized; exactly `max` of any
//!   burst are admitted.
//! - The algorithm is a fixed window and can admit up to twice the quota
//!   across a window boundary. Implement [`AdmissionAlgorithm`] and pass it to
//!   the builder to use a different one.
//!
//! ## Store Failures
//!
//! Each class has a [`FailureMode`] applied when its counter store fails:
//! fail-open admits, fail-closed denies, and either way the result is marked
//! `degraded`. Repeated failures open a [`CircuitBreaker`] so a failing store
//! is not hammered; after the recovery timeout one probe request tests it.
//!
//! ```rust
//! use admission_control::{AdmissionService, CircuitState, FailureMode};
//! use std::time::Duration;
//!
//! let service = AdmissionService::builder()
//!     .with_policy("auth", 5, Duration::from_secs(60))
//!     .with_policy("listing", 100, Duration::from_secs(60))
//!     .with_failure_mode("auth", FailureMode::FailClosed)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(service.circuit_breaker().state(), CircuitState::Closed);
//! ```
//!
//! ## Storage Backends
//!
//! - [`ShardedCounterStore`] (default): in-process, sharded by DashMap
//! - `RedisCounterStore` (feature `redis-storage`): shared across processes,
//!   updated with a compare-and-set script
//!
//! Any [`CounterStore`] implementation can be passed to
//! [`AdmissionServiceBuilder::with_store`].
//!
//! ## Memory
//!
//! Expired counters are indistinguishable from absent ones, so they can be
//! dropped at any time. Call [`AdmissionService::scavenge`] periodically, or
//! with the `async` feature start a background [`Scavenger`]:
//!
//! ```rust,no_run
//! # use admission_control::{AdmissionService, ScavengerConfig};
//! # use std::time::Duration;
//! # async fn example() {
//! let service = AdmissionService::builder()
//!     .with_policy("general", 60, Duration::from_secs(60))
//!     .build()
//!     .unwrap();
//!
//! let handle = service
//!     .scavenger(ScavengerConfig::new(Duration::from_secs(30)).unwrap())
//!     .start();
//!
//! // ... serve requests ...
//!
//! handle.shutdown().await.expect("shutdown failed");
//! # }
//! ```
//!
//! ## Observability
//!
//! The crate logs through `tracing` and never installs a subscriber. Denials
//! and sweeps are logged at `debug`, store failures and circuit transitions at
//! `warn`. Counters are available from [`AdmissionService::metrics`]:
//!
//! ```rust
//! # use admission_control::AdmissionService;
//! # use std::time::Duration;
//! # let service = AdmissionService::builder()
//! #     .with_policy("auth", 1, Duration::from_secs(60))
//! #     .build()
//! #     .unwrap();
//! service.check_admission("auth", "user:1");
//! service.check_admission("auth", "user:1");
//!
//! let snapshot = service.metrics().snapshot();
//! assert_eq!(snapshot.admitted, 1);
//! assert_eq!(snapshot.denied, 1);
//! assert_eq!(snapshot.denial_rate(), 0.5);
//! ```

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    counter::CounterState,
    evaluator::{AdmissionAlgorithm, AdmissionDecision, Evaluation, FixedWindow},
    failure::{FailureMode, FailurePolicy},
    key::{CounterKey, ResourceClass},
    policy::{Policy, PolicyError, PolicyTable, PolicyTableBuilder},
    result::AdmissionResult,
    time::Timestamp,
};

pub use application::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitPermit, CircuitState},
    metrics::{Metrics, MetricsSnapshot},
    ports::{Clock, CounterStore, StoreError},
    registry::CounterRegistry,
    scavenger::{Scavenger, ScavengerConfig, ScavengerConfigError},
    service::AdmissionService,
};

#[cfg(feature = "async")]
pub use application::scavenger::{ScavengerHandle, ShutdownError};

pub use infrastructure::{
    builder::{AdmissionServiceBuilder, BuildError},
    clock::SystemClock,
    config::{AdmissionConfig, CircuitBreakerSettings, ClassConfig, PolicyConfig},
    headers::RateLimitHeaders,
    store::ShardedCounterStore,
};

#[cfg(feature = "redis-storage")]
pub use infrastructure::redis_storage::{RedisCounterStore, RedisStorageConfig};
