//! Static configuration for the admission service.
//!
//! An [`AdmissionConfig`] enumerates the quota of each resource class and how
//! it behaves when the counter store fails. It deserializes from any serde
//! format, so hosts can load it from a file or environment at startup and hand
//! it to [`AdmissionServiceBuilder::from_config`](crate::AdmissionServiceBuilder::from_config).
//! Validation happens when the service is built.

use crate::application::circuit_breaker::CircuitBreakerConfig;
use crate::domain::failure::FailureMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for the admission service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Per-class quotas, keyed by resource class name
    #[serde(default)]
    pub classes: BTreeMap<String, ClassConfig>,

    /// Quota for unconfigured classes (default: smallest burst at the slowest rate)
    #[serde(default)]
    pub default_policy: Option<PolicyConfig>,

    /// Failure mode for classes without an override (default: fail_open)
    #[serde(default)]
    pub default_failure_mode: FailureMode,

    /// Circuit breaker guarding the counter store
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
}

/// A quota: `max_requests` per `window_ms` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Requests admitted per window
    pub max_requests: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

/// Quota and failure handling for one resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassConfig {
    /// Requests admitted per window
    pub max_requests: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Overrides the default failure mode for this class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_mode: Option<FailureMode>,
}

impl ClassConfig {
    /// The quota part of the class configuration.
    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig {
            max_requests: self.max_requests,
            window_ms: self.window_ms,
        }
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerSettings {
    /// Consecutive store failures before the circuit opens (default: 5)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Milliseconds before an open circuit lets a probe through (default: 30000)
    #[serde(default = "default_recovery_timeout_ms")]
    pub recovery_timeout_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_ms: default_recovery_timeout_ms(),
        }
    }
}

impl From<CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: CircuitBreakerSettings) -> Self {
        CircuitBreakerConfig {
            failure_threshold: settings.failure_threshold,
            recovery_timeout: Duration::from_millis(settings.recovery_timeout_ms),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_ms() -> u64 {
    30_000
}

const MINUTE_MS: u64 = 60_000;
const HOUR_MS: u64 = 60 * MINUTE_MS;

impl AdmissionConfig {
    /// The reference policy.
    ///
    /// | class     | quota          | on store failure |
    /// |-----------|----------------|------------------|
    /// | `auth`    | 5 per 15 min   | deny             |
    /// | `listing` | 100 per minute | admit            |
    /// | `upload`  | 10 per hour    | admit            |
    /// | `mint`    | 5 per hour     | deny             |
    /// | `general` | 60 per minute  | admit            |
    /// | other     | 5 per hour     | deny             |
    ///
    /// No explicit default is set, so unconfigured classes get the least
    /// permissive quota (`mint`'s) and fail closed. A misspelled class never
    /// ends up with more than the strictest configured class. Route ordinary
    /// traffic to `general`.
    pub fn reference() -> Self {
        let classes = [
            ("auth", 5, 15 * MINUTE_MS, Some(FailureMode::FailClosed)),
            ("listing", 100, MINUTE_MS, Some(FailureMode::FailOpen)),
            ("upload", 10, HOUR_MS, Some(FailureMode::FailOpen)),
            ("mint", 5, HOUR_MS, Some(FailureMode::FailClosed)),
            ("general", 60, MINUTE_MS, Some(FailureMode::FailOpen)),
        ]
        .into_iter()
        .map(|(name, max_requests, window_ms, failure_mode)| {
            (
                name.to_string(),
                ClassConfig {
                    max_requests,
                    window_ms,
                    failure_mode,
                },
            )
        })
        .collect();

        Self {
            classes,
            default_policy: None,
            default_failure_mode: FailureMode::FailClosed,
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self::reference()
    }
}
