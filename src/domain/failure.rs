//! What to decide when the counter store cannot be consulted.

use crate::domain::key::ResourceClass;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Decision applied to a resource class while its counter store is failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Admit the request without accounting
    #[default]
    FailOpen,
    /// Deny the request
    FailClosed,
}

impl FailureMode {
    /// Whether requests are admitted in this mode.
    pub fn admits(&self) -> bool {
        matches!(self, FailureMode::FailOpen)
    }
}

/// Per-class failure modes with a fallback for every other class.
///
/// Deterministic by construction: a class always maps to the same mode.
#[derive(Debug, Clone, Default)]
pub struct FailurePolicy {
    default_mode: FailureMode,
    overrides: HashMap<ResourceClass, FailureMode, ahash::RandomState>,
}

impl FailurePolicy {
    /// Apply `default_mode` to every class without an override.
    pub fn new(default_mode: FailureMode) -> Self {
        Self {
            default_mode,
            overrides: HashMap::default(),
        }
    }

    /// Override the mode for one class.
    pub fn with_override(mut self, class: impl Into<ResourceClass>, mode: FailureMode) -> Self {
        self.overrides.insert(class.into(), mode);
        self
    }

    /// Mode applied to `class`.
    pub fn mode_for(&self, class: &str) -> FailureMode {
        self.overrides
            .get(class)
            .copied()
            .unwrap_or(self.default_mode)
    }

    /// Mode applied to classes without an override.
    pub fn default_mode(&self) -> FailureMode {
        self.default_mode
    }

    /// Classes with an explicit override.
    pub fn overridden_classes(&self) -> impl Iterator<Item = &ResourceClass> {
        self.overrides.keys()
    }
}
