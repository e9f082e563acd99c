//! Administrator customization overlays for attribute definitions.

use serde::{Deserialize, Serialize};

use super::layer::{LifecycleState, PropertyLimitations};
use crate::matching::MatchingRule;

/// How an attribute is obtained when reading a resource object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Fetched when the connector returns it by default.
    #[default]
    Implicit,
    /// Always requested explicitly.
    Explicit,
    /// Not fetched unless needed.
    Minimal,
}

/// Marks an attribute as a correlation item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelatorHint {
    /// Correlator name; defaults to the attribute name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Evaluation order among sibling correlators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,

    /// Names of correlators whose match makes this one unnecessary.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_if_matched_by: Vec<String>,
}

/// Customization of a native attribute definition.
///
/// Every field is optional; the overlay only changes what it sets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeCustomization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_order: Option<u32>,

    /// Ignored attributes are invisible to provisioning.
    pub ignored: bool,

    pub lifecycle_state: LifecycleState,

    /// `None` means tolerant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerant: Option<bool>,

    /// Real values matching these are kept by reconciliation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tolerant_value_patterns: Vec<String>,

    /// Real values matching these are removed by reconciliation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub intolerant_value_patterns: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub limitations: Vec<PropertyLimitations>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub matching_rule: Option<MatchingRule>,

    /// Forces the attribute in or out of the secondary identifier set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_identifier: Option<bool>,

    pub fetch_strategy: FetchStrategy,

    /// Value may change on the resource without a provisioning operation.
    pub volatile: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlator: Option<CorrelatorHint>,
}

impl AttributeCustomization {
    /// Create an empty overlay.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    #[must_use]
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    #[must_use]
    pub fn tolerant(mut self, tolerant: bool) -> Self {
        self.tolerant = Some(tolerant);
        self
    }

    #[must_use]
    pub fn with_tolerant_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.tolerant_value_patterns.push(pattern.into());
        self
    }

    #[must_use]
    pub fn with_intolerant_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.intolerant_value_patterns.push(pattern.into());
        self
    }

    #[must_use]
    pub fn with_limitations(mut self, limitations: PropertyLimitations) -> Self {
        self.limitations.push(limitations);
        self
    }

    #[must_use]
    pub fn with_lifecycle_state(mut self, state: LifecycleState) -> Self {
        self.lifecycle_state = state;
        self
    }

    #[must_use]
    pub fn with_matching_rule(mut self, rule: MatchingRule) -> Self {
        self.matching_rule = Some(rule);
        self
    }

    #[must_use]
    pub fn with_fetch_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.fetch_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_correlator(mut self, hint: CorrelatorHint) -> Self {
        self.correlator = Some(hint);
        self
    }
}
