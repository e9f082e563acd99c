//! Definition layers, access limitations and lifecycle visibility.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Layer through which a definition is viewed.
///
/// The model layer is used for computation, the presentation layer for
/// display. Customizations may limit access differently per layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    #[default]
    Model,
    Presentation,
}

impl LayerType {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerType::Model => "model",
            LayerType::Presentation => "presentation",
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read/add/modify access flags of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyAccess {
    pub read: bool,
    pub add: bool,
    pub modify: bool,
}

impl PropertyAccess {
    /// Full access.
    pub const ALL: PropertyAccess = PropertyAccess {
        read: true,
        add: true,
        modify: true,
    };

    /// Read-only access.
    pub const READ_ONLY: PropertyAccess = PropertyAccess {
        read: true,
        add: false,
        modify: false,
    };

    /// Intersect two access sets.
    #[must_use]
    pub fn restrict(self, other: PropertyAccess) -> PropertyAccess {
        PropertyAccess {
            read: self.read && other.read,
            add: self.add && other.add,
            modify: self.modify && other.modify,
        }
    }
}

impl Default for PropertyAccess {
    fn default() -> Self {
        Self::ALL
    }
}

/// Access limitations configured for a set of layers.
///
/// An empty layer list applies to every layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyLimitations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<LayerType>,

    #[serde(default)]
    pub access: PropertyAccess,

    /// Whether the item is processed at all in this layer.
    #[serde(default)]
    pub ignore: bool,
}

impl PropertyLimitations {
    /// Check whether these limitations apply to the given layer.
    pub fn applies_to(&self, layer: LayerType) -> bool {
        self.layers.is_empty() || self.layers.contains(&layer)
    }
}

/// Lifecycle state of a configuration item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Active,
    /// Being tested; visible only in development mode.
    Proposed,
    /// Being phased out; still visible everywhere.
    Deprecated,
}

impl LifecycleState {
    /// Check whether an item in this state is visible under `mode`.
    pub fn is_visible(&self, mode: ExecutionMode) -> bool {
        match self {
            LifecycleState::Active | LifecycleState::Deprecated => true,
            LifecycleState::Proposed => mode == ExecutionMode::Development,
        }
    }
}

/// Mode of the current computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Production,
    /// Simulation and configuration testing.
    Development,
}
