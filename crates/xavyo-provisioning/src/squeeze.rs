//! Squeezed value triples
//!
//! Mapping evaluation produces, for every item of a projection, the values
//! that should be added (`plus`), kept (`zero`) and removed (`minus`). Each
//! value remembers the mapping it came from so reconciliation can weigh it by
//! strength.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How forcefully a mapping applies its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStrength {
    /// Applies only when the target has no value.
    Weak,
    #[default]
    Normal,
    /// Always applies, overriding existing values.
    Strong,
}

impl MappingStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingStrength::Weak => "weak",
            MappingStrength::Normal => "normal",
            MappingStrength::Strong => "strong",
        }
    }
}

impl fmt::Display for MappingStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MappingStrength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weak" => Ok(MappingStrength::Weak),
            "normal" => Ok(MappingStrength::Normal),
            "strong" => Ok(MappingStrength::Strong),
            _ => Err(format!("Unknown mapping strength: {s}")),
        }
    }
}

/// The mapping a value was produced by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingOrigin {
    pub name: String,
    pub strength: MappingStrength,
}

impl MappingOrigin {
    pub fn new(name: impl Into<String>, strength: MappingStrength) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            strength,
        })
    }

    pub fn weak(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, MappingStrength::Weak)
    }

    pub fn normal(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, MappingStrength::Normal)
    }

    pub fn strong(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, MappingStrength::Strong)
    }
}

/// A value together with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueWithOrigin<V> {
    pub value: V,
    /// Producing mapping; `None` for values requested directly by the caller.
    pub mapping: Option<Arc<MappingOrigin>>,
    /// Invalid values (e.g. from a mapping whose condition does not hold) are
    /// carried along but never count as should-be values.
    pub valid: bool,
}

impl<V> ValueWithOrigin<V> {
    pub fn from_mapping(value: V, mapping: &Arc<MappingOrigin>) -> Self {
        Self {
            value,
            mapping: Some(Arc::clone(mapping)),
            valid: true,
        }
    }

    /// A value requested by the caller directly (primary delta).
    pub fn requested(value: V) -> Self {
        Self {
            value,
            mapping: None,
            valid: true,
        }
    }

    #[must_use]
    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    /// Effective strength; caller-requested values count as strong.
    pub fn strength(&self) -> MappingStrength {
        self.mapping
            .as_ref()
            .map_or(MappingStrength::Strong, |m| m.strength)
    }

    pub fn is_weak(&self) -> bool {
        self.strength() == MappingStrength::Weak
    }

    pub fn is_strong(&self) -> bool {
        self.strength() == MappingStrength::Strong
    }

    pub fn mapping_name(&self) -> Option<&str> {
        self.mapping.as_ref().map(|m| m.name.as_str())
    }
}

/// Plus/zero/minus partition of the values computed for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct SqueezedTriple<V> {
    plus: Vec<ValueWithOrigin<V>>,
    zero: Vec<ValueWithOrigin<V>>,
    minus: Vec<ValueWithOrigin<V>>,
}

impl<V> Default for SqueezedTriple<V> {
    fn default() -> Self {
        Self {
            plus: Vec::new(),
            zero: Vec::new(),
            minus: Vec::new(),
        }
    }
}

impl<V> SqueezedTriple<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_to_plus(&mut self, value: ValueWithOrigin<V>) {
        self.plus.push(value);
    }

    pub fn add_to_zero(&mut self, value: ValueWithOrigin<V>) {
        self.zero.push(value);
    }

    pub fn add_to_minus(&mut self, value: ValueWithOrigin<V>) {
        self.minus.push(value);
    }

    #[must_use]
    pub fn with_plus(mut self, value: ValueWithOrigin<V>) -> Self {
        self.plus.push(value);
        self
    }

    #[must_use]
    pub fn with_zero(mut self, value: ValueWithOrigin<V>) -> Self {
        self.zero.push(value);
        self
    }

    #[must_use]
    pub fn with_minus(mut self, value: ValueWithOrigin<V>) -> Self {
        self.minus.push(value);
        self
    }

    pub fn plus(&self) -> &[ValueWithOrigin<V>] {
        &self.plus
    }

    pub fn zero(&self) -> &[ValueWithOrigin<V>] {
        &self.zero
    }

    pub fn minus(&self) -> &[ValueWithOrigin<V>] {
        &self.minus
    }

    /// Values that should be present: new (plus) and unchanged (zero).
    pub fn non_negative(&self) -> impl Iterator<Item = &ValueWithOrigin<V>> {
        self.plus.iter().chain(self.zero.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.plus.is_empty() && self.zero.is_empty() && self.minus.is_empty()
    }
}
