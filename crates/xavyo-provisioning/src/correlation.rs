//! Correlator Context
//!
//! Configuration of a (possibly composite) correlation rule, paired with the
//! synchronization configuration it belongs to. Child contexts spawned for
//! nested correlators share the synchronization configuration and point back
//! to their parent without keeping it alive.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

use xavyo_resource::schema::{ObjectTypeIdentification, ResourceObjectDefinition};

/// One attribute compared when correlating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationItem {
    /// Attribute of the resource object.
    pub attribute: String,

    /// Compare through the attribute's matching rule rather than exactly.
    #[serde(default = "default_true")]
    pub use_matching_rule: bool,
}

fn default_true() -> bool {
    true
}

/// Correlation rule configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CorrelatorConfiguration {
    /// Match when all items match.
    Items {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<u32>,
        items: Vec<CorrelationItem>,
        /// Skip this correlator when one of these already matched.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        ignore_if_matched_by: Vec<String>,
    },
    /// Evaluate child correlators in order.
    Composite {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        correlators: Vec<CorrelatorConfiguration>,
    },
}

impl CorrelatorConfiguration {
    pub fn name(&self) -> Option<&str> {
        match self {
            CorrelatorConfiguration::Items { name, .. }
            | CorrelatorConfiguration::Composite { name, .. } => name.as_deref(),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, CorrelatorConfiguration::Composite { .. })
    }

    /// Child correlators of a composite, in evaluation order.
    pub fn children(&self) -> Vec<&CorrelatorConfiguration> {
        match self {
            CorrelatorConfiguration::Items { .. } => Vec::new(),
            CorrelatorConfiguration::Composite { correlators, .. } => {
                let mut children: Vec<_> = correlators.iter().collect();
                children.sort_by_key(|c| match c {
                    CorrelatorConfiguration::Items { order, .. } => order.unwrap_or(u32::MAX),
                    CorrelatorConfiguration::Composite { .. } => u32::MAX,
                });
                children
            }
        }
    }

    /// Composite built from the correlator hints of an object definition.
    ///
    /// Returns `None` when no attribute is marked as a correlation item.
    pub fn from_definition(definition: &ResourceObjectDefinition) -> Option<Self> {
        let correlators: Vec<_> = definition
            .all_attribute_definitions()
            .into_iter()
            .filter_map(|attr_def| {
                let hint = attr_def.correlator()?;
                Some(CorrelatorConfiguration::Items {
                    name: Some(
                        hint.name
                            .clone()
                            .unwrap_or_else(|| attr_def.name().to_string()),
                    ),
                    order: hint.order,
                    items: vec![CorrelationItem {
                        attribute: attr_def.name().to_string(),
                        use_matching_rule: true,
                    }],
                    ignore_if_matched_by: hint.ignore_if_matched_by.clone(),
                })
            })
            .collect();
        if correlators.is_empty() {
            return None;
        }
        Some(CorrelatorConfiguration::Composite {
            name: Some(definition.object_class_name().to_string()),
            correlators,
        })
    }
}

/// Synchronization configuration a correlator runs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynchronizationConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Object type the synchronization applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<ObjectTypeIdentification>,

    /// Link a correlated owner without asking.
    #[serde(default = "default_true")]
    pub opportunistic: bool,

    /// Correlator used when no other is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_correlator: Option<CorrelatorConfiguration>,
}

#[derive(Debug)]
struct ContextInner {
    configuration: CorrelatorConfiguration,
    synchronization: Option<Arc<SynchronizationConfiguration>>,
    parent: Option<Weak<ContextInner>>,
    depth: usize,
}

/// A correlator configuration in its synchronization setting.
///
/// Cheap to clone; clones share the same context.
#[derive(Debug, Clone)]
pub struct CorrelatorContext {
    inner: Arc<ContextInner>,
}

impl CorrelatorContext {
    pub fn new(configuration: CorrelatorConfiguration) -> Self {
        Self::root(configuration, None)
    }

    pub fn with_synchronization(
        configuration: CorrelatorConfiguration,
        synchronization: Arc<SynchronizationConfiguration>,
    ) -> Self {
        Self::root(configuration, Some(synchronization))
    }

    /// Context of the synchronization's default correlator.
    pub fn for_synchronization(synchronization: Arc<SynchronizationConfiguration>) -> Option<Self> {
        let configuration = synchronization.default_correlator.clone()?;
        Some(Self::root(configuration, Some(synchronization)))
    }

    fn root(
        configuration: CorrelatorConfiguration,
        synchronization: Option<Arc<SynchronizationConfiguration>>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                configuration,
                synchronization,
                parent: None,
                depth: 0,
            }),
        }
    }

    pub fn configuration(&self) -> &CorrelatorConfiguration {
        &self.inner.configuration
    }

    pub fn synchronization(&self) -> Option<&SynchronizationConfiguration> {
        self.inner.synchronization.as_deref()
    }

    /// Parent context, while something still holds it.
    pub fn parent(&self) -> Option<CorrelatorContext> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| CorrelatorContext { inner })
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// Nesting level; the root is 0.
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// Context for a nested correlator, keeping the synchronization
    /// configuration of this one.
    pub fn spawn(&self, configuration: CorrelatorConfiguration) -> CorrelatorContext {
        CorrelatorContext {
            inner: Arc::new(ContextInner {
                configuration,
                synchronization: self.inner.synchronization.clone(),
                parent: Some(Arc::downgrade(&self.inner)),
                depth: self.inner.depth + 1,
            }),
        }
    }

    /// Contexts for the children of a composite correlator.
    pub fn spawn_children(&self) -> Vec<CorrelatorContext> {
        self.configuration()
            .children()
            .into_iter()
            .map(|child| self.spawn(child.clone()))
            .collect()
    }

    /// Whether two contexts share the same synchronization configuration.
    pub fn same_synchronization(&self, other: &CorrelatorContext) -> bool {
        match (&self.inner.synchronization, &other.inner.synchronization) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}
