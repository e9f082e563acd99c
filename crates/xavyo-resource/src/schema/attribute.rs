//! Attribute definitions: native metadata plus customization, per layer.

use std::fmt;
use std::sync::Arc;

use super::customization::{AttributeCustomization, CorrelatorHint, FetchStrategy};
use super::layer::{ExecutionMode, LayerType, LifecycleState, PropertyAccess};
use super::native::{AttributeDataType, NativeAttributeDefinition};
use super::patterns::ValuePatterns;
use crate::error::{ResourceError, ResourceResult};
use crate::item::Attribute;
use crate::matching::MatchingRule;
use crate::value::AttributeValue;

/// Subtype of an attribute definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    /// Plain value attribute.
    Simple,
    /// Reference attribute backing an association.
    Reference,
}

#[derive(Debug)]
struct DefinitionSources {
    native: NativeAttributeDefinition,
    customization: AttributeCustomization,
    patterns: ValuePatterns,
}

/// Definition of one resource object attribute.
///
/// Immutable. The native and customization sources are shared between all
/// clones and layer variants; only the layer and access override are
/// per-instance.
#[derive(Clone)]
pub struct AttributeDefinition {
    sources: Arc<DefinitionSources>,
    layer: LayerType,
    access_override: Option<PropertyAccess>,
}

impl AttributeDefinition {
    /// Combine native metadata with a customization overlay.
    ///
    /// Fails with a configuration error when a value pattern does not compile.
    pub fn new(
        native: NativeAttributeDefinition,
        customization: AttributeCustomization,
    ) -> ResourceResult<Self> {
        let patterns = ValuePatterns::compile(
            &customization.tolerant_value_patterns,
            &customization.intolerant_value_patterns,
        )?;
        Ok(Self {
            sources: Arc::new(DefinitionSources {
                native,
                customization,
                patterns,
            }),
            layer: LayerType::Model,
            access_override: None,
        })
    }

    /// Definition without customization.
    pub fn from_native(native: NativeAttributeDefinition) -> Self {
        Self {
            sources: Arc::new(DefinitionSources {
                native,
                customization: AttributeCustomization::default(),
                patterns: ValuePatterns::default(),
            }),
            layer: LayerType::Model,
            access_override: None,
        }
    }

    /// View of this definition in another layer.
    #[must_use]
    pub fn for_layer(&self, layer: LayerType) -> Self {
        Self {
            sources: Arc::clone(&self.sources),
            layer,
            access_override: self.access_override,
        }
    }

    /// Copy with an explicit access override applied on top of the limitations.
    #[must_use]
    pub fn with_access_override(&self, access: PropertyAccess) -> Self {
        Self {
            sources: Arc::clone(&self.sources),
            layer: self.layer,
            access_override: Some(access),
        }
    }

    pub fn native(&self) -> &NativeAttributeDefinition {
        &self.sources.native
    }

    pub fn customization(&self) -> &AttributeCustomization {
        &self.sources.customization
    }

    pub fn name(&self) -> &str {
        &self.sources.native.name
    }

    pub fn native_name(&self) -> &str {
        &self.sources.native.native_name
    }

    pub fn data_type(&self) -> AttributeDataType {
        self.sources.native.data_type
    }

    pub fn kind(&self) -> DefinitionKind {
        match self.sources.native.data_type {
            AttributeDataType::Reference => DefinitionKind::Reference,
            _ => DefinitionKind::Simple,
        }
    }

    pub fn layer(&self) -> LayerType {
        self.layer
    }

    pub fn min_occurs(&self) -> u32 {
        self.sources.native.min_occurs
    }

    pub fn max_occurs(&self) -> Option<u32> {
        self.sources.native.max_occurs
    }

    pub fn is_multi_valued(&self) -> bool {
        self.sources.native.is_multi_valued()
    }

    pub fn is_single_valued(&self) -> bool {
        !self.is_multi_valued()
    }

    pub fn is_mandatory(&self) -> bool {
        self.min_occurs() > 0
    }

    /// Effective matching rule: customization, then native, then implied by type.
    pub fn matching_rule(&self) -> MatchingRule {
        self.sources
            .customization
            .matching_rule
            .or(self.sources.native.matching_rule)
            .unwrap_or_else(|| self.data_type().implied_matching_rule())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.sources.customization.display_name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.sources.customization.description.as_deref()
    }

    pub fn display_order(&self) -> Option<u32> {
        self.sources.customization.display_order
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.sources.customization.lifecycle_state
    }

    pub fn fetch_strategy(&self) -> FetchStrategy {
        self.sources.customization.fetch_strategy
    }

    pub fn is_volatile(&self) -> bool {
        self.sources.customization.volatile
    }

    pub fn is_returned_by_default(&self) -> bool {
        self.sources.native.returned_by_default
    }

    pub fn secondary_identifier_override(&self) -> Option<bool> {
        self.sources.customization.secondary_identifier
    }

    pub fn correlator(&self) -> Option<&CorrelatorHint> {
        self.sources.customization.correlator.as_ref()
    }

    /// Whether the attribute is ignored, either globally or in this layer.
    pub fn is_ignored(&self) -> bool {
        self.sources.customization.ignored
            || self
                .sources
                .customization
                .limitations
                .iter()
                .any(|l| l.applies_to(self.layer) && l.ignore)
    }

    /// Whether the attribute takes part in computations under `mode`.
    pub fn is_visible(&self, mode: ExecutionMode) -> bool {
        self.lifecycle_state().is_visible(mode)
    }

    /// Tolerant attributes keep unmanaged values. Defaults to tolerant.
    pub fn is_tolerant(&self) -> bool {
        self.sources.customization.tolerant.unwrap_or(true)
    }

    pub fn patterns(&self) -> &ValuePatterns {
        &self.sources.patterns
    }

    /// Effective access in the current layer.
    pub fn access(&self) -> PropertyAccess {
        let native = &self.sources.native;
        let mut access = PropertyAccess {
            read: native.readable,
            add: native.creatable,
            modify: native.updatable,
        };
        for limitation in &self.sources.customization.limitations {
            if limitation.applies_to(self.layer) {
                access = access.restrict(limitation.access);
            }
        }
        if let Some(over) = self.access_override {
            access = over;
        }
        access
    }

    pub fn can_read(&self) -> bool {
        self.access().read
    }

    pub fn can_add(&self) -> bool {
        self.access().add
    }

    pub fn can_modify(&self) -> bool {
        self.access().modify
    }

    /// Create an attribute bound to this definition.
    ///
    /// Duplicate values (under the matching rule) are collapsed; more values
    /// than the definition allows is a schema error.
    pub fn instantiate(&self, values: Vec<AttributeValue>) -> ResourceResult<Attribute> {
        let rule = self.matching_rule();
        let mut distinct: Vec<AttributeValue> = Vec::with_capacity(values.len());
        for value in values {
            if !distinct.iter().any(|v| rule.matches(v, &value)) {
                distinct.push(value);
            }
        }
        if let Some(max) = self.max_occurs() {
            if distinct.len() > max as usize {
                return Err(ResourceError::schema(format!(
                    "attribute '{}' allows at most {} value(s), got {}",
                    self.name(),
                    max,
                    distinct.len()
                )));
            }
        }
        Ok(Attribute::with_definition(self.clone(), distinct))
    }
}

impl PartialEq for AttributeDefinition {
    fn eq(&self, other: &Self) -> bool {
        let same_sources = Arc::ptr_eq(&self.sources, &other.sources)
            || (self.sources.native == other.sources.native
                && self.sources.customization == other.sources.customization);
        same_sources && self.layer == other.layer && self.access_override == other.access_override
    }
}

impl fmt::Debug for AttributeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDefinition")
            .field("name", &self.name())
            .field("type", &self.data_type())
            .field("max_occurs", &self.max_occurs())
            .field("layer", &self.layer)
            .finish()
    }
}
