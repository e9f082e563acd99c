//! Resource object definitions (object classes and object types).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::association::{AssociationDefinition, ObjectTypeIdentification};
use super::attribute::{AttributeDefinition, DefinitionKind};
use super::layer::LayerType;
use crate::error::{ResourceError, ResourceResult};
use crate::item::Attribute;
use crate::value::AttributeValue;

#[derive(Debug)]
struct ObjectDefinitionInner {
    object_class_name: String,
    type_identification: Option<ObjectTypeIdentification>,
    display_name: Option<String>,
    attributes: Vec<AttributeDefinition>,
    index: HashMap<String, usize>,
    primary_identifiers: Vec<String>,
    secondary_identifiers: Vec<String>,
    naming_attribute: Option<String>,
    auxiliary_object_classes: Vec<ResourceObjectDefinition>,
    auxiliary_tolerant: bool,
    associations: Vec<AssociationDefinition>,
}

/// Definition of an object class, or of an object type (a kind/intent
/// scoped refinement of an object class).
///
/// Immutable and cheap to clone.
#[derive(Clone)]
pub struct ResourceObjectDefinition {
    inner: Arc<ObjectDefinitionInner>,
}

impl ResourceObjectDefinition {
    /// Start building a definition for the given object class.
    pub fn builder(object_class_name: impl Into<String>) -> ResourceObjectDefinitionBuilder {
        ResourceObjectDefinitionBuilder {
            object_class_name: object_class_name.into(),
            type_identification: None,
            display_name: None,
            attributes: Vec::new(),
            primary_identifiers: Vec::new(),
            secondary_identifiers: Vec::new(),
            naming_attribute: None,
            auxiliary_object_classes: Vec::new(),
            auxiliary_tolerant: true,
            associations: Vec::new(),
        }
    }

    pub fn object_class_name(&self) -> &str {
        &self.inner.object_class_name
    }

    pub fn type_identification(&self) -> Option<&ObjectTypeIdentification> {
        self.inner.type_identification.as_ref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.inner.display_name.as_deref()
    }

    /// Attributes defined directly on this object class or type.
    pub fn attribute_definitions(&self) -> &[AttributeDefinition] {
        &self.inner.attributes
    }

    /// Attribute definitions of the given subtype.
    pub fn attribute_definitions_of_kind(&self, kind: DefinitionKind) -> Vec<&AttributeDefinition> {
        self.inner
            .attributes
            .iter()
            .filter(|d| d.kind() == kind)
            .collect()
    }

    /// Own attributes followed by those contributed only by auxiliary classes.
    pub fn all_attribute_definitions(&self) -> Vec<&AttributeDefinition> {
        let mut all: Vec<&AttributeDefinition> = self.inner.attributes.iter().collect();
        for aux in &self.inner.auxiliary_object_classes {
            for def in aux.attribute_definitions() {
                if !all.iter().any(|d| d.name() == def.name()) {
                    all.push(def);
                }
            }
        }
        all
    }

    /// Look up an attribute definition by name.
    ///
    /// Own attributes take precedence over auxiliary ones.
    pub fn find_attribute_definition(&self, name: &str) -> Option<&AttributeDefinition> {
        if let Some(&i) = self.inner.index.get(name) {
            return self.inner.attributes.get(i);
        }
        self.inner
            .auxiliary_object_classes
            .iter()
            .find_map(|aux| aux.find_attribute_definition(name))
    }

    /// Look up an attribute definition, failing with a schema error when absent.
    pub fn find_attribute_definition_required(&self, name: &str) -> ResourceResult<&AttributeDefinition> {
        self.find_attribute_definition(name).ok_or_else(|| {
            ResourceError::schema(format!(
                "no definition of attribute '{}' in {}",
                name, self
            ))
        })
    }

    /// Create an attribute from values, validated against its definition.
    pub fn instantiate_attribute(
        &self,
        name: &str,
        values: Vec<AttributeValue>,
    ) -> ResourceResult<Attribute> {
        self.find_attribute_definition_required(name)?
            .instantiate(values)
    }

    pub fn primary_identifiers(&self) -> &[String] {
        &self.inner.primary_identifiers
    }

    pub fn secondary_identifiers(&self) -> &[String] {
        &self.inner.secondary_identifiers
    }

    pub fn is_primary_identifier(&self, name: &str) -> bool {
        self.inner.primary_identifiers.iter().any(|n| n == name)
    }

    pub fn is_secondary_identifier(&self, name: &str) -> bool {
        self.inner.secondary_identifiers.iter().any(|n| n == name)
    }

    pub fn naming_attribute(&self) -> Option<&str> {
        self.inner.naming_attribute.as_deref()
    }

    /// Auxiliary object classes declared for this object type.
    pub fn auxiliary_object_class_definitions(&self) -> &[ResourceObjectDefinition] {
        &self.inner.auxiliary_object_classes
    }

    pub fn find_auxiliary_object_class(&self, name: &str) -> Option<&ResourceObjectDefinition> {
        self.inner
            .auxiliary_object_classes
            .iter()
            .find(|aux| aux.object_class_name() == name)
    }

    /// Whether unmanaged auxiliary object classes are kept.
    pub fn is_auxiliary_tolerant(&self) -> bool {
        self.inner.auxiliary_tolerant
    }

    pub fn association_definitions(&self) -> &[AssociationDefinition] {
        &self.inner.associations
    }

    pub fn find_association_definition(&self, name: &str) -> Option<&AssociationDefinition> {
        self.inner.associations.iter().find(|a| a.name() == name)
    }

    /// View of this definition with every attribute in the given layer.
    #[must_use]
    pub fn for_layer(&self, layer: LayerType) -> Self {
        let inner = &self.inner;
        Self {
            inner: Arc::new(ObjectDefinitionInner {
                object_class_name: inner.object_class_name.clone(),
                type_identification: inner.type_identification.clone(),
                display_name: inner.display_name.clone(),
                attributes: inner.attributes.iter().map(|d| d.for_layer(layer)).collect(),
                index: inner.index.clone(),
                primary_identifiers: inner.primary_identifiers.clone(),
                secondary_identifiers: inner.secondary_identifiers.clone(),
                naming_attribute: inner.naming_attribute.clone(),
                auxiliary_object_classes: inner
                    .auxiliary_object_classes
                    .iter()
                    .map(|aux| aux.for_layer(layer))
                    .collect(),
                auxiliary_tolerant: inner.auxiliary_tolerant,
                associations: inner.associations.clone(),
            }),
        }
    }

    /// Whether an object of this definition fits the given class/kind/intent.
    pub fn matches(&self, object_class: &str, type_identification: Option<&ObjectTypeIdentification>) -> bool {
        if self.object_class_name() != object_class {
            return false;
        }
        match (self.type_identification(), type_identification) {
            (Some(own), Some(other)) => own == other,
            (None, _) => true,
            (Some(_), None) => false,
        }
    }
}

impl PartialEq for ResourceObjectDefinition {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.object_class_name == other.inner.object_class_name
                && self.inner.type_identification == other.inner.type_identification
                && self.inner.attributes == other.inner.attributes)
    }
}

impl fmt::Display for ResourceObjectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.type_identification {
            Some(type_id) => write!(f, "object type {} ({})", type_id, self.inner.object_class_name),
            None => write!(f, "object class {}", self.inner.object_class_name),
        }
    }
}

impl fmt::Debug for ResourceObjectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceObjectDefinition")
            .field("object_class", &self.inner.object_class_name)
            .field("type", &self.inner.type_identification)
            .field("attributes", &self.inner.attributes.len())
            .finish()
    }
}

/// Builder for [`ResourceObjectDefinition`].
pub struct ResourceObjectDefinitionBuilder {
    object_class_name: String,
    type_identification: Option<ObjectTypeIdentification>,
    display_name: Option<String>,
    attributes: Vec<AttributeDefinition>,
    primary_identifiers: Vec<String>,
    secondary_identifiers: Vec<String>,
    naming_attribute: Option<String>,
    auxiliary_object_classes: Vec<ResourceObjectDefinition>,
    auxiliary_tolerant: bool,
    associations: Vec<AssociationDefinition>,
}

impl ResourceObjectDefinitionBuilder {
    #[must_use]
    pub fn type_identification(mut self, type_identification: ObjectTypeIdentification) -> Self {
        self.type_identification = Some(type_identification);
        self
    }

    #[must_use]
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, definition: AttributeDefinition) -> Self {
        self.attributes.push(definition);
        self
    }

    #[must_use]
    pub fn primary_identifier(mut self, name: impl Into<String>) -> Self {
        self.primary_identifiers.push(name.into());
        self
    }

    #[must_use]
    pub fn secondary_identifier(mut self, name: impl Into<String>) -> Self {
        self.secondary_identifiers.push(name.into());
        self
    }

    #[must_use]
    pub fn naming_attribute(mut self, name: impl Into<String>) -> Self {
        self.naming_attribute = Some(name.into());
        self
    }

    #[must_use]
    pub fn auxiliary_object_class(mut self, definition: ResourceObjectDefinition) -> Self {
        self.auxiliary_object_classes.push(definition);
        self
    }

    #[must_use]
    pub fn auxiliary_tolerant(mut self, tolerant: bool) -> Self {
        self.auxiliary_tolerant = tolerant;
        self
    }

    #[must_use]
    pub fn association(mut self, definition: AssociationDefinition) -> Self {
        self.associations.push(definition);
        self
    }

    /// Validate and build.
    ///
    /// Duplicate attribute names and identifiers or naming attributes without
    /// a definition are schema errors. Customization may force an attribute in
    /// or out of the secondary identifier set.
    pub fn build(mut self) -> ResourceResult<ResourceObjectDefinition> {
        let mut index = HashMap::with_capacity(self.attributes.len());
        for (i, def) in self.attributes.iter().enumerate() {
            if index.insert(def.name().to_string(), i).is_some() {
                return Err(ResourceError::schema(format!(
                    "duplicate definition of attribute '{}' in object class {}",
                    def.name(),
                    self.object_class_name
                )));
            }
        }

        for def in &self.attributes {
            match def.secondary_identifier_override() {
                Some(true) if !self.secondary_identifiers.iter().any(|n| n == def.name()) => {
                    self.secondary_identifiers.push(def.name().to_string());
                }
                Some(false) => self.secondary_identifiers.retain(|n| n != def.name()),
                _ => {}
            }
        }

        let referenced = self
            .primary_identifiers
            .iter()
            .chain(&self.secondary_identifiers)
            .chain(self.naming_attribute.iter());
        for name in referenced {
            if !index.contains_key(name) {
                return Err(ResourceError::schema(format!(
                    "identifier or naming attribute '{}' has no definition in object class {}",
                    name, self.object_class_name
                )));
            }
        }

        Ok(ResourceObjectDefinition {
            inner: Arc::new(ObjectDefinitionInner {
                object_class_name: self.object_class_name,
                type_identification: self.type_identification,
                display_name: self.display_name,
                attributes: self.attributes,
                index,
                primary_identifiers: self.primary_identifiers,
                secondary_identifiers: self.secondary_identifiers,
                naming_attribute: self.naming_attribute,
                auxiliary_object_classes: self.auxiliary_object_classes,
                auxiliary_tolerant: self.auxiliary_tolerant,
                associations: self.associations,
            }),
        })
    }
}
