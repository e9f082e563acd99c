//! Items of resource objects: attributes and association values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::ids::ShadowId;
use crate::matching::MatchingRule;
use crate::schema::{AttributeDefinition, ObjectTypeIdentification};
use crate::value::AttributeValue;

/// A named, possibly multi-valued attribute of a resource object.
///
/// The definition binding is optional and not serialized; equality and hash
/// cover only the name and values.
#[derive(Clone, Serialize, Deserialize)]
pub struct Attribute {
    name: String,
    #[serde(skip)]
    definition: Option<AttributeDefinition>,
    #[serde(default)]
    values: Vec<AttributeValue>,
}

impl Attribute {
    /// Create an attribute not bound to any definition.
    pub fn new(name: impl Into<String>, values: Vec<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            definition: None,
            values,
        }
    }

    /// Create an attribute bound to a definition. Multiplicity is not checked;
    /// use [`AttributeDefinition::instantiate`] for that.
    pub fn with_definition(definition: AttributeDefinition, values: Vec<AttributeValue>) -> Self {
        Self {
            name: definition.name().to_string(),
            definition: Some(definition),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> Option<&AttributeDefinition> {
        self.definition.as_ref()
    }

    /// Bind (or re-bind) to a definition.
    pub fn bind(&mut self, definition: AttributeDefinition) {
        self.definition = Some(definition);
    }

    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<AttributeValue> {
        self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The only value of a single-valued attribute.
    pub fn single_value(&self) -> Option<&AttributeValue> {
        match self.values.as_slice() {
            [value] => Some(value),
            _ => None,
        }
    }

    fn matching_rule(&self) -> MatchingRule {
        self.definition
            .as_ref()
            .map(AttributeDefinition::matching_rule)
            .unwrap_or_default()
    }

    /// Check for a value using the definition's matching rule.
    pub fn contains(&self, value: &AttributeValue) -> bool {
        let rule = self.matching_rule();
        self.values.iter().any(|v| rule.matches(v, value))
    }

    /// Add a value unless an equivalent one is present. Returns whether added.
    pub fn add_value(&mut self, value: AttributeValue) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.values.push(value);
        true
    }

    /// Remove every value equivalent to `value`. Returns whether any was removed.
    pub fn remove_value(&mut self, value: &AttributeValue) -> bool {
        let rule = self.matching_rule();
        let before = self.values.len();
        self.values.retain(|v| !rule.matches(v, value));
        self.values.len() != before
    }

    pub fn replace_values(&mut self, values: Vec<AttributeValue>) {
        self.values = values;
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.values == other.values
    }
}

impl Eq for Attribute {}

impl Hash for Attribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.values.hash(state);
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("values", &self.values)
            .field("bound", &self.definition.is_some())
            .finish()
    }
}

/// Reference to another resource object, by shadow OID and/or identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<ShadowId>,

    pub object_class: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_identification: Option<ObjectTypeIdentification>,

    /// Identifier values cached with the reference (may be empty).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub identifiers: BTreeMap<String, Vec<AttributeValue>>,
}

impl ShadowReference {
    /// Reference by shadow OID only.
    pub fn to_shadow(oid: ShadowId, object_class: impl Into<String>) -> Self {
        Self {
            oid: Some(oid),
            object_class: object_class.into(),
            type_identification: None,
            identifiers: BTreeMap::new(),
        }
    }

    /// Reference by identifiers only.
    pub fn by_identifiers(
        object_class: impl Into<String>,
        identifiers: BTreeMap<String, Vec<AttributeValue>>,
    ) -> Self {
        Self {
            oid: None,
            object_class: object_class.into(),
            type_identification: None,
            identifiers,
        }
    }

    #[must_use]
    pub fn with_identifier(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.identifiers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, type_identification: ObjectTypeIdentification) -> Self {
        self.type_identification = Some(type_identification);
        self
    }

    pub fn identifier(&self, name: &str) -> Option<&[AttributeValue]> {
        self.identifiers.get(name).map(Vec::as_slice)
    }

    /// Check whether both references point at the same object.
    ///
    /// Shadow OIDs decide when both are known; otherwise every identifier
    /// known on both sides must agree, and at least one must be shared.
    pub fn same_target(&self, other: &ShadowReference) -> bool {
        if let (Some(a), Some(b)) = (self.oid, other.oid) {
            return a == b;
        }
        if self.object_class != other.object_class {
            return false;
        }
        let mut shared = false;
        for (name, values) in &self.identifiers {
            if let Some(other_values) = other.identifiers.get(name) {
                if values != other_values {
                    return false;
                }
                shared = true;
            }
        }
        shared
    }
}

/// One association value: a reference to the associated target object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssociationValue {
    pub target: ShadowReference,
}

impl AssociationValue {
    pub fn new(target: ShadowReference) -> Self {
        Self { target }
    }

    /// Reference-based equality; see [`ShadowReference::same_target`].
    pub fn same_target(&self, other: &AssociationValue) -> bool {
        self.target.same_target(&other.target)
    }
}
