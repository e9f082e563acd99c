//! Shadow Objects
//!
//! Shadows are local representations of resource objects. The
//! [`ShadowBean`] holds the data as it is cached or fetched; the
//! [`AbstractShadow`] binds a bean to its object definition and provides
//! identifier resolution, delta application and consistency checks.

pub mod identification;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use tracing::trace;

use xavyo_resource::delta::{ItemModification, ObjectDelta};
use xavyo_resource::error::{ResourceError, ResourceResult};
use xavyo_resource::ids::{ResourceId, ShadowId};
use xavyo_resource::item::{AssociationValue, Attribute};
use xavyo_resource::schema::{
    AttributeDefinition, ObjectTypeIdentification, ResourceObjectDefinition, ShadowKind,
};
use xavyo_resource::value::AttributeValue;

use crate::config::ConsistencyChecks;

pub use identification::ResourceObjectIdentifiers;

fn default_true() -> bool {
    true
}

/// Shadow data: attributes, associations and classification of one
/// resource object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowBean {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<ShadowId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_ref: Option<ResourceId>,

    pub object_class: String,

    #[serde(default)]
    pub kind: ShadowKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,

    #[serde(default)]
    pub attributes: Vec<Attribute>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub associations: BTreeMap<String, Vec<AssociationValue>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auxiliary_object_classes: Vec<String>,

    /// The object is known to be deleted on the resource.
    #[serde(default)]
    pub dead: bool,

    /// The object exists on the resource (false while a create is pending).
    #[serde(default = "default_true")]
    pub exists: bool,
}

impl ShadowBean {
    pub fn new(object_class: impl Into<String>) -> Self {
        Self {
            oid: None,
            resource_ref: None,
            object_class: object_class.into(),
            kind: ShadowKind::Unknown,
            intent: None,
            attributes: Vec::new(),
            associations: BTreeMap::new(),
            auxiliary_object_classes: Vec::new(),
            dead: false,
            exists: true,
        }
    }

    #[must_use]
    pub fn with_oid(mut self, oid: ShadowId) -> Self {
        self.oid = Some(oid);
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource_id: ResourceId) -> Self {
        self.resource_ref = Some(resource_id);
        self
    }

    #[must_use]
    pub fn with_type(mut self, type_id: &ObjectTypeIdentification) -> Self {
        self.kind = type_id.kind;
        self.intent = Some(type_id.intent.clone());
        self
    }

    /// Add values to an attribute (created when missing).
    #[must_use]
    pub fn with_attribute(mut self, name: &str, values: Vec<AttributeValue>) -> Self {
        match self.attributes.iter_mut().find(|a| a.name() == name) {
            Some(attr) => {
                for v in values {
                    attr.add_value(v);
                }
            }
            None => self.attributes.push(Attribute::new(name, values)),
        }
        self
    }

    #[must_use]
    pub fn with_association(mut self, name: &str, value: AssociationValue) -> Self {
        self.associations
            .entry(name.to_string())
            .or_default()
            .push(value);
        self
    }

    #[must_use]
    pub fn with_auxiliary_object_class(mut self, name: impl Into<String>) -> Self {
        self.auxiliary_object_classes.push(name.into());
        self
    }

    /// Kind and intent, when both are known.
    pub fn type_identification(&self) -> Option<ObjectTypeIdentification> {
        match (&self.kind, &self.intent) {
            (ShadowKind::Unknown, _) | (_, None) => None,
            (kind, Some(intent)) => Some(ObjectTypeIdentification::new(*kind, intent.clone())),
        }
    }
}

/// A shadow bound to its object definition.
///
/// Equality and hash cover the bean only.
#[derive(Debug, Clone)]
pub struct AbstractShadow {
    bean: ShadowBean,
    definition: ResourceObjectDefinition,
}

impl AbstractShadow {
    /// Bind a bean to a definition, binding every attribute to its definition.
    ///
    /// Fails with a schema error when an attribute has no definition or has
    /// more values than allowed.
    pub fn new(bean: ShadowBean, definition: ResourceObjectDefinition) -> ResourceResult<Self> {
        let mut shadow = Self { bean, definition };
        let definition = shadow.definition.clone();
        shadow.apply_definition(definition)?;
        Ok(shadow)
    }

    pub fn bean(&self) -> &ShadowBean {
        &self.bean
    }

    pub fn into_bean(self) -> ShadowBean {
        self.bean
    }

    pub fn definition(&self) -> &ResourceObjectDefinition {
        &self.definition
    }

    pub fn oid(&self) -> Option<ShadowId> {
        self.bean.oid
    }

    pub fn resource_id(&self) -> Option<ResourceId> {
        self.bean.resource_ref
    }

    pub fn object_class(&self) -> &str {
        &self.bean.object_class
    }

    pub fn is_dead(&self) -> bool {
        self.bean.dead
    }

    pub fn does_exist(&self) -> bool {
        self.bean.exists
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.bean.attributes
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.bean.attributes.iter().find(|a| a.name() == name)
    }

    /// Values of an attribute; empty when the attribute is absent.
    pub fn attribute_values(&self, name: &str) -> &[AttributeValue] {
        self.get_attribute(name).map_or(&[], Attribute::values)
    }

    pub fn get_associations(&self) -> &BTreeMap<String, Vec<AssociationValue>> {
        &self.bean.associations
    }

    pub fn association_values(&self, name: &str) -> &[AssociationValue] {
        self.bean.associations.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn auxiliary_object_classes(&self) -> &[String] {
        &self.bean.auxiliary_object_classes
    }

    /// Identifiers of the object, or `None` when no identifier has a value.
    pub fn get_identifiers(&self) -> ResourceResult<Option<ResourceObjectIdentifiers>> {
        ResourceObjectIdentifiers::from_attributes(&self.definition, &self.bean.attributes)
    }

    /// Bind (or re-bind) to a definition and re-validate the attributes.
    ///
    /// Nothing is bound unless every attribute fits the new definition.
    pub fn apply_definition(&mut self, definition: ResourceObjectDefinition) -> ResourceResult<()> {
        let mut bound = Vec::with_capacity(self.bean.attributes.len());
        for attr in &self.bean.attributes {
            let attr_def = definition.find_attribute_definition_required(attr.name())?;
            check_multiplicity(attr_def, attr)?;
            bound.push(attr_def.clone());
        }
        for (attr, attr_def) in self.bean.attributes.iter_mut().zip(bound) {
            attr.bind(attr_def);
        }
        self.definition = definition;
        Ok(())
    }

    /// Apply one item change in place. A change the definition rejects
    /// leaves the shadow untouched.
    pub fn apply_delta(&mut self, modification: &ItemModification) -> ResourceResult<()> {
        match modification {
            ItemModification::Attribute(delta) => {
                let attr_def = self
                    .definition
                    .find_attribute_definition_required(delta.item())?
                    .clone();
                let rule = attr_def.matching_rule();
                let index = self
                    .bean
                    .attributes
                    .iter()
                    .position(|a| a.name() == delta.item());
                let mut values = index
                    .map(|i| self.bean.attributes[i].values().to_vec())
                    .unwrap_or_default();
                delta.apply_to_by(&mut values, |a, b| rule.matches(a, b));
                check_value_count(&attr_def, delta.item(), values.len())?;
                match index {
                    Some(i) if values.is_empty() => {
                        self.bean.attributes.remove(i);
                    }
                    Some(i) => self.bean.attributes[i].replace_values(values),
                    None if values.is_empty() => {}
                    None => self
                        .bean
                        .attributes
                        .push(Attribute::with_definition(attr_def, values)),
                }
            }
            ItemModification::Association(delta) => {
                let values = self
                    .bean
                    .associations
                    .entry(delta.item().to_string())
                    .or_default();
                delta.apply_to_by(values, AssociationValue::same_target);
                if values.is_empty() {
                    self.bean.associations.remove(delta.item());
                }
            }
            ItemModification::AuxiliaryObjectClass(delta) => {
                delta.apply_to(&mut self.bean.auxiliary_object_classes);
            }
        }
        Ok(())
    }

    /// Apply a whole object delta in place. A delete marks the shadow dead.
    pub fn update_with(&mut self, delta: &ObjectDelta) -> ResourceResult<()> {
        if delta.is_delete() {
            self.bean.dead = true;
            self.bean.exists = false;
            return Ok(());
        }
        let mut staged = self.clone();
        for modification in delta.modifications() {
            staged.apply_delta(modification)?;
        }
        self.bean = staged.bean;
        Ok(())
    }

    /// Replace the content with a new bean, keeping shadow identity.
    pub fn with_new_content(&self, mut bean: ShadowBean) -> ResourceResult<Self> {
        if bean.oid.is_none() {
            bean.oid = self.bean.oid;
        }
        if bean.resource_ref.is_none() {
            bean.resource_ref = self.bean.resource_ref;
        }
        Self::new(bean, self.definition.clone())
    }

    /// Validate invariants.
    ///
    /// The resource reference must be present (unless allowed absent), the
    /// definition must describe the shadow's object class, and every bound
    /// attribute definition must equal the one looked up from the object
    /// definition. Thorough checks additionally validate attribute
    /// multiplicity, association definitions and association targets.
    pub fn check_consistence(&self, checks: &ConsistencyChecks) -> ResourceResult<()> {
        if self.bean.resource_ref.is_none() && !checks.allow_missing_resource_ref {
            return Err(ResourceError::internal(format!(
                "shadow {:?} has no resource reference",
                self.bean.oid
            )));
        }
        if self.definition.object_class_name() != self.bean.object_class {
            return Err(ResourceError::internal(format!(
                "shadow of class '{}' bound to {}",
                self.bean.object_class, self.definition
            )));
        }
        for attr in &self.bean.attributes {
            let expected = self.definition.find_attribute_definition_required(attr.name())?;
            if let Some(bound) = attr.definition() {
                if bound != expected {
                    return Err(ResourceError::internal(format!(
                        "definition of attribute '{}' differs from the object definition",
                        attr.name()
                    )));
                }
            }
            if checks.thorough {
                check_multiplicity(expected, attr)?;
            }
        }
        if checks.thorough {
            for (name, values) in &self.bean.associations {
                let assoc = self.definition.find_association_definition(name).ok_or_else(|| {
                    ResourceError::schema(format!(
                        "no definition of association '{name}' in {}",
                        self.definition
                    ))
                })?;
                for value in values {
                    let target = &value.target;
                    if !assoc.accepts_object(target.type_identification.as_ref(), &target.object_class) {
                        return Err(ResourceError::schema(format!(
                            "association '{name}' does not accept target of class '{}'",
                            target.object_class
                        )));
                    }
                }
            }
            trace!(oid = ?self.bean.oid, "Shadow passed thorough consistency check");
        }
        Ok(())
    }
}

fn check_multiplicity(definition: &AttributeDefinition, attr: &Attribute) -> ResourceResult<()> {
    check_value_count(definition, attr.name(), attr.values().len())
}

fn check_value_count(definition: &AttributeDefinition, name: &str, count: usize) -> ResourceResult<()> {
    if let Some(max) = definition.max_occurs() {
        if count > max as usize {
            return Err(ResourceError::schema(format!(
                "attribute '{name}' allows at most {max} value(s), has {count}"
            )));
        }
    }
    Ok(())
}

impl PartialEq for AbstractShadow {
    fn eq(&self, other: &Self) -> bool {
        self.bean == other.bean
    }
}

impl Eq for AbstractShadow {}

impl Hash for AbstractShadow {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bean.hash(state);
    }
}
