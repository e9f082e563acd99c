//! Translation between connector objects and shadows.

use std::collections::BTreeMap;
use tracing::trace;

use xavyo_resource::delta::{ItemDelta, ItemModification, ObjectDelta};
use xavyo_resource::error::{ResourceError, ResourceResult};
use xavyo_resource::item::{AssociationValue, ShadowReference};
use xavyo_resource::operation::{AttributeDelta, AttributeSet, ConnectorObject, Uid};
use xavyo_resource::schema::{
    AssociationDefinition, AssociationDirection, AttributeDefinition, DefinitionKind, FetchStrategy,
    ResourceObjectDefinition,
};
use xavyo_resource::value::AttributeValue;

use super::ProvisioningContext;
use crate::shadow::{ResourceObjectIdentifiers, ShadowBean};

/// Find an attribute definition by the name the connector uses.
pub(crate) fn find_by_native_name<'a>(
    definition: &'a ResourceObjectDefinition,
    native_name: &str,
) -> Option<&'a AttributeDefinition> {
    definition
        .all_attribute_definitions()
        .into_iter()
        .find(|d| d.native_name() == native_name)
        .or_else(|| definition.find_attribute_definition(native_name))
}

/// Native name of an attribute; the attribute name when undefined.
pub(crate) fn native_name_of(definition: &ResourceObjectDefinition, name: &str) -> String {
    definition
        .find_attribute_definition(name)
        .map_or_else(|| name.to_string(), |d| d.native_name().to_string())
}

/// Attributes to request when reading, or `None` for the connector defaults.
///
/// Explicitly fetched attributes, and attributes not returned by default
/// unless they are minimal, force an explicit list.
pub(crate) fn attributes_to_get(definition: &ResourceObjectDefinition) -> Option<Vec<String>> {
    let all = definition.all_attribute_definitions();
    let needs_explicit = all.iter().any(|d| {
        d.fetch_strategy() == FetchStrategy::Explicit
            || (!d.is_returned_by_default() && d.fetch_strategy() != FetchStrategy::Minimal)
    });
    if !needs_explicit {
        return None;
    }
    let names = all
        .iter()
        .filter(|d| d.fetch_strategy() != FetchStrategy::Minimal && d.can_read())
        .map(|d| d.native_name().to_string())
        .collect();
    Some(names)
}

/// Value of a connector object attribute, falling back to the UID.
pub(crate) fn object_value(object: &ConnectorObject, native_name: &str) -> Option<AttributeValue> {
    object
        .attributes
        .get(native_name)
        .and_then(|values| values.first().cloned())
        .or_else(|| (object.uid.attribute_name() == native_name).then(|| object.uid.value().into()))
}

/// Attributes of association storage; these never appear as plain attributes.
fn association_attribute_names(definition: &ResourceObjectDefinition) -> Vec<&str> {
    definition
        .association_definitions()
        .iter()
        .filter(|a| a.direction() == AssociationDirection::SubjectToObject)
        .map(AssociationDefinition::association_attribute)
        .collect()
}

/// Convert a connector object into a shadow bean.
///
/// Attributes without a definition are dropped. Subject-side association
/// values are turned into references when `fetch_associations` is set.
pub(crate) fn to_shadow_bean(
    ctx: &ProvisioningContext,
    object: &ConnectorObject,
    fetch_associations: bool,
) -> ResourceResult<ShadowBean> {
    let definition = ctx.definition();
    let mut bean = ShadowBean::new(object.object_class.clone()).with_resource(ctx.resource_id());
    if let Some(type_id) = definition.type_identification() {
        bean = bean.with_type(type_id);
    }

    let association_attributes = association_attribute_names(definition);
    for (native_name, values) in object.attributes.iter() {
        if values.is_empty() || association_attributes.contains(&native_name.as_str()) {
            continue;
        }
        let Some(attr_def) = find_by_native_name(definition, native_name) else {
            trace!(attribute = %native_name, "Dropping attribute without definition");
            continue;
        };
        if attr_def.kind() == DefinitionKind::Reference {
            continue;
        }
        bean.attributes.push(attr_def.instantiate(values.clone())?);
    }

    if let Some(uid_def) = find_by_native_name(definition, object.uid.attribute_name()) {
        if !bean.attributes.iter().any(|a| a.name() == uid_def.name()) {
            bean.attributes
                .push(uid_def.instantiate(vec![object.uid.value().into()])?);
        }
    }

    bean.auxiliary_object_classes = object.auxiliary_object_classes.clone();

    if fetch_associations {
        for assoc_def in definition.association_definitions() {
            if assoc_def.direction() != AssociationDirection::SubjectToObject {
                continue;
            }
            let target_class = target_class(assoc_def)?;
            for value in object
                .attributes
                .get(assoc_def.association_attribute())
                .unwrap_or(&[])
            {
                let reference = ShadowReference::by_identifiers(target_class, BTreeMap::new())
                    .with_identifier(assoc_def.value_attribute(), value.clone());
                bean.associations
                    .entry(assoc_def.name().to_string())
                    .or_default()
                    .push(AssociationValue::new(reference));
            }
        }
    }
    Ok(bean)
}

pub(crate) fn target_class(assoc_def: &AssociationDefinition) -> ResourceResult<&str> {
    assoc_def.target_object_class().ok_or_else(|| {
        ResourceError::configuration(format!(
            "association '{}' declares no object participant",
            assoc_def.name()
        ))
    })
}

/// Reference to an entitlement object found by search.
pub(crate) fn entitlement_reference(
    target_def: &ResourceObjectDefinition,
    object: &ConnectorObject,
) -> ShadowReference {
    let mut reference =
        ShadowReference::by_identifiers(object.object_class.clone(), BTreeMap::new());
    if let Some(type_id) = target_def.type_identification() {
        reference = reference.with_type(type_id.clone());
    }
    let names = target_def
        .primary_identifiers()
        .iter()
        .chain(target_def.secondary_identifiers())
        .map(String::as_str)
        .chain(target_def.naming_attribute());
    for name in names {
        if reference.identifiers.contains_key(name) {
            continue;
        }
        if let Some(value) = object_value(object, &native_name_of(target_def, name)) {
            reference = reference.with_identifier(name, value);
        }
    }
    reference
}

/// Attribute set for creating the object of a shadow bean.
///
/// Subject-side associations become values of their association attribute.
pub(crate) fn to_attribute_set(
    definition: &ResourceObjectDefinition,
    bean: &ShadowBean,
) -> ResourceResult<AttributeSet> {
    let mut set = AttributeSet::new();
    for attr in &bean.attributes {
        let attr_def = definition.find_attribute_definition_required(attr.name())?;
        if !attr_def.can_add() {
            return Err(ResourceError::schema(format!(
                "attribute '{}' cannot be set on creation",
                attr.name()
            )));
        }
        set.set(attr_def.native_name(), attr.values().to_vec());
    }
    for (name, values) in &bean.associations {
        let assoc_def = required_association(definition, name)?;
        if assoc_def.direction() != AssociationDirection::SubjectToObject {
            continue;
        }
        for value in values {
            set.push(
                assoc_def.association_attribute(),
                association_storage_value(assoc_def, value)?,
            );
        }
    }
    Ok(set)
}

pub(crate) fn required_association<'a>(
    definition: &'a ResourceObjectDefinition,
    name: &str,
) -> ResourceResult<&'a AssociationDefinition> {
    definition.find_association_definition(name).ok_or_else(|| {
        ResourceError::schema(format!("no definition of association '{name}' in {definition}"))
    })
}

/// Value stored on the subject for a subject-side association.
fn association_storage_value(
    assoc_def: &AssociationDefinition,
    value: &AssociationValue,
) -> ResourceResult<AttributeValue> {
    value
        .target
        .identifier(assoc_def.value_attribute())
        .and_then(|values| values.first().cloned())
        .ok_or_else(|| {
            ResourceError::schema(format!(
                "association '{}' value carries no '{}' identifier",
                assoc_def.name(),
                assoc_def.value_attribute()
            ))
        })
}

/// Entitlement-side change derived from an object-side association delta.
#[derive(Debug, Clone)]
pub(crate) struct EntitlementChange {
    pub association: String,
    pub target_class: String,
    pub target_uid: Uid,
    pub add: bool,
}

/// Connector changes for an object delta.
pub(crate) struct TranslatedDelta {
    pub attribute_delta: AttributeDelta,
    pub entitlements: Vec<EntitlementChange>,
}

/// Translate an object delta into connector changes.
pub(crate) fn translate_delta(
    ctx: &ProvisioningContext,
    delta: &ObjectDelta,
) -> ResourceResult<TranslatedDelta> {
    let definition = ctx.definition();
    let mut attribute_delta = AttributeDelta::new();
    let mut entitlements = Vec::new();

    for modification in delta.modifications() {
        match modification {
            ItemModification::Attribute(item) => {
                let attr_def = definition.find_attribute_definition_required(item.item())?;
                if !attr_def.can_modify() {
                    return Err(ResourceError::schema(format!(
                        "attribute '{}' cannot be modified",
                        item.item()
                    )));
                }
                translate_attribute(&mut attribute_delta, attr_def.native_name(), item);
            }
            ItemModification::Association(item) => {
                let assoc_def = required_association(definition, item.item())?;
                match assoc_def.direction() {
                    AssociationDirection::SubjectToObject => {
                        let attr = assoc_def.association_attribute();
                        let add = item
                            .values_to_add()
                            .iter()
                            .map(|v| association_storage_value(assoc_def, v))
                            .collect::<ResourceResult<Vec<_>>>()?;
                        let remove = item
                            .values_to_delete()
                            .iter()
                            .map(|v| association_storage_value(assoc_def, v))
                            .collect::<ResourceResult<Vec<_>>>()?;
                        if !add.is_empty() {
                            attribute_delta.add(attr, add);
                        }
                        if !remove.is_empty() {
                            attribute_delta.remove(attr, remove);
                        }
                    }
                    AssociationDirection::ObjectToSubject => {
                        for (values, add) in
                            [(item.values_to_add(), true), (item.values_to_delete(), false)]
                        {
                            for value in values {
                                entitlements.push(entitlement_change(ctx, assoc_def, value, add)?);
                            }
                        }
                    }
                }
            }
            ItemModification::AuxiliaryObjectClass(item) => {
                attribute_delta
                    .add_auxiliary_object_classes
                    .extend(item.values_to_add().iter().cloned());
                attribute_delta
                    .remove_auxiliary_object_classes
                    .extend(item.values_to_delete().iter().cloned());
            }
        }
    }
    Ok(TranslatedDelta {
        attribute_delta,
        entitlements,
    })
}

fn translate_attribute(
    attribute_delta: &mut AttributeDelta,
    native_name: &str,
    item: &ItemDelta<AttributeValue>,
) {
    if let Some(replace) = item.values_to_replace() {
        attribute_delta.replace(native_name, replace.to_vec());
        return;
    }
    if !item.values_to_add().is_empty() {
        attribute_delta.add(native_name, item.values_to_add().to_vec());
    }
    if !item.values_to_delete().is_empty() {
        attribute_delta.remove(native_name, item.values_to_delete().to_vec());
    }
}

/// Membership change on the entitlement object for one association value.
pub(crate) fn entitlement_change(
    ctx: &ProvisioningContext,
    assoc_def: &AssociationDefinition,
    value: &AssociationValue,
    add: bool,
) -> ResourceResult<EntitlementChange> {
    let target = &value.target;
    let target_def = ctx
        .schema()
        .find_definition_required(&target.object_class, target.type_identification.as_ref())?;
    let primary = target_def.primary_identifiers().first().ok_or_else(|| {
        ResourceError::schema(format!("{target_def} has no primary identifier"))
    })?;
    let value = target
        .identifier(primary)
        .and_then(|values| values.first())
        .and_then(AttributeValue::to_text)
        .ok_or_else(|| {
            ResourceError::schema(format!(
                "entitlement of association '{}' cannot be identified: no '{primary}' value",
                assoc_def.name()
            ))
        })?;
    Ok(EntitlementChange {
        association: assoc_def.name().to_string(),
        target_class: target.object_class.clone(),
        target_uid: Uid::new(native_name_of(target_def, primary), value),
        add,
    })
}

/// UID of the object the identifiers point at, when the primary is known.
pub(crate) fn uid_from_identifiers(
    definition: &ResourceObjectDefinition,
    identifiers: &ResourceObjectIdentifiers,
) -> ResourceResult<Option<Uid>> {
    let Some(primary) = identifiers.primary_identifier() else {
        return Ok(None);
    };
    let value = primary
        .single_value()
        .and_then(AttributeValue::to_text)
        .ok_or_else(|| {
            ResourceError::schema(format!(
                "primary identifier '{}' has no single textual value",
                primary.name()
            ))
        })?;
    Ok(Some(Uid::new(native_name_of(definition, primary.name()), value)))
}

/// Search filter matching all secondary identifiers.
pub(crate) fn secondary_filter(
    definition: &ResourceObjectDefinition,
    identifiers: &ResourceObjectIdentifiers,
) -> Option<xavyo_resource::operation::Filter> {
    use xavyo_resource::operation::Filter;

    identifiers
        .secondary_identifiers()
        .iter()
        .filter_map(|attr| {
            attr.single_value()
                .map(|v| Filter::eq(native_name_of(definition, attr.name()), v.clone()))
        })
        .reduce(Filter::and_with)
}
