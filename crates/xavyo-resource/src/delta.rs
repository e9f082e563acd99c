//! Item and object deltas.
//!
//! An [`ItemDelta`] describes a change of one item: values to add, values to
//! delete, or a full replacement. An [`ObjectDelta`] groups item changes of one
//! resource object.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::item::AssociationValue;
use crate::value::AttributeValue;

/// Where a delta came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaOrigin {
    /// Requested by the user or caller.
    #[default]
    Primary,
    /// Computed by a mapping.
    Mapping,
    /// Computed by reconciliation.
    Reconciliation,
    /// Observed on the resource by synchronization.
    Synchronization,
}

/// Change of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "V: Deserialize<'de>"))]
pub struct ItemDelta<V> {
    item: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    values_to_add: Vec<V>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    values_to_delete: Vec<V>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    values_to_replace: Option<Vec<V>>,
    /// Values of the item before the change, for diff display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    estimated_old_values: Option<Vec<V>>,
    #[serde(default)]
    origin: DeltaOrigin,
}

impl<V: Clone + PartialEq> ItemDelta<V> {
    fn empty(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            values_to_add: Vec::new(),
            values_to_delete: Vec::new(),
            values_to_replace: None,
            estimated_old_values: None,
            origin: DeltaOrigin::Primary,
        }
    }

    /// Delta adding values.
    pub fn add(item: impl Into<String>, values: Vec<V>) -> Self {
        Self {
            values_to_add: values,
            ..Self::empty(item)
        }
    }

    /// Delta deleting values.
    pub fn delete(item: impl Into<String>, values: Vec<V>) -> Self {
        Self {
            values_to_delete: values,
            ..Self::empty(item)
        }
    }

    /// Delta replacing all values.
    pub fn replace(item: impl Into<String>, values: Vec<V>) -> Self {
        Self {
            values_to_replace: Some(values),
            ..Self::empty(item)
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: DeltaOrigin) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub fn with_estimated_old_values(mut self, values: Vec<V>) -> Self {
        self.estimated_old_values = Some(values);
        self
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    pub fn origin(&self) -> DeltaOrigin {
        self.origin
    }

    pub fn values_to_add(&self) -> &[V] {
        &self.values_to_add
    }

    pub fn values_to_delete(&self) -> &[V] {
        &self.values_to_delete
    }

    pub fn values_to_replace(&self) -> Option<&[V]> {
        self.values_to_replace.as_deref()
    }

    pub fn estimated_old_values(&self) -> Option<&[V]> {
        self.estimated_old_values.as_deref()
    }

    pub fn is_replace(&self) -> bool {
        self.values_to_replace.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.values_to_add.is_empty()
            && self.values_to_delete.is_empty()
            && self.values_to_replace.is_none()
    }

    /// Values that will be present after the delta, among those it mentions.
    pub fn values_present_after(&self) -> impl Iterator<Item = &V> {
        self.values_to_replace
            .iter()
            .flatten()
            .chain(self.values_to_add.iter())
    }

    /// Whether the delta adds (or replaces with) a value satisfying `pred`.
    pub fn adds_value_by(&self, pred: impl Fn(&V) -> bool) -> bool {
        self.values_present_after().any(pred)
    }

    /// Whether the delta removes a value satisfying `pred`.
    ///
    /// A replacement removes every value it does not contain, which cannot be
    /// decided here; only explicit deletions are reported.
    pub fn deletes_value_by(&self, pred: impl Fn(&V) -> bool) -> bool {
        self.values_to_delete.iter().any(pred)
    }

    /// Fold another delta of the same item into this one.
    ///
    /// A replacement in `other` overrides everything before it. When this delta
    /// is a replacement, additions and deletions of `other` edit the replacement
    /// set. Otherwise additions and deletions accumulate and cancel each other.
    pub fn merge(&mut self, other: ItemDelta<V>) {
        if self.estimated_old_values.is_none() {
            self.estimated_old_values = other.estimated_old_values;
        }
        if let Some(replace) = other.values_to_replace {
            self.values_to_replace = Some(replace);
            self.values_to_add.clear();
            self.values_to_delete.clear();
            return;
        }
        if let Some(replace) = self.values_to_replace.as_mut() {
            replace.retain(|v| !other.values_to_delete.contains(v));
            for v in other.values_to_add {
                if !replace.contains(&v) {
                    replace.push(v);
                }
            }
            return;
        }
        for v in other.values_to_add {
            self.values_to_delete.retain(|d| d != &v);
            if !self.values_to_add.contains(&v) {
                self.values_to_add.push(v);
            }
        }
        for v in other.values_to_delete {
            self.values_to_add.retain(|a| a != &v);
            if !self.values_to_delete.contains(&v) {
                self.values_to_delete.push(v);
            }
        }
    }

    /// Apply to a list of current values using `eq` for value comparison.
    pub fn apply_to_by(&self, values: &mut Vec<V>, eq: impl Fn(&V, &V) -> bool) {
        if let Some(replace) = &self.values_to_replace {
            *values = replace.clone();
        }
        for v in &self.values_to_delete {
            values.retain(|existing| !eq(existing, v));
        }
        for v in &self.values_to_add {
            if !values.iter().any(|existing| eq(existing, v)) {
                values.push(v.clone());
            }
        }
    }

    /// Apply to a list of current values using plain equality.
    pub fn apply_to(&self, values: &mut Vec<V>) {
        self.apply_to_by(values, |a, b| a == b);
    }
}

impl<V: fmt::Debug> fmt::Display for ItemDelta<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.item)?;
        if let Some(replace) = &self.values_to_replace {
            write!(f, " replace {replace:?}")?;
        }
        if !self.values_to_add.is_empty() {
            write!(f, " add {:?}", self.values_to_add)?;
        }
        if !self.values_to_delete.is_empty() {
            write!(f, " delete {:?}", self.values_to_delete)?;
        }
        Ok(())
    }
}

/// One item change within an object delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ItemModification {
    Attribute(ItemDelta<AttributeValue>),
    Association(ItemDelta<AssociationValue>),
    AuxiliaryObjectClass(ItemDelta<String>),
}

impl ItemModification {
    pub fn is_empty(&self) -> bool {
        match self {
            ItemModification::Attribute(d) => d.is_empty(),
            ItemModification::Association(d) => d.is_empty(),
            ItemModification::AuxiliaryObjectClass(d) => d.is_empty(),
        }
    }

    pub fn origin(&self) -> DeltaOrigin {
        match self {
            ItemModification::Attribute(d) => d.origin(),
            ItemModification::Association(d) => d.origin(),
            ItemModification::AuxiliaryObjectClass(d) => d.origin(),
        }
    }

    fn same_item(&self, other: &ItemModification) -> bool {
        match (self, other) {
            (ItemModification::Attribute(a), ItemModification::Attribute(b)) => a.item() == b.item(),
            (ItemModification::Association(a), ItemModification::Association(b)) => {
                a.item() == b.item()
            }
            (ItemModification::AuxiliaryObjectClass(_), ItemModification::AuxiliaryObjectClass(_)) => {
                true
            }
            _ => false,
        }
    }

    fn merge(&mut self, other: ItemModification) {
        match (self, other) {
            (ItemModification::Attribute(a), ItemModification::Attribute(b)) => a.merge(b),
            (ItemModification::Association(a), ItemModification::Association(b)) => a.merge(b),
            (ItemModification::AuxiliaryObjectClass(a), ItemModification::AuxiliaryObjectClass(b)) => {
                a.merge(b)
            }
            _ => {}
        }
    }
}

impl fmt::Display for ItemModification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemModification::Attribute(d) => write!(f, "attribute {d}"),
            ItemModification::Association(d) => write!(f, "association {d}"),
            ItemModification::AuxiliaryObjectClass(d) => write!(f, "auxiliary class {d}"),
        }
    }
}

/// Kind of object change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Modify,
    Delete,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Add => "add",
            ChangeType::Modify => "modify",
            ChangeType::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Change of one resource object.
///
/// For [`ChangeType::Add`] the modifications carry the new object's content as
/// value additions. A delete delta carries no modifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDelta {
    change_type: ChangeType,
    #[serde(default)]
    modifications: Vec<ItemModification>,
}

impl ObjectDelta {
    pub fn new(change_type: ChangeType) -> Self {
        Self {
            change_type,
            modifications: Vec::new(),
        }
    }

    pub fn modify() -> Self {
        Self::new(ChangeType::Modify)
    }

    pub fn change_type(&self) -> ChangeType {
        self.change_type
    }

    pub fn is_add(&self) -> bool {
        self.change_type == ChangeType::Add
    }

    pub fn is_delete(&self) -> bool {
        self.change_type == ChangeType::Delete
    }

    pub fn modifications(&self) -> &[ItemModification] {
        &self.modifications
    }

    pub fn into_modifications(self) -> Vec<ItemModification> {
        self.modifications
    }

    /// A modify delta with no item changes.
    pub fn is_empty(&self) -> bool {
        self.change_type == ChangeType::Modify && self.modifications.iter().all(|m| m.is_empty())
    }

    /// Add an item change, merging with an existing change of the same item.
    pub fn swallow(&mut self, modification: ItemModification) {
        if modification.is_empty() {
            return;
        }
        if let Some(existing) = self
            .modifications
            .iter_mut()
            .find(|m| m.same_item(&modification))
        {
            existing.merge(modification);
        } else {
            self.modifications.push(modification);
        }
    }

    #[must_use]
    pub fn with(mut self, modification: ItemModification) -> Self {
        self.swallow(modification);
        self
    }

    /// Merge all item changes of another delta into this one.
    ///
    /// A delete dominates; an add keeps its change type.
    pub fn merge(&mut self, other: ObjectDelta) {
        if other.change_type == ChangeType::Delete {
            self.change_type = ChangeType::Delete;
            self.modifications.clear();
            return;
        }
        if self.change_type == ChangeType::Delete {
            return;
        }
        for m in other.modifications {
            self.swallow(m);
        }
    }

    pub fn attribute_deltas(&self) -> impl Iterator<Item = &ItemDelta<AttributeValue>> {
        self.modifications.iter().filter_map(|m| match m {
            ItemModification::Attribute(d) => Some(d),
            _ => None,
        })
    }

    pub fn association_deltas(&self) -> impl Iterator<Item = &ItemDelta<AssociationValue>> {
        self.modifications.iter().filter_map(|m| match m {
            ItemModification::Association(d) => Some(d),
            _ => None,
        })
    }

    pub fn find_attribute_delta(&self, name: &str) -> Option<&ItemDelta<AttributeValue>> {
        self.attribute_deltas().find(|d| d.item() == name)
    }

    pub fn find_association_delta(&self, name: &str) -> Option<&ItemDelta<AssociationValue>> {
        self.association_deltas().find(|d| d.item() == name)
    }

    pub fn find_auxiliary_object_class_delta(&self) -> Option<&ItemDelta<String>> {
        self.modifications.iter().find_map(|m| match m {
            ItemModification::AuxiliaryObjectClass(d) => Some(d),
            _ => None,
        })
    }
}

impl fmt::Display for ObjectDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.change_type)?;
        for (i, m) in self.modifications.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{m}")?;
        }
        write!(f, ")")
    }
}
