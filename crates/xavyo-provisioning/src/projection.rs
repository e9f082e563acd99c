//! Projections
//!
//! A projection is the synchronization context of one resource object during
//! one computation run: its old and current shadow, the deltas computed so far
//! and the squeezed values of every item. Reconciliation reads the state and
//! only ever extends the secondary delta.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use xavyo_resource::delta::{ChangeType, ItemDelta, ItemModification, ObjectDelta};
use xavyo_resource::ids::ResourceId;
use xavyo_resource::item::AssociationValue;
use xavyo_resource::schema::{ExecutionMode, ResourceObjectDefinition};
use xavyo_resource::value::AttributeValue;

use crate::shadow::AbstractShadow;
use crate::squeeze::SqueezedTriple;

/// What the synchronization policy decided to do with the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynchronizationPolicyDecision {
    Add,
    Keep,
    Delete,
    Unlink,
}

impl SynchronizationPolicyDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            SynchronizationPolicyDecision::Add => "add",
            SynchronizationPolicyDecision::Keep => "keep",
            SynchronizationPolicyDecision::Delete => "delete",
            SynchronizationPolicyDecision::Unlink => "unlink",
        }
    }
}

impl fmt::Display for SynchronizationPolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Synchronization context of one resource object.
#[derive(Debug, Clone)]
pub struct Projection {
    resource_id: ResourceId,
    definition: ResourceObjectDefinition,
    decision: Option<SynchronizationPolicyDecision>,
    old_shadow: Option<AbstractShadow>,
    current_shadow: Option<AbstractShadow>,
    full_shadow: bool,
    execution_mode: ExecutionMode,
    primary_delta: Option<ObjectDelta>,
    sync_delta: Option<ObjectDelta>,
    secondary_delta: Option<ObjectDelta>,
    squeezed_attributes: BTreeMap<String, SqueezedTriple<AttributeValue>>,
    squeezed_associations: BTreeMap<String, SqueezedTriple<AssociationValue>>,
    squeezed_auxiliary_object_classes: Option<SqueezedTriple<String>>,
}

impl Projection {
    pub fn new(resource_id: ResourceId, definition: ResourceObjectDefinition) -> Self {
        Self {
            resource_id,
            definition,
            decision: None,
            old_shadow: None,
            current_shadow: None,
            full_shadow: false,
            execution_mode: ExecutionMode::default(),
            primary_delta: None,
            sync_delta: None,
            secondary_delta: None,
            squeezed_attributes: BTreeMap::new(),
            squeezed_associations: BTreeMap::new(),
            squeezed_auxiliary_object_classes: None,
        }
    }

    #[must_use]
    pub fn with_decision(mut self, decision: SynchronizationPolicyDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Set the current shadow; `full` tells whether it was read completely
    /// from the resource (as opposed to a partial cached copy).
    #[must_use]
    pub fn with_current_shadow(mut self, shadow: AbstractShadow, full: bool) -> Self {
        self.current_shadow = Some(shadow);
        self.full_shadow = full;
        self
    }

    #[must_use]
    pub fn with_old_shadow(mut self, shadow: AbstractShadow) -> Self {
        self.old_shadow = Some(shadow);
        self
    }

    #[must_use]
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    #[must_use]
    pub fn with_primary_delta(mut self, delta: ObjectDelta) -> Self {
        self.primary_delta = Some(delta);
        self
    }

    #[must_use]
    pub fn with_sync_delta(mut self, delta: ObjectDelta) -> Self {
        self.sync_delta = Some(delta);
        self
    }

    #[must_use]
    pub fn with_secondary_delta(mut self, delta: ObjectDelta) -> Self {
        self.secondary_delta = Some(delta);
        self
    }

    #[must_use]
    pub fn with_squeezed_attribute(
        mut self,
        name: impl Into<String>,
        triple: SqueezedTriple<AttributeValue>,
    ) -> Self {
        self.squeezed_attributes.insert(name.into(), triple);
        self
    }

    #[must_use]
    pub fn with_squeezed_association(
        mut self,
        name: impl Into<String>,
        triple: SqueezedTriple<AssociationValue>,
    ) -> Self {
        self.squeezed_associations.insert(name.into(), triple);
        self
    }

    #[must_use]
    pub fn with_squeezed_auxiliary_object_classes(mut self, triple: SqueezedTriple<String>) -> Self {
        self.squeezed_auxiliary_object_classes = Some(triple);
        self
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    pub fn definition(&self) -> &ResourceObjectDefinition {
        &self.definition
    }

    pub fn decision(&self) -> Option<SynchronizationPolicyDecision> {
        self.decision
    }

    pub fn old_shadow(&self) -> Option<&AbstractShadow> {
        self.old_shadow.as_ref()
    }

    pub fn current_shadow(&self) -> Option<&AbstractShadow> {
        self.current_shadow.as_ref()
    }

    pub fn has_full_shadow(&self) -> bool {
        self.full_shadow && self.current_shadow.is_some()
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub fn primary_delta(&self) -> Option<&ObjectDelta> {
        self.primary_delta.as_ref()
    }

    pub fn sync_delta(&self) -> Option<&ObjectDelta> {
        self.sync_delta.as_ref()
    }

    pub fn secondary_delta(&self) -> Option<&ObjectDelta> {
        self.secondary_delta.as_ref()
    }

    pub fn take_secondary_delta(&mut self) -> Option<ObjectDelta> {
        self.secondary_delta.take()
    }

    pub fn squeezed_attributes(&self) -> &BTreeMap<String, SqueezedTriple<AttributeValue>> {
        &self.squeezed_attributes
    }

    pub fn squeezed_associations(&self) -> &BTreeMap<String, SqueezedTriple<AssociationValue>> {
        &self.squeezed_associations
    }

    pub fn squeezed_auxiliary_object_classes(&self) -> Option<&SqueezedTriple<String>> {
        self.squeezed_auxiliary_object_classes.as_ref()
    }

    /// The projection is being created on the resource.
    pub fn is_add(&self) -> bool {
        self.decision == Some(SynchronizationPolicyDecision::Add)
            || self.primary_delta.as_ref().is_some_and(ObjectDelta::is_add)
    }

    /// The projection is being deleted or unlinked.
    pub fn is_delete_or_unlink(&self) -> bool {
        matches!(
            self.decision,
            Some(SynchronizationPolicyDecision::Delete | SynchronizationPolicyDecision::Unlink)
        ) || self.primary_delta.as_ref().is_some_and(ObjectDelta::is_delete)
    }

    /// The resource object is known to be gone.
    pub fn is_tombstone(&self) -> bool {
        self.current_shadow.as_ref().is_some_and(AbstractShadow::is_dead)
    }

    /// Add an item change to the secondary delta.
    pub fn swallow_to_secondary_delta(&mut self, modification: ItemModification) {
        let change_type = if self.is_add() {
            ChangeType::Add
        } else {
            ChangeType::Modify
        };
        self.secondary_delta
            .get_or_insert_with(|| ObjectDelta::new(change_type))
            .swallow(modification);
    }

    /// Attribute deltas already scheduled (primary and secondary).
    pub fn pending_attribute_deltas<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a ItemDelta<AttributeValue>> + 'a {
        self.pending_deltas()
            .filter_map(move |d| d.find_attribute_delta(name))
    }

    /// Association deltas already scheduled (primary and secondary).
    pub fn pending_association_deltas<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a ItemDelta<AssociationValue>> + 'a {
        self.pending_deltas()
            .filter_map(move |d| d.find_association_delta(name))
    }

    /// Auxiliary object class deltas already scheduled (primary and secondary).
    pub fn pending_auxiliary_object_class_deltas(&self) -> impl Iterator<Item = &ItemDelta<String>> {
        self.pending_deltas()
            .filter_map(ObjectDelta::find_auxiliary_object_class_delta)
    }

    fn pending_deltas(&self) -> impl Iterator<Item = &ObjectDelta> {
        self.primary_delta
            .iter()
            .chain(self.secondary_delta.iter())
    }
}
