//! Auxiliary object class reconciliation.

use std::collections::BTreeSet;
use tracing::{debug, trace};

use xavyo_resource::delta::{DeltaOrigin, ItemDelta, ItemModification};
use xavyo_resource::error::ResourceResult;
use xavyo_resource::value::AttributeValue;

use super::{DeltaCounts, ReconciliationOutcome};
use crate::projection::Projection;

const AUXILIARY_OBJECT_CLASS_ITEM: &str = "auxiliaryObjectClass";

/// Reconcile the auxiliary object classes, then delete the values of
/// attributes that only removed classes defined.
///
/// Only squeezed values count as should-be classes; a projection without
/// squeezed auxiliary classes keeps whatever the resource has. Removals
/// requested by pending deltas still cascade to the orphaned attributes.
pub(super) fn reconcile_auxiliary_object_classes(
    projection: &mut Projection,
    outcome: &mut ReconciliationOutcome,
) -> ResourceResult<()> {
    let are: Vec<String> = projection
        .current_shadow()
        .map(|s| s.auxiliary_object_classes().to_vec())
        .unwrap_or_default();

    if projection.squeezed_auxiliary_object_classes().is_some() {
        reconcile_classes(projection, &are, outcome);
    } else {
        trace!("No squeezed auxiliary object classes");
    }

    cascade_removed_classes(projection, &are, outcome);
    Ok(())
}

fn reconcile_classes(
    projection: &mut Projection,
    are: &[String],
    outcome: &mut ReconciliationOutcome,
) {
    let should_be: Vec<String> = projection
        .squeezed_auxiliary_object_classes()
        .map(|triple| {
            triple
                .non_negative()
                .filter(|v| v.valid)
                .map(|v| v.value.clone())
                .collect()
        })
        .unwrap_or_default();
    let tolerant = projection.definition().is_auxiliary_tolerant();

    let mut add = Vec::new();
    for class in &should_be {
        if are.contains(class) || add.contains(class) {
            continue;
        }
        if projection
            .pending_auxiliary_object_class_deltas()
            .any(|d| d.adds_value_by(|v| v == class))
        {
            continue;
        }
        add.push(class.clone());
    }

    let mut delete = Vec::new();
    if tolerant {
        trace!("Auxiliary object classes are tolerant, keeping unmanaged classes");
    } else {
        for class in are {
            if should_be.contains(class) {
                continue;
            }
            if projection
                .pending_auxiliary_object_class_deltas()
                .any(|d| d.deletes_value_by(|v| v == class))
            {
                continue;
            }
            delete.push(class.clone());
        }
    }

    let counts = DeltaCounts {
        added: add.len(),
        replaced: 0,
        deleted: delete.len(),
    };
    if !add.is_empty() {
        swallow(projection, ItemDelta::add(AUXILIARY_OBJECT_CLASS_ITEM, add), are);
    }
    if !delete.is_empty() {
        swallow(projection, ItemDelta::delete(AUXILIARY_OBJECT_CLASS_ITEM, delete), are);
    }
    outcome.record(AUXILIARY_OBJECT_CLASS_ITEM, counts);
}

/// Delete values of attributes defined only by auxiliary classes that are
/// being removed. Leftover values would block the removal on the resource.
fn cascade_removed_classes(
    projection: &mut Projection,
    are: &[String],
    outcome: &mut ReconciliationOutcome,
) {
    let mut removed: BTreeSet<String> = BTreeSet::new();
    let mut remaining: BTreeSet<String> = are.iter().cloned().collect();
    for delta in projection.pending_auxiliary_object_class_deltas() {
        let mut after = remaining.iter().cloned().collect::<Vec<_>>();
        delta.apply_to(&mut after);
        removed.extend(remaining.iter().filter(|c| !after.contains(c)).cloned());
        remaining = after.into_iter().collect();
    }
    if removed.is_empty() {
        return;
    }

    let definition = projection.definition().clone();
    let mut orphaned: BTreeSet<String> = BTreeSet::new();
    for class in &removed {
        let Some(aux_def) = definition.find_auxiliary_object_class(class) else {
            trace!(class = %class, "Removed auxiliary class has no definition");
            continue;
        };
        for attr_def in aux_def.attribute_definitions() {
            let name = attr_def.name();
            let structural = definition
                .attribute_definitions()
                .iter()
                .any(|d| d.name() == name);
            let still_defined = remaining.iter().any(|other| {
                definition
                    .find_auxiliary_object_class(other)
                    .is_some_and(|d| d.attribute_definitions().iter().any(|a| a.name() == name))
            });
            if !structural && !still_defined {
                orphaned.insert(name.to_string());
            }
        }
    }

    for name in orphaned {
        let real: Vec<AttributeValue> = projection
            .current_shadow()
            .map(|s| s.attribute_values(&name).to_vec())
            .unwrap_or_default();
        let to_delete: Vec<AttributeValue> = real
            .iter()
            .filter(|v| {
                !projection
                    .pending_attribute_deltas(&name)
                    .any(|d| d.deletes_value_by(|p| p == *v))
            })
            .cloned()
            .collect();
        if to_delete.is_empty() {
            continue;
        }
        debug!(
            attribute = %name,
            values = to_delete.len(),
            "Deleting attribute of removed auxiliary object class"
        );
        let counts = DeltaCounts {
            added: 0,
            replaced: 0,
            deleted: to_delete.len(),
        };
        let delta = ItemDelta::delete(name.as_str(), to_delete)
            .with_origin(DeltaOrigin::Reconciliation)
            .with_estimated_old_values(real);
        projection.swallow_to_secondary_delta(ItemModification::Attribute(delta));
        outcome.record(&name, counts);
    }
}

fn swallow(projection: &mut Projection, delta: ItemDelta<String>, are: &[String]) {
    let delta = delta
        .with_origin(DeltaOrigin::Reconciliation)
        .with_estimated_old_values(are.to_vec());
    trace!(delta = %delta, "Adding reconciliation delta");
    projection.swallow_to_secondary_delta(ItemModification::AuxiliaryObjectClass(delta));
}
