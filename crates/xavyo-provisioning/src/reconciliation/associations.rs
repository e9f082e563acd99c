//! Association reconciliation.
//!
//! Association values are compared by target identity. Tolerant and
//! intolerant patterns apply to the naming attribute of the target object,
//! which may have to be fetched when the reference carries no identifiers.

use tracing::{trace, warn};

use xavyo_resource::delta::{DeltaOrigin, ItemDelta, ItemModification};
use xavyo_resource::error::{ResourceError, ResourceResult};
use xavyo_resource::item::AssociationValue;
use xavyo_resource::schema::AssociationDefinition;
use xavyo_resource::value::AttributeValue;

use super::{
    plan_item, DeltaCounts, ItemShape, PatternVerdict, ReconciliationEngine, ReconciliationOutcome,
};
use crate::projection::Projection;
use crate::squeeze::ValueWithOrigin;

pub(super) async fn reconcile_associations(
    engine: &ReconciliationEngine,
    projection: &mut Projection,
    outcome: &mut ReconciliationOutcome,
) -> ResourceResult<()> {
    let definition = projection.definition().clone();

    for assoc_def in definition.association_definitions() {
        let name = assoc_def.name();
        if assoc_def.is_ignored() {
            trace!(association = %name, "Skipping ignored association");
            continue;
        }

        let are: Vec<AssociationValue> = projection
            .current_shadow()
            .map(|s| s.association_values(name).to_vec())
            .unwrap_or_default();
        let should_be = should_be_values(projection, name);
        if are.is_empty() && should_be.is_empty() {
            continue;
        }

        let mut verdicts = Vec::with_capacity(are.len());
        for value in &are {
            let covered = should_be.iter().any(|s| s.value.same_target(value));
            let verdict = if covered || assoc_def.patterns().is_empty() {
                PatternVerdict::NoMatch
            } else {
                evaluate_patterns(engine, assoc_def, value).await?
            };
            verdicts.push(verdict);
        }

        let shape = ItemShape {
            name,
            single_valued: false,
            tolerant: assoc_def.is_tolerant(),
        };
        let plan = plan_item(
            &shape,
            &are,
            &should_be,
            AssociationValue::same_target,
            |index| verdicts[index],
        )?;

        let add: Vec<AssociationValue> = plan
            .add
            .into_iter()
            .filter(|v| {
                !projection
                    .pending_association_deltas(name)
                    .any(|d| d.adds_value_by(|p| p.same_target(v)))
            })
            .collect();
        let delete: Vec<AssociationValue> = plan
            .delete
            .into_iter()
            .filter(|v| {
                !projection
                    .pending_association_deltas(name)
                    .any(|d| d.deletes_value_by(|p| p.same_target(v)))
            })
            .collect();

        let counts = DeltaCounts {
            added: add.len(),
            replaced: 0,
            deleted: delete.len(),
        };
        if !add.is_empty() {
            swallow(projection, ItemDelta::add(name, add), &are);
        }
        if !delete.is_empty() {
            swallow(projection, ItemDelta::delete(name, delete), &are);
        }
        outcome.record(name, counts);
    }
    Ok(())
}

fn should_be_values(projection: &Projection, name: &str) -> Vec<ValueWithOrigin<AssociationValue>> {
    let mut values: Vec<ValueWithOrigin<AssociationValue>> = projection
        .squeezed_associations()
        .get(name)
        .map(|triple| triple.non_negative().filter(|v| v.valid).cloned().collect())
        .unwrap_or_default();
    if let Some(primary) = projection
        .primary_delta()
        .and_then(|d| d.find_association_delta(name))
    {
        values.extend(
            primary
                .values_present_after()
                .cloned()
                .map(ValueWithOrigin::requested),
        );
    }
    values
}

/// Evaluate patterns on the target's naming attribute.
///
/// A target that cannot be fetched is logged and treated as matching no
/// pattern. Missing naming attribute metadata is a configuration error.
async fn evaluate_patterns(
    engine: &ReconciliationEngine,
    assoc_def: &AssociationDefinition,
    value: &AssociationValue,
) -> ResourceResult<PatternVerdict> {
    let target = &value.target;
    let target_def = engine
        .schema()
        .find_definition(&target.object_class, target.type_identification.as_ref())
        .or_else(|| {
            assoc_def
                .target_object_class()
                .and_then(|class| engine.schema().find_object_class(class))
        });
    let naming_attribute = target_def
        .and_then(|d| d.naming_attribute())
        .ok_or_else(|| {
            ResourceError::configuration(format!(
                "association '{}' has value patterns but the target class '{}' has no naming attribute",
                assoc_def.name(),
                target.object_class
            ))
        })?;

    let naming_value: Option<AttributeValue> = match target
        .identifier(naming_attribute)
        .and_then(|values| values.first())
    {
        Some(v) => Some(v.clone()),
        None => match engine.resolver() {
            Some(resolver) => match resolver.resolve_target(assoc_def, target).await {
                Ok(Some(shadow)) => shadow.attribute_values(naming_attribute).first().cloned(),
                Ok(None) => {
                    warn!(
                        association = %assoc_def.name(),
                        target = ?target.oid,
                        "Association target not found, patterns not evaluated"
                    );
                    None
                }
                Err(e) => {
                    warn!(
                        association = %assoc_def.name(),
                        target = ?target.oid,
                        error = %e,
                        "Cannot fetch association target, patterns not evaluated"
                    );
                    None
                }
            },
            None => {
                warn!(
                    association = %assoc_def.name(),
                    target = ?target.oid,
                    "No target resolver, patterns not evaluated"
                );
                None
            }
        },
    };

    let Some(naming_value) = naming_value else {
        return Ok(PatternVerdict::NoMatch);
    };
    let patterns = assoc_def.patterns();
    Ok(if patterns.matches_tolerant(&naming_value) {
        PatternVerdict::Tolerated
    } else if patterns.matches_intolerant(&naming_value) {
        PatternVerdict::Intolerant
    } else {
        PatternVerdict::NoMatch
    })
}

fn swallow(projection: &mut Projection, delta: ItemDelta<AssociationValue>, are: &[AssociationValue]) {
    let delta = delta
        .with_origin(DeltaOrigin::Reconciliation)
        .with_estimated_old_values(are.to_vec());
    trace!(delta = %delta, "Adding reconciliation delta");
    projection.swallow_to_secondary_delta(ItemModification::Association(delta));
}
