//! Attribute reconciliation.

use std::collections::BTreeSet;
use tracing::trace;

use xavyo_resource::delta::{DeltaOrigin, ItemDelta, ItemModification};
use xavyo_resource::error::ResourceResult;
use xavyo_resource::schema::{AttributeDefinition, DefinitionKind};
use xavyo_resource::value::AttributeValue;

use super::{plan_item, DeltaCounts, ItemShape, PatternVerdict, ReconciliationOutcome};
use crate::projection::Projection;
use crate::squeeze::ValueWithOrigin;

pub(super) fn reconcile_attributes(
    projection: &mut Projection,
    outcome: &mut ReconciliationOutcome,
) -> ResourceResult<()> {
    let definition = projection.definition().clone();

    let mut names: BTreeSet<String> = definition
        .all_attribute_definitions()
        .into_iter()
        .map(|d| d.name().to_string())
        .collect();
    names.extend(projection.squeezed_attributes().keys().cloned());

    for name in names {
        let attr_def = definition.find_attribute_definition_required(&name)?.clone();
        if let Some(reason) = skip_reason(projection, &attr_def) {
            trace!(attribute = %name, reason, "Skipping attribute reconciliation");
            continue;
        }

        let are: Vec<AttributeValue> = projection
            .current_shadow()
            .map(|s| s.attribute_values(&name).to_vec())
            .unwrap_or_default();
        let should_be = should_be_values(projection, &name);
        if are.is_empty() && should_be.is_empty() {
            continue;
        }

        let rule = attr_def.matching_rule();
        let eq = |a: &AttributeValue, b: &AttributeValue| rule.matches(a, b);
        let patterns = attr_def.patterns();
        let shape = ItemShape {
            name: &name,
            single_valued: attr_def.is_single_valued(),
            tolerant: attr_def.is_tolerant(),
        };
        let plan = plan_item(&shape, &are, &should_be, eq, |index| {
            let value = &are[index];
            if patterns.matches_tolerant(value) {
                PatternVerdict::Tolerated
            } else if patterns.matches_intolerant(value) {
                PatternVerdict::Intolerant
            } else {
                PatternVerdict::NoMatch
            }
        })?;

        let mut counts = DeltaCounts::default();
        if let Some(value) = plan.replace {
            if is_pending_add(projection, &name, &value, eq) {
                trace!(attribute = %name, ?value, "Replacement already pending");
            } else {
                let delta = ItemDelta::replace(name.as_str(), vec![value]);
                swallow(projection, delta, &are);
                counts.replaced += 1;
            }
        }

        let add: Vec<AttributeValue> = plan
            .add
            .into_iter()
            .filter(|v| !is_pending_add(projection, &name, v, eq))
            .collect();
        let delete: Vec<AttributeValue> = plan
            .delete
            .into_iter()
            .filter(|v| !is_pending_delete(projection, &name, v, eq))
            .collect();
        counts.added += add.len();
        counts.deleted += delete.len();
        if !add.is_empty() {
            swallow(projection, ItemDelta::add(name.as_str(), add), &are);
        }
        if !delete.is_empty() {
            swallow(projection, ItemDelta::delete(name.as_str(), delete), &are);
        }
        outcome.record(&name, counts);
    }
    Ok(())
}

fn skip_reason(projection: &Projection, attr_def: &AttributeDefinition) -> Option<&'static str> {
    if attr_def.kind() == DefinitionKind::Reference {
        Some("reference attribute, reconciled as association")
    } else if attr_def.is_ignored() {
        Some("ignored")
    } else if !attr_def.is_visible(projection.execution_mode()) {
        Some("not visible in execution mode")
    } else if projection.is_add() && !attr_def.can_add() {
        Some("cannot be added")
    } else if !projection.is_add() && !attr_def.can_modify() {
        Some("cannot be modified")
    } else {
        None
    }
}

/// Valid squeezed values plus values the caller explicitly requested.
///
/// Synchronization and secondary deltas do not contribute.
fn should_be_values(projection: &Projection, name: &str) -> Vec<ValueWithOrigin<AttributeValue>> {
    let mut values: Vec<ValueWithOrigin<AttributeValue>> = projection
        .squeezed_attributes()
        .get(name)
        .map(|triple| triple.non_negative().filter(|v| v.valid).cloned().collect())
        .unwrap_or_default();
    if let Some(primary) = projection
        .primary_delta()
        .and_then(|d| d.find_attribute_delta(name))
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

fn is_pending_add(
    projection: &Projection,
    name: &str,
    value: &AttributeValue,
    eq: impl Fn(&AttributeValue, &AttributeValue) -> bool,
) -> bool {
    projection
        .pending_attribute_deltas(name)
        .any(|d| d.adds_value_by(|v| eq(v, value)))
}

fn is_pending_delete(
    projection: &Projection,
    name: &str,
    value: &AttributeValue,
    eq: impl Fn(&AttributeValue, &AttributeValue) -> bool,
) -> bool {
    projection
        .pending_attribute_deltas(name)
        .any(|d| d.deletes_value_by(|v| eq(v, value)))
}

fn swallow(projection: &mut Projection, delta: ItemDelta<AttributeValue>, are: &[AttributeValue]) {
    let delta = delta
        .with_origin(DeltaOrigin::Reconciliation)
        .with_estimated_old_values(are.to_vec());
    trace!(delta = %delta, "Adding reconciliation delta");
    projection.swallow_to_secondary_delta(ItemModification::Attribute(delta));
}
