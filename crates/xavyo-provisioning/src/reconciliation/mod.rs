//! # Reconciliation Engine
//!
//! Computes the deltas that bring a resource object in line with the values
//! mappings say it should have, without removing values nobody manages.
//!
//! ## Overview
//!
//! For every attribute and association of a projection the engine compares
//! the *should-be* values (squeezed mapping output plus values the caller
//! requested in the primary delta) with the *real* values of the current
//! shadow:
//!
//! - Missing values are added; single-valued attributes get a replacement
//!   and fail when two different values compete.
//! - Weak and normal values yield to existing real values and to strong
//!   values; strong values always apply.
//! - Real values nobody asked for are kept when they match a tolerant
//!   pattern, deleted when they match an intolerant pattern, and otherwise
//!   deleted only from non-tolerant items.
//!
//! Auxiliary object classes are reconciled last; removing one also removes
//! the values of attributes only that class defined.
//!
//! Every emitted delta is tagged with the reconciliation origin, carries
//! the old values, and is folded into the projection's secondary delta unless
//! an equivalent change is already pending.
//!
//! ## Usage
//!
//! ```ignore
//! use xavyo_provisioning::reconciliation::ReconciliationEngine;
//!
//! let engine = ReconciliationEngine::new(schema).with_target_resolver(resolver);
//! let outcome = engine.reconcile(&mut projection).await?;
//! let secondary = projection.secondary_delta();
//! ```

mod associations;
mod attributes;
mod auxiliary;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use xavyo_resource::error::{ResourceError, ResourceResult};
use xavyo_resource::item::ShadowReference;
use xavyo_resource::schema::{AssociationDefinition, ResourceSchema};

use crate::config::ConsistencyChecks;
use crate::projection::Projection;
use crate::shadow::AbstractShadow;
use crate::squeeze::ValueWithOrigin;

/// Fetches association targets whose cached reference lacks the values
/// needed for pattern evaluation.
#[async_trait]
pub trait AssociationTargetResolver: Send + Sync {
    /// Fetch the target object; `None` when it does not exist.
    async fn resolve_target(
        &self,
        association: &AssociationDefinition,
        target: &ShadowReference,
    ) -> ResourceResult<Option<AbstractShadow>>;
}

/// Why a projection was not reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotApplicableReason {
    /// The projection is being deleted or unlinked.
    DeleteOrUnlink,
    /// The resource object no longer exists.
    Tombstone,
    /// The current state was not read completely from the resource.
    NoFullShadow,
}

impl fmt::Display for NotApplicableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotApplicableReason::DeleteOrUnlink => "projection is being deleted or unlinked",
            NotApplicableReason::Tombstone => "resource object is dead",
            NotApplicableReason::NoFullShadow => "no full shadow available",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum ReconciliationStatus {
    Reconciled,
    NotApplicable(NotApplicableReason),
}

/// Values changed for one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeltaCounts {
    pub added: usize,
    pub replaced: usize,
    pub deleted: usize,
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationOutcome {
    pub status: ReconciliationStatus,
    /// Counts of emitted values per item name.
    pub items: BTreeMap<String, DeltaCounts>,
}

impl ReconciliationOutcome {
    fn reconciled() -> Self {
        Self {
            status: ReconciliationStatus::Reconciled,
            items: BTreeMap::new(),
        }
    }

    fn not_applicable(reason: NotApplicableReason) -> Self {
        Self {
            status: ReconciliationStatus::NotApplicable(reason),
            items: BTreeMap::new(),
        }
    }

    pub fn is_not_applicable(&self) -> bool {
        matches!(self.status, ReconciliationStatus::NotApplicable(_))
    }

    /// Whether any delta was emitted.
    pub fn has_changes(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn added(&self) -> usize {
        self.items.values().map(|c| c.added).sum()
    }

    pub fn replaced(&self) -> usize {
        self.items.values().map(|c| c.replaced).sum()
    }

    pub fn deleted(&self) -> usize {
        self.items.values().map(|c| c.deleted).sum()
    }

    pub fn item(&self, name: &str) -> Option<&DeltaCounts> {
        self.items.get(name)
    }

    fn record(&mut self, item: &str, plan_counts: DeltaCounts) {
        if plan_counts == DeltaCounts::default() {
            return;
        }
        let entry = self.items.entry(item.to_string()).or_default();
        entry.added += plan_counts.added;
        entry.replaced += plan_counts.replaced;
        entry.deleted += plan_counts.deleted;
    }
}

/// Verdict of tolerant/intolerant patterns on one real value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PatternVerdict {
    Tolerated,
    Intolerant,
    NoMatch,
}

/// Changes planned for one item before pending-delta suppression.
#[derive(Debug)]
pub(crate) struct ItemPlan<V> {
    pub replace: Option<V>,
    pub add: Vec<V>,
    pub delete: Vec<V>,
}

impl<V> Default for ItemPlan<V> {
    fn default() -> Self {
        Self {
            replace: None,
            add: Vec::new(),
            delete: Vec::new(),
        }
    }
}

/// Inputs describing one item.
pub(crate) struct ItemShape<'a> {
    pub name: &'a str,
    pub single_valued: bool,
    pub tolerant: bool,
}

/// Decide which values to add, replace and delete for one item.
///
/// `verdict` is asked only for real values that no should-be value covers,
/// by their index in `are`.
pub(crate) fn plan_item<V: Clone + fmt::Debug>(
    shape: &ItemShape<'_>,
    are: &[V],
    should_be: &[ValueWithOrigin<V>],
    eq: impl Fn(&V, &V) -> bool,
    mut verdict: impl FnMut(usize) -> PatternVerdict,
) -> ResourceResult<ItemPlan<V>> {
    let item = shape.name;
    let has_strong = should_be.iter().any(ValueWithOrigin::is_strong);
    let weak_only = !should_be.is_empty() && should_be.iter().all(ValueWithOrigin::is_weak);
    let mut plan = ItemPlan::default();
    let mut to_set: Option<&ValueWithOrigin<V>> = None;

    for candidate in should_be {
        if !candidate.is_strong() && (!are.is_empty() || has_strong) {
            trace!(
                item,
                value = ?candidate.value,
                strength = %candidate.strength(),
                "Skipping value, item already has a value or a strong value"
            );
            continue;
        }
        if are.iter().any(|v| eq(v, &candidate.value)) {
            continue;
        }
        if shape.single_valued {
            match to_set {
                Some(existing) if eq(&existing.value, &candidate.value) => {}
                Some(existing) => {
                    return Err(ResourceError::schema(format!(
                        "Attempt to set more than one value for single-valued item '{item}': \
                         {:?} (mapping {}) and {:?} (mapping {})",
                        existing.value,
                        existing.mapping_name().unwrap_or("<request>"),
                        candidate.value,
                        candidate.mapping_name().unwrap_or("<request>"),
                    )))
                }
                None => to_set = Some(candidate),
            }
        } else if !plan.add.iter().any(|v| eq(v, &candidate.value)) {
            plan.add.push(candidate.value.clone());
        }
    }

    if let Some(value) = to_set {
        plan.replace = Some(value.value.clone());
        return Ok(plan);
    }

    for (index, real) in are.iter().enumerate() {
        if should_be.iter().any(|s| eq(&s.value, real)) {
            continue;
        }
        match verdict(index) {
            PatternVerdict::Tolerated => {
                trace!(item, value = ?real, "Keeping value matching a tolerant pattern");
            }
            PatternVerdict::Intolerant => {
                trace!(item, value = ?real, "Deleting value matching an intolerant pattern");
                plan.delete.push(real.clone());
            }
            PatternVerdict::NoMatch if shape.tolerant => {}
            PatternVerdict::NoMatch if weak_only => {
                trace!(item, value = ?real, "Keeping unmanaged value, only weak mappings apply");
            }
            PatternVerdict::NoMatch => {
                trace!(item, value = ?real, "Deleting value of non-tolerant item");
                plan.delete.push(real.clone());
            }
        }
    }
    Ok(plan)
}

/// Computes reconciliation deltas for projections.
///
/// The engine holds no per-projection state; one instance can serve any
/// number of projections concurrently.
pub struct ReconciliationEngine {
    schema: Arc<ResourceSchema>,
    resolver: Option<Arc<dyn AssociationTargetResolver>>,
    consistency_checks: ConsistencyChecks,
}

impl ReconciliationEngine {
    pub fn new(schema: Arc<ResourceSchema>) -> Self {
        Self {
            schema,
            resolver: None,
            consistency_checks: ConsistencyChecks::default(),
        }
    }

    #[must_use]
    pub fn with_target_resolver(mut self, resolver: Arc<dyn AssociationTargetResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_consistency_checks(mut self, checks: ConsistencyChecks) -> Self {
        self.consistency_checks = checks;
        self
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    /// Reconcile one projection, extending its secondary delta.
    ///
    /// Projections being deleted or unlinked, dead ones, and those without a
    /// fully read shadow are reported as not applicable and left untouched.
    #[instrument(
        skip(self, projection),
        fields(
            resource_id = %projection.resource_id(),
            object_class = %projection.definition().object_class_name()
        )
    )]
    pub async fn reconcile(&self, projection: &mut Projection) -> ResourceResult<ReconciliationOutcome> {
        if let Some(reason) = not_applicable_reason(projection) {
            debug!(reason = %reason, "Skipping reconciliation");
            return Ok(ReconciliationOutcome::not_applicable(reason));
        }
        if self.consistency_checks.thorough {
            if let Some(shadow) = projection.current_shadow() {
                shadow.check_consistence(&self.consistency_checks)?;
            }
        }

        let mut outcome = ReconciliationOutcome::reconciled();
        attributes::reconcile_attributes(projection, &mut outcome)?;
        associations::reconcile_associations(self, projection, &mut outcome).await?;
        auxiliary::reconcile_auxiliary_object_classes(projection, &mut outcome)?;

        debug!(
            added = outcome.added(),
            replaced = outcome.replaced(),
            deleted = outcome.deleted(),
            "Projection reconciled"
        );
        Ok(outcome)
    }

    fn resolver(&self) -> Option<&dyn AssociationTargetResolver> {
        self.resolver.as_deref()
    }
}

fn not_applicable_reason(projection: &Projection) -> Option<NotApplicableReason> {
    if projection.is_delete_or_unlink() {
        Some(NotApplicableReason::DeleteOrUnlink)
    } else if projection.is_tombstone() {
        Some(NotApplicableReason::Tombstone)
    } else if !projection.is_add() && !projection.has_full_shadow() {
        Some(NotApplicableReason::NoFullShadow)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::squeeze::MappingOrigin;

    fn shape(single_valued: bool, tolerant: bool) -> ItemShape<'static> {
        ItemShape {
            name: "mail",
            single_valued,
            tolerant,
        }
    }

    fn eq(a: &String, b: &String) -> bool {
        a.eq_ignore_ascii_case(b)
    }

    fn no_patterns(_: usize) -> PatternVerdict {
        PatternVerdict::NoMatch
    }

    #[test]
    fn test_multi_valued_add_and_delete() {
        let strong = MappingOrigin::strong("m");
        let plan = plan_item(
            &shape(false, false),
            &["a".to_string(), "b".to_string()],
            &[
                ValueWithOrigin::from_mapping("a".to_string(), &strong),
                ValueWithOrigin::from_mapping("c".to_string(), &strong),
            ],
            eq,
            no_patterns,
        )
        .unwrap();

        assert_eq!(plan.add, vec!["c".to_string()]);
        assert_eq!(plan.delete, vec!["b".to_string()]);
        assert!(plan.replace.is_none());
    }

    #[test]
    fn test_single_valued_conflict() {
        let strong = MappingOrigin::strong("m");
        let err = plan_item(
            &shape(true, true),
            &[],
            &[
                ValueWithOrigin::from_mapping("Jack".to_string(), &strong),
                ValueWithOrigin::from_mapping("Jim".to_string(), &strong),
            ],
            eq,
            no_patterns,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_ERROR");
    }

    #[test]
    fn test_single_valued_duplicates_under_matching_rule() {
        let strong = MappingOrigin::strong("m");
        let plan = plan_item(
            &shape(true, true),
            &[],
            &[
                ValueWithOrigin::from_mapping("Jack".to_string(), &strong),
                ValueWithOrigin::from_mapping("JACK".to_string(), &strong),
            ],
            eq,
            no_patterns,
        )
        .unwrap();
        assert_eq!(plan.replace, Some("Jack".to_string()));
    }

    #[test]
    fn test_normal_value_yields_to_real_value() {
        let normal = MappingOrigin::normal("m");
        let plan = plan_item(
            &shape(false, true),
            &["manual".to_string()],
            &[ValueWithOrigin::from_mapping("computed".to_string(), &normal)],
            eq,
            no_patterns,
        )
        .unwrap();
        assert!(plan.add.is_empty());
        assert!(plan.delete.is_empty());
    }

    #[test]
    fn test_weak_only_keeps_unmanaged_values() {
        let weak = MappingOrigin::weak("m");
        let plan = plan_item(
            &shape(false, false),
            &["manual".to_string()],
            &[ValueWithOrigin::from_mapping("default".to_string(), &weak)],
            eq,
            no_patterns,
        )
        .unwrap();
        assert!(plan.add.is_empty());
        assert!(plan.delete.is_empty());
    }

    #[test]
    fn test_pattern_precedence() {
        let are = vec!["keep".to_string(), "drop".to_string(), "other".to_string()];
        let verdicts = [
            PatternVerdict::Tolerated,
            PatternVerdict::Intolerant,
            PatternVerdict::NoMatch,
        ];
        let plan = plan_item(&shape(false, true), &are, &[], eq, |i| verdicts[i]).unwrap();
        assert_eq!(plan.delete, vec!["drop".to_string()]);

        let plan = plan_item(&shape(false, false), &are, &[], eq, |i| verdicts[i]).unwrap();
        assert_eq!(plan.delete, vec!["drop".to_string(), "other".to_string()]);
    }

    #[test]
    fn test_outcome_totals() {
        let mut outcome = ReconciliationOutcome::reconciled();
        outcome.record("mail", DeltaCounts { added: 1, replaced: 0, deleted: 2 });
        outcome.record("cn", DeltaCounts { added: 0, replaced: 1, deleted: 0 });
        outcome.record("sn", DeltaCounts::default());

        assert_eq!(outcome.added(), 1);
        assert_eq!(outcome.replaced(), 1);
        assert_eq!(outcome.deleted(), 2);
        assert!(outcome.item("sn").is_none());
        assert!(outcome.has_changes());
    }
}
