//! Reconciliation Engine Tests
//!
//! End-to-end tests for `ReconciliationEngine::reconcile` covering:
//! - Tolerant and non-tolerant attributes
//! - Mapping strength (weak, normal, strong, requested)
//! - Tolerant and intolerant value patterns
//! - Single-valued conflicts and matching rules
//! - Auxiliary object classes and the attribute cascade
//! - Associations, including target resolution for patterns
//! - Idempotence of repeated runs

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use xavyo_provisioning::reconciliation::{
    AssociationTargetResolver, NotApplicableReason, ReconciliationEngine, ReconciliationStatus,
};
use xavyo_provisioning::{
    AbstractShadow, ConsistencyChecks, MappingOrigin, Projection, ShadowBean, SqueezedTriple,
    SynchronizationPolicyDecision, ValueWithOrigin,
};
use xavyo_resource::delta::{ItemDelta, ItemModification, ObjectDelta};
use xavyo_resource::error::ResourceResult;
use xavyo_resource::ids::ResourceId;
use xavyo_resource::item::{AssociationValue, ShadowReference};
use xavyo_resource::matching::MatchingRule;
use xavyo_resource::schema::{
    AssociationDefinition, AssociationDirection, AssociationParticipantType,
    AttributeCustomization, AttributeDataType, AttributeDefinition, NativeAttributeDefinition,
    ResourceObjectDefinition, ResourceSchema,
};
use xavyo_resource::value::AttributeValue;

// =============================================================================
// Fixtures
// =============================================================================

fn attr(name: &str, data_type: AttributeDataType) -> NativeAttributeDefinition {
    NativeAttributeDefinition::new(name, data_type)
}

fn customized(native: NativeAttributeDefinition, c: AttributeCustomization) -> AttributeDefinition {
    AttributeDefinition::new(native, c).expect("valid customization")
}

fn group_definition() -> ResourceObjectDefinition {
    ResourceObjectDefinition::builder("groupOfNames")
        .attribute(AttributeDefinition::from_native(attr("dn", AttributeDataType::Dn)))
        .attribute(AttributeDefinition::from_native(attr("cn", AttributeDataType::String)))
        .primary_identifier("dn")
        .naming_attribute("cn")
        .build()
        .expect("valid group definition")
}

fn account_definition() -> ResourceObjectDefinition {
    let posix = ResourceObjectDefinition::builder("posixAccount")
        .attribute(AttributeDefinition::from_native(attr(
            "uidNumber",
            AttributeDataType::Integer,
        )))
        .build()
        .expect("valid auxiliary definition");

    let group = AssociationDefinition::new("group", AssociationDirection::SubjectToObject, "memberOf", "dn")
        .with_object(AssociationParticipantType::for_class("groupOfNames"))
        .with_customization(
            AttributeCustomization::default()
                .tolerant(false)
                .with_tolerant_pattern("admins"),
        )
        .expect("valid association customization");

    ResourceObjectDefinition::builder("inetOrgPerson")
        .attribute(AttributeDefinition::from_native(attr("uid", AttributeDataType::String)))
        .attribute(customized(
            attr("cn", AttributeDataType::String),
            AttributeCustomization::default().with_matching_rule(MatchingRule::StringIgnoreCase),
        ))
        .attribute(customized(
            attr("mail", AttributeDataType::String).multi_valued(),
            AttributeCustomization::default().tolerant(false),
        ))
        .attribute(customized(
            attr("description", AttributeDataType::String).multi_valued(),
            AttributeCustomization::default()
                .tolerant(false)
                .with_tolerant_pattern("legacy-.*"),
        ))
        .attribute(customized(
            attr("employeeType", AttributeDataType::String).multi_valued(),
            AttributeCustomization::default().with_intolerant_pattern("temp-.*"),
        ))
        .primary_identifier("uid")
        .naming_attribute("uid")
        .auxiliary_object_class(posix)
        .auxiliary_tolerant(false)
        .association(group)
        .build()
        .expect("valid account definition")
}

struct Fixture {
    resource_id: ResourceId,
    definition: ResourceObjectDefinition,
    schema: Arc<ResourceSchema>,
    engine: ReconciliationEngine,
}

impl Fixture {
    fn new() -> Self {
        let resource_id = ResourceId::new();
        let definition = account_definition();
        let schema = Arc::new(
            ResourceSchema::new(resource_id, 1)
                .with_object_class(definition.clone())
                .with_object_class(group_definition()),
        );
        Self {
            resource_id,
            definition,
            engine: ReconciliationEngine::new(Arc::clone(&schema)),
            schema,
        }
    }

    fn with_resolver(mut self, resolver: Arc<dyn AssociationTargetResolver>) -> Self {
        self.engine = self.engine.with_target_resolver(resolver);
        self
    }

    fn account(&self) -> ShadowBean {
        ShadowBean::new("inetOrgPerson")
            .with_resource(self.resource_id)
            .with_attribute("uid", vec!["jack".into()])
    }

    fn shadow(&self, bean: ShadowBean) -> AbstractShadow {
        AbstractShadow::new(bean, self.definition.clone()).expect("shadow fits definition")
    }

    fn projection(&self, bean: ShadowBean) -> Projection {
        Projection::new(self.resource_id, self.definition.clone())
            .with_decision(SynchronizationPolicyDecision::Keep)
            .with_current_shadow(self.shadow(bean), true)
    }
}

fn values(items: &[&str]) -> Vec<AttributeValue> {
    items.iter().map(|s| AttributeValue::from(*s)).collect()
}

fn group_ref(dn: &str, cn: Option<&str>) -> AssociationValue {
    let mut target = ShadowReference::by_identifiers("groupOfNames", Default::default())
        .with_identifier("dn", dn);
    if let Some(cn) = cn {
        target = target.with_identifier("cn", cn);
    }
    AssociationValue::new(target)
}

/// Resolver returning a fixed naming attribute for every target.
struct CountingResolver {
    definition: ResourceObjectDefinition,
    resource_id: ResourceId,
    naming_value: String,
    calls: AtomicUsize,
}

impl CountingResolver {
    fn new(resource_id: ResourceId, naming_value: &str) -> Self {
        Self {
            definition: group_definition(),
            resource_id,
            naming_value: naming_value.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssociationTargetResolver for CountingResolver {
    async fn resolve_target(
        &self,
        _association: &AssociationDefinition,
        target: &ShadowReference,
    ) -> ResourceResult<Option<AbstractShadow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let dn = target
            .identifier("dn")
            .and_then(|v| v.first())
            .cloned()
            .unwrap_or_else(|| AttributeValue::from("cn=unknown"));
        let bean = ShadowBean::new("groupOfNames")
            .with_resource(self.resource_id)
            .with_attribute("dn", vec![dn])
            .with_attribute("cn", vec![self.naming_value.as_str().into()]);
        AbstractShadow::new(bean, self.definition.clone()).map(Some)
    }
}

// =============================================================================
// Attributes
// =============================================================================

#[tokio::test]
async fn test_non_tolerant_attribute_deletes_unmanaged_value() {
    let fx = Fixture::new();
    let strong = MappingOrigin::strong("mail-outbound");
    let mut projection = fx
        .projection(fx.account().with_attribute("mail", values(&["a@x.com", "b@x.com"])))
        .with_squeezed_attribute(
            "mail",
            SqueezedTriple::new().with_zero(ValueWithOrigin::from_mapping("a@x.com".into(), &strong)),
        );

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    assert_eq!(outcome.status, ReconciliationStatus::Reconciled);
    let delta = projection.secondary_delta().expect("secondary delta");
    let mail = delta.find_attribute_delta("mail").expect("mail delta");
    assert_eq!(mail.values_to_delete(), values(&["b@x.com"]).as_slice());
    assert!(mail.values_to_add().is_empty());
    assert!(mail.values_to_replace().is_none());
    assert_eq!(outcome.item("mail").unwrap().deleted, 1);
    assert_eq!(outcome.added(), 0);
    // Unmapped tolerant attributes are left alone.
    assert!(delta.find_attribute_delta("uid").is_none());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let fx = Fixture::new();
    let strong = MappingOrigin::strong("mail-outbound");
    let triple =
        SqueezedTriple::new().with_zero(ValueWithOrigin::from_mapping("a@x.com".into(), &strong));
    let bean = fx.account().with_attribute("mail", values(&["a@x.com", "b@x.com"]));

    let mut first = fx
        .projection(bean.clone())
        .with_squeezed_attribute("mail", triple.clone());
    fx.engine.reconcile(&mut first).await.unwrap();
    let delta = first.take_secondary_delta().expect("secondary delta");

    let mut shadow = fx.shadow(bean);
    shadow.update_with(&delta).unwrap();
    assert_eq!(shadow.attribute_values("mail"), values(&["a@x.com"]).as_slice());

    let mut second = Projection::new(fx.resource_id, fx.definition.clone())
        .with_decision(SynchronizationPolicyDecision::Keep)
        .with_current_shadow(shadow, true)
        .with_squeezed_attribute("mail", triple);
    let outcome = fx.engine.reconcile(&mut second).await.unwrap();

    assert!(!outcome.has_changes());
    assert!(second.secondary_delta().map_or(true, ObjectDelta::is_empty));
}

#[tokio::test]
async fn test_strong_value_overrides_weak() {
    let fx = Fixture::new();
    let weak = MappingOrigin::weak("cn-default");
    let strong = MappingOrigin::strong("cn-fullname");
    let mut projection = fx.projection(fx.account()).with_squeezed_attribute(
        "cn",
        SqueezedTriple::new()
            .with_plus(ValueWithOrigin::from_mapping("Nobody".into(), &weak))
            .with_plus(ValueWithOrigin::from_mapping("Jack Sparrow".into(), &strong)),
    );

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    let cn = projection
        .secondary_delta()
        .and_then(|d| d.find_attribute_delta("cn"))
        .expect("cn delta");
    assert_eq!(cn.values_to_replace(), Some(values(&["Jack Sparrow"]).as_slice()));
    assert_eq!(outcome.replaced(), 1);
}

#[tokio::test]
async fn test_weak_value_does_not_overwrite_existing_value() {
    let fx = Fixture::new();
    let weak = MappingOrigin::weak("cn-default");
    let mut projection = fx
        .projection(fx.account().with_attribute("cn", values(&["Jack"])))
        .with_squeezed_attribute(
            "cn",
            SqueezedTriple::new().with_plus(ValueWithOrigin::from_mapping("Nobody".into(), &weak)),
        );

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    assert!(!outcome.has_changes());
}

#[tokio::test]
async fn test_single_valued_conflict_is_schema_error() {
    let fx = Fixture::new();
    let first = MappingOrigin::strong("cn-first");
    let second = MappingOrigin::strong("cn-second");
    let mut projection = fx.projection(fx.account()).with_squeezed_attribute(
        "cn",
        SqueezedTriple::new()
            .with_plus(ValueWithOrigin::from_mapping("Jack".into(), &first))
            .with_plus(ValueWithOrigin::from_mapping("Jim".into(), &second)),
    );

    let err = fx.engine.reconcile(&mut projection).await.unwrap_err();

    assert_eq!(err.error_code(), "SCHEMA_ERROR");
    let message = err.to_string();
    assert!(message.contains("cn-first"));
    assert!(message.contains("cn-second"));
}

#[tokio::test]
async fn test_single_valued_values_equal_under_matching_rule() {
    let fx = Fixture::new();
    let first = MappingOrigin::strong("cn-first");
    let second = MappingOrigin::strong("cn-second");
    let mut projection = fx.projection(fx.account()).with_squeezed_attribute(
        "cn",
        SqueezedTriple::new()
            .with_plus(ValueWithOrigin::from_mapping("Jack".into(), &first))
            .with_plus(ValueWithOrigin::from_mapping("JACK".into(), &second)),
    );

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    let cn = projection
        .secondary_delta()
        .and_then(|d| d.find_attribute_delta("cn"))
        .expect("cn delta");
    assert_eq!(cn.values_to_replace().map(<[_]>::len), Some(1));
    assert_eq!(outcome.replaced(), 1);
}

#[tokio::test]
async fn test_real_value_equal_under_matching_rule_is_kept() {
    let fx = Fixture::new();
    let strong = MappingOrigin::strong("cn-fullname");
    let mut projection = fx
        .projection(fx.account().with_attribute("cn", values(&["JACK SPARROW"])))
        .with_squeezed_attribute(
            "cn",
            SqueezedTriple::new()
                .with_zero(ValueWithOrigin::from_mapping("Jack Sparrow".into(), &strong)),
        );

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    assert!(!outcome.has_changes());
}

#[tokio::test]
async fn test_tolerant_pattern_keeps_value_on_non_tolerant_attribute() {
    let fx = Fixture::new();
    let strong = MappingOrigin::strong("description");
    let mut projection = fx
        .projection(fx.account().with_attribute("description", values(&["legacy-1", "stale"])))
        .with_squeezed_attribute(
            "description",
            SqueezedTriple::new().with_plus(ValueWithOrigin::from_mapping("current".into(), &strong)),
        );

    fx.engine.reconcile(&mut projection).await.unwrap();

    let description = projection
        .secondary_delta()
        .and_then(|d| d.find_attribute_delta("description"))
        .expect("description delta");
    assert_eq!(description.values_to_add(), values(&["current"]).as_slice());
    assert_eq!(description.values_to_delete(), values(&["stale"]).as_slice());
}

#[tokio::test]
async fn test_intolerant_pattern_deletes_value_on_tolerant_attribute() {
    let fx = Fixture::new();
    let mut projection =
        fx.projection(fx.account().with_attribute("employeeType", values(&["staff", "temp-2023"])));

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    let employee_type = projection
        .secondary_delta()
        .and_then(|d| d.find_attribute_delta("employeeType"))
        .expect("employeeType delta");
    assert_eq!(employee_type.values_to_delete(), values(&["temp-2023"]).as_slice());
    assert_eq!(outcome.deleted(), 1);
}

#[tokio::test]
async fn test_requested_value_is_neither_deleted_nor_added_again() {
    let fx = Fixture::new();
    let strong = MappingOrigin::strong("mail-outbound");
    let primary = ObjectDelta::modify().with(ItemModification::Attribute(ItemDelta::add(
        "mail",
        values(&["c@x.com"]),
    )));
    let mut projection = fx
        .projection(fx.account().with_attribute("mail", values(&["a@x.com", "b@x.com"])))
        .with_primary_delta(primary)
        .with_squeezed_attribute(
            "mail",
            SqueezedTriple::new().with_zero(ValueWithOrigin::from_mapping("a@x.com".into(), &strong)),
        );

    fx.engine.reconcile(&mut projection).await.unwrap();

    let mail = projection
        .secondary_delta()
        .and_then(|d| d.find_attribute_delta("mail"))
        .expect("mail delta");
    assert!(mail.values_to_add().is_empty());
    assert_eq!(mail.values_to_delete(), values(&["b@x.com"]).as_slice());
}

// =============================================================================
// Applicability
// =============================================================================

#[tokio::test]
async fn test_shadow_without_resource_reference_is_reconciled() {
    let fx = Fixture::new();
    let bean = ShadowBean::new("inetOrgPerson")
        .with_attribute("uid", vec!["jack".into()])
        .with_attribute("employeeType", values(&["temp-1"]));
    let mut projection = fx.projection(bean.clone());

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    assert_eq!(outcome.deleted(), 1);

    let thorough = ReconciliationEngine::new(Arc::clone(&fx.schema))
        .with_consistency_checks(ConsistencyChecks::thorough());
    let mut projection = fx.projection(bean);
    let err = thorough.reconcile(&mut projection).await.unwrap_err();
    assert_eq!(err.error_code(), "INTERNAL_ERROR");
    assert!(projection.secondary_delta().is_none());
}

#[tokio::test]
async fn test_deleted_projection_is_not_applicable() {
    let fx = Fixture::new();
    let mut projection = fx
        .projection(fx.account().with_attribute("employeeType", values(&["temp-1"])))
        .with_decision(SynchronizationPolicyDecision::Delete);

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    assert_eq!(
        outcome.status,
        ReconciliationStatus::NotApplicable(NotApplicableReason::DeleteOrUnlink)
    );
    assert!(projection.secondary_delta().is_none());
}

#[tokio::test]
async fn test_dead_shadow_is_not_applicable() {
    let fx = Fixture::new();
    let mut bean = fx.account();
    bean.dead = true;
    let mut projection = fx.projection(bean);

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    assert_eq!(
        outcome.status,
        ReconciliationStatus::NotApplicable(NotApplicableReason::Tombstone)
    );
}

#[tokio::test]
async fn test_partial_shadow_is_not_applicable() {
    let fx = Fixture::new();
    let mut projection = Projection::new(fx.resource_id, fx.definition.clone())
        .with_decision(SynchronizationPolicyDecision::Keep)
        .with_current_shadow(
            fx.shadow(fx.account().with_attribute("employeeType", values(&["temp-1"]))),
            false,
        );

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    assert!(outcome.is_not_applicable());
    assert!(projection.secondary_delta().is_none());
}

// =============================================================================
// Auxiliary object classes
// =============================================================================

#[tokio::test]
async fn test_removed_auxiliary_class_cascades_to_its_attributes() {
    let fx = Fixture::new();
    let mut projection = fx
        .projection(
            fx.account()
                .with_auxiliary_object_class("posixAccount")
                .with_attribute("uidNumber", vec![1000i64.into()]),
        )
        .with_squeezed_auxiliary_object_classes(SqueezedTriple::new());

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    let delta = projection.secondary_delta().expect("secondary delta");
    let aux = delta
        .find_auxiliary_object_class_delta()
        .expect("auxiliary class delta");
    assert_eq!(aux.values_to_delete(), ["posixAccount".to_string()].as_slice());
    let uid_number = delta
        .find_attribute_delta("uidNumber")
        .expect("uidNumber delta");
    assert_eq!(uid_number.values_to_delete(), [AttributeValue::from(1000i64)].as_slice());
    assert_eq!(outcome.item("auxiliaryObjectClass").unwrap().deleted, 1);
}

#[tokio::test]
async fn test_auxiliary_classes_untouched_without_squeezed_values() {
    let fx = Fixture::new();
    let mut projection = fx.projection(
        fx.account()
            .with_auxiliary_object_class("posixAccount")
            .with_attribute("uidNumber", vec![1000i64.into()]),
    );

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    assert!(outcome.item("auxiliaryObjectClass").is_none());
    assert!(!outcome.has_changes());
}

#[tokio::test]
async fn test_requested_class_removal_cascades_without_squeezed_values() {
    let fx = Fixture::new();
    let primary = ObjectDelta::modify().with(ItemModification::AuxiliaryObjectClass(
        ItemDelta::delete("auxiliaryObjectClass", vec!["posixAccount".to_string()]),
    ));
    let mut projection = fx
        .projection(
            fx.account()
                .with_auxiliary_object_class("posixAccount")
                .with_attribute("uidNumber", vec![1000i64.into()]),
        )
        .with_primary_delta(primary);

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    let delta = projection.secondary_delta().expect("secondary delta");
    assert!(delta.find_auxiliary_object_class_delta().is_none());
    let uid_number = delta
        .find_attribute_delta("uidNumber")
        .expect("uidNumber delta");
    assert_eq!(uid_number.values_to_delete(), [AttributeValue::from(1000i64)].as_slice());
    assert_eq!(outcome.item("uidNumber").unwrap().deleted, 1);
    assert!(outcome.item("auxiliaryObjectClass").is_none());
}

#[tokio::test]
async fn test_missing_auxiliary_class_is_added() {
    let fx = Fixture::new();
    let strong = MappingOrigin::strong("posix");
    let mut projection = fx.projection(fx.account()).with_squeezed_auxiliary_object_classes(
        SqueezedTriple::new().with_plus(ValueWithOrigin::from_mapping(
            "posixAccount".to_string(),
            &strong,
        )),
    );

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    let aux = projection
        .secondary_delta()
        .and_then(ObjectDelta::find_auxiliary_object_class_delta)
        .expect("auxiliary class delta");
    assert_eq!(aux.values_to_add(), ["posixAccount".to_string()].as_slice());
    assert_eq!(outcome.added(), 1);
}

// =============================================================================
// Associations
// =============================================================================

#[tokio::test]
async fn test_association_patterns_use_target_naming_attribute() {
    let fx = Fixture::new();
    let strong = MappingOrigin::strong("groups");
    let mut projection = fx
        .projection(
            fx.account()
                .with_association("group", group_ref("cn=admins,o=x", Some("admins")))
                .with_association("group", group_ref("cn=devs,o=x", Some("devs"))),
        )
        .with_squeezed_association(
            "group",
            SqueezedTriple::new().with_plus(ValueWithOrigin::from_mapping(
                group_ref("cn=ops,o=x", Some("ops")),
                &strong,
            )),
        );

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    let group = projection
        .secondary_delta()
        .and_then(|d| d.find_association_delta("group"))
        .expect("group delta");
    assert_eq!(group.values_to_add().len(), 1);
    assert!(group.values_to_add()[0].same_target(&group_ref("cn=ops,o=x", None)));
    assert_eq!(group.values_to_delete().len(), 1);
    assert!(group.values_to_delete()[0].same_target(&group_ref("cn=devs,o=x", None)));
    let counts = outcome.item("group").unwrap();
    assert_eq!((counts.added, counts.deleted), (1, 1));
}

#[tokio::test]
async fn test_association_target_fetched_for_patterns() {
    let fx = Fixture::new();
    let resolver = Arc::new(CountingResolver::new(fx.resource_id, "admins"));
    let fx = fx.with_resolver(resolver.clone());
    let mut projection = fx.projection(
        fx.account()
            .with_association("group", group_ref("cn=admins,o=x", None)),
    );

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    assert_eq!(resolver.call_count(), 1);
    assert!(!outcome.has_changes());
}

#[tokio::test]
async fn test_association_without_resolver_matches_no_pattern() {
    let fx = Fixture::new();
    let mut projection = fx.projection(
        fx.account()
            .with_association("group", group_ref("cn=admins,o=x", None)),
    );

    let outcome = fx.engine.reconcile(&mut projection).await.unwrap();

    // Non-tolerant association: the unresolved value is removed.
    assert_eq!(outcome.item("group").unwrap().deleted, 1);
}
