//! Resource Schema Tests
//!
//! Tests for definitions assembled from configuration documents:
//! - Native metadata and customizations deserialized from JSON
//! - Layered access limitations and lifecycle visibility
//! - Value patterns and their configuration errors
//! - Object definitions with auxiliary classes, and the schema cache

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use xavyo_resource::capabilities::Capabilities;
use xavyo_resource::error::ResourceError;
use xavyo_resource::ids::ResourceId;
use xavyo_resource::matching::MatchingRule;
use xavyo_resource::schema::{
    AttributeCustomization, AttributeDefinition, ExecutionMode, LayerType,
    NativeAttributeDefinition, ObjectTypeIdentification, ResourceObjectDefinition, ResourceSchema,
    ResourceSchemaCache, ShadowKind,
};
use xavyo_resource::value::AttributeValue;

// =============================================================================
// Fixtures
// =============================================================================

fn native_mail() -> NativeAttributeDefinition {
    serde_json::from_value(json!({
        "name": "mail",
        "nativeName": "mail",
        "dataType": "string",
        "maxOccurs": null
    }))
    .unwrap()
}

fn customization(value: serde_json::Value) -> AttributeCustomization {
    serde_json::from_value(value).unwrap()
}

// =============================================================================
// Attribute definitions
// =============================================================================

#[test]
fn test_native_definition_from_json() {
    let native = native_mail();

    assert!(native.is_multi_valued());
    assert!(native.returned_by_default);
    assert!(native.creatable && native.updatable && native.readable);
}

#[test]
fn test_customization_overlay_from_json() {
    let definition = AttributeDefinition::new(
        native_mail(),
        customization(json!({
            "displayName": "E-mail",
            "tolerant": false,
            "tolerantValuePatterns": [".*@legacy\\.example\\.com"],
            "matchingRule": "stringIgnoreCase",
            "fetchStrategy": "explicit"
        })),
    )
    .unwrap();

    assert_eq!(definition.display_name(), Some("E-mail"));
    assert!(!definition.is_tolerant());
    assert_eq!(definition.matching_rule(), MatchingRule::StringIgnoreCase);
    assert!(definition
        .patterns()
        .matches_tolerant(&AttributeValue::from("jack@legacy.example.com")));
    assert!(!definition
        .patterns()
        .matches_tolerant(&AttributeValue::from("jack@example.com")));
}

#[test]
fn test_empty_customization_defaults() {
    let definition = AttributeDefinition::new(native_mail(), customization(json!({}))).unwrap();

    assert!(definition.is_tolerant());
    assert!(!definition.is_ignored());
    assert!(definition.can_read() && definition.can_add() && definition.can_modify());
    assert!(definition.is_visible(ExecutionMode::Production));
}

#[test]
fn test_invalid_pattern_is_configuration_error() {
    let err = AttributeDefinition::new(
        native_mail(),
        customization(json!({ "intolerantValuePatterns": ["(unclosed"] })),
    )
    .unwrap_err();

    assert!(matches!(err, ResourceError::Configuration { .. }));
    assert!(err.to_string().contains("(unclosed"));
}

#[test]
fn test_limitations_apply_per_layer() {
    let definition = AttributeDefinition::new(
        native_mail(),
        customization(json!({
            "limitations": [{
                "layers": ["presentation"],
                "access": { "read": true, "add": false, "modify": false }
            }]
        })),
    )
    .unwrap();

    assert!(definition.can_modify());
    let presentation = definition.for_layer(LayerType::Presentation);
    assert!(presentation.can_read());
    assert!(!presentation.can_add());
    assert!(!presentation.can_modify());
}

#[test]
fn test_ignored_in_one_layer_only() {
    let definition = AttributeDefinition::new(
        native_mail(),
        customization(json!({
            "limitations": [{ "layers": ["model"], "ignore": true }]
        })),
    )
    .unwrap();

    assert!(definition.is_ignored());
    assert!(!definition.for_layer(LayerType::Presentation).is_ignored());
}

#[test]
fn test_proposed_attribute_visible_only_in_development() {
    let definition = AttributeDefinition::new(
        native_mail(),
        customization(json!({ "lifecycleState": "proposed" })),
    )
    .unwrap();

    assert!(!definition.is_visible(ExecutionMode::Production));
    assert!(definition.is_visible(ExecutionMode::Development));
}

// =============================================================================
// Object definitions and schema
// =============================================================================

fn account_type() -> ResourceObjectDefinition {
    let posix = ResourceObjectDefinition::builder("posixAccount")
        .attribute(AttributeDefinition::from_native(
            serde_json::from_value(json!({
                "name": "uidNumber",
                "nativeName": "uidNumber",
                "dataType": "integer"
            }))
            .unwrap(),
        ))
        .build()
        .unwrap();

    ResourceObjectDefinition::builder("inetOrgPerson")
        .type_identification(ObjectTypeIdentification::new(ShadowKind::Account, "default"))
        .attribute(AttributeDefinition::from_native(
            serde_json::from_value(json!({
                "name": "uid",
                "nativeName": "uid",
                "dataType": "string"
            }))
            .unwrap(),
        ))
        .attribute(
            AttributeDefinition::new(native_mail(), customization(json!({ "secondaryIdentifier": true })))
                .unwrap(),
        )
        .primary_identifier("uid")
        .auxiliary_object_class(posix)
        .build()
        .unwrap()
}

#[test]
fn test_secondary_identifier_forced_by_customization() {
    let definition = account_type();

    assert!(definition.is_primary_identifier("uid"));
    assert!(definition.is_secondary_identifier("mail"));
}

#[test]
fn test_auxiliary_attributes_are_found() {
    let definition = account_type();

    assert!(definition.find_attribute_definition("uidNumber").is_some());
    assert!(definition
        .attribute_definitions()
        .iter()
        .all(|d| d.name() != "uidNumber"));
    assert_eq!(definition.all_attribute_definitions().len(), 3);
    assert!(definition.find_attribute_definition_required("gecos").is_err());
}

#[test]
fn test_schema_finds_type_and_class() {
    let account = account_type();
    let schema = ResourceSchema::new(ResourceId::new(), 3)
        .with_object_class(account.clone())
        .with_object_type(account);
    let type_id = ObjectTypeIdentification::new(ShadowKind::Account, "default");

    assert!(schema.find_object_type(&type_id).is_some());
    assert!(schema.find_object_class("inetOrgPerson").is_some());
    assert!(schema
        .find_definition_required("groupOfNames", None)
        .is_err());
}

#[test]
fn test_schema_cache_builds_once() {
    let cache = ResourceSchemaCache::new();
    let resource_id = ResourceId::new();
    let builds = AtomicUsize::new(0);
    let build = || {
        builds.fetch_add(1, Ordering::SeqCst);
        Ok(ResourceSchema::new(resource_id, 1).with_object_class(account_type()))
    };

    let first = cache.get_or_build(resource_id, 1, &build).unwrap();
    let second = cache.get_or_build(resource_id, 1, &build).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    cache.invalidate(resource_id);
    assert!(cache.get(resource_id, 1).is_none());
}

#[test]
fn test_failed_build_is_retried() {
    let cache = ResourceSchemaCache::new();
    let resource_id = ResourceId::new();

    let err = cache
        .get_or_build(resource_id, 1, || Err(ResourceError::schema("broken")))
        .unwrap_err();
    assert_eq!(err.error_code(), "SCHEMA_ERROR");

    let schema = cache
        .get_or_build(resource_id, 1, || Ok(ResourceSchema::new(resource_id, 1)))
        .unwrap();
    assert_eq!(schema.version(), 1);
}

// =============================================================================
// Capabilities
// =============================================================================

#[test]
fn test_capabilities_from_json() {
    let capabilities: Capabilities = serde_json::from_value(json!({
        "update": false,
        "liveSync": true
    }))
    .unwrap();

    assert!(capabilities.can_read());
    assert!(capabilities.create);
    assert!(!capabilities.update);
    assert!(capabilities.live_sync);
    assert!(!capabilities.async_update);
}
