//! Resource schema and the process-wide schema cache.

use moka::sync::Cache;
use std::sync::Arc;
use tracing::debug;

use super::association::ObjectTypeIdentification;
use super::object::ResourceObjectDefinition;
use crate::error::{ResourceError, ResourceResult};
use crate::ids::ResourceId;

/// Complete schema of one resource version.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    resource_id: ResourceId,
    version: u64,
    object_classes: Vec<ResourceObjectDefinition>,
    object_types: Vec<ResourceObjectDefinition>,
}

impl ResourceSchema {
    pub fn new(resource_id: ResourceId, version: u64) -> Self {
        Self {
            resource_id,
            version,
            object_classes: Vec::new(),
            object_types: Vec::new(),
        }
    }

    /// Add a raw object class definition.
    #[must_use]
    pub fn with_object_class(mut self, definition: ResourceObjectDefinition) -> Self {
        self.object_classes.push(definition);
        self
    }

    /// Add an object type (kind/intent) definition.
    #[must_use]
    pub fn with_object_type(mut self, definition: ResourceObjectDefinition) -> Self {
        self.object_types.push(definition);
        self
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn object_classes(&self) -> &[ResourceObjectDefinition] {
        &self.object_classes
    }

    pub fn object_types(&self) -> &[ResourceObjectDefinition] {
        &self.object_types
    }

    pub fn find_object_class(&self, name: &str) -> Option<&ResourceObjectDefinition> {
        self.object_classes
            .iter()
            .find(|d| d.object_class_name() == name)
    }

    pub fn find_object_type(&self, type_id: &ObjectTypeIdentification) -> Option<&ResourceObjectDefinition> {
        self.object_types
            .iter()
            .find(|d| d.type_identification() == Some(type_id))
    }

    /// Resolve the most specific definition: the object type when kind/intent
    /// is known and matches the class, else the raw object class.
    pub fn find_definition(
        &self,
        object_class: &str,
        type_id: Option<&ObjectTypeIdentification>,
    ) -> Option<&ResourceObjectDefinition> {
        type_id
            .and_then(|t| self.find_object_type(t))
            .filter(|d| d.object_class_name() == object_class)
            .or_else(|| self.find_object_class(object_class))
    }

    /// Like [`Self::find_definition`], failing with a schema error.
    pub fn find_definition_required(
        &self,
        object_class: &str,
        type_id: Option<&ObjectTypeIdentification>,
    ) -> ResourceResult<&ResourceObjectDefinition> {
        self.find_definition(object_class, type_id).ok_or_else(|| {
            ResourceError::schema(format!(
                "no definition of object class '{}' on resource {}",
                object_class, self.resource_id
            ))
        })
    }
}

/// Upper bound on cached schema versions.
const DEFAULT_MAX_CAPACITY: u64 = 1_000;

/// Compute-once cache of parsed resource schemas keyed by resource and version.
///
/// Lookups of an already built schema only clone an `Arc`. Concurrent first
/// accesses to one key are coalesced into a single build; a failed build is
/// not cached, so the next caller retries.
pub struct ResourceSchemaCache {
    cache: Cache<(ResourceId, u64), Arc<ResourceSchema>>,
}

impl ResourceSchemaCache {
    pub fn new() -> Self {
        Self::with_max_capacity(DEFAULT_MAX_CAPACITY)
    }

    pub fn with_max_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_capacity).build();
        Self { cache }
    }

    /// Get the cached schema, building it with `build` on first access.
    pub fn get_or_build<F>(
        &self,
        resource_id: ResourceId,
        version: u64,
        build: F,
    ) -> ResourceResult<Arc<ResourceSchema>>
    where
        F: FnOnce() -> ResourceResult<ResourceSchema>,
    {
        self.cache
            .try_get_with((resource_id, version), || {
                debug!(resource_id = %resource_id, version, "Building resource schema");
                build().map(Arc::new)
            })
            .map_err(ResourceError::from_shared)
    }

    /// Get a built schema without building.
    pub fn get(&self, resource_id: ResourceId, version: u64) -> Option<Arc<ResourceSchema>> {
        self.cache.get(&(resource_id, version))
    }

    /// Drop every cached version of a resource's schema.
    pub fn invalidate(&self, resource_id: ResourceId) {
        let stale: Vec<(ResourceId, u64)> = self
            .cache
            .iter()
            .map(|(key, _)| *key)
            .filter(|(id, _)| *id == resource_id)
            .collect();
        for key in stale {
            self.cache.invalidate(&key);
        }
    }
}

impl Default for ResourceSchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::association::ShadowKind;
    use crate::schema::attribute::AttributeDefinition;
    use crate::schema::native::{AttributeDataType, NativeAttributeDefinition};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schema(resource_id: ResourceId) -> ResourceSchema {
        let cn = AttributeDefinition::from_native(NativeAttributeDefinition::new(
            "cn",
            AttributeDataType::String,
        ));
        let class = ResourceObjectDefinition::builder("inetOrgPerson")
            .attribute(cn.clone())
            .build()
            .unwrap();
        let account = ResourceObjectDefinition::builder("inetOrgPerson")
            .type_identification(ObjectTypeIdentification::new(ShadowKind::Account, "default"))
            .attribute(cn)
            .build()
            .unwrap();
        ResourceSchema::new(resource_id, 1)
            .with_object_class(class)
            .with_object_type(account)
    }

    #[test]
    fn test_find_definition_prefers_object_type() {
        let schema = schema(ResourceId::new());
        let account = ObjectTypeIdentification::new(ShadowKind::Account, "default");
        let def = schema
            .find_definition("inetOrgPerson", Some(&account))
            .unwrap();
        assert_eq!(def.type_identification(), Some(&account));

        let raw = schema.find_definition("inetOrgPerson", None).unwrap();
        assert!(raw.type_identification().is_none());

        assert!(schema.find_definition_required("posixGroup", None).is_err());
    }

    #[test]
    fn test_cache_builds_once() {
        let cache = ResourceSchemaCache::new();
        let resource_id = ResourceId::new();
        let builds = AtomicUsize::new(0);

        for _ in 0..3 {
            let s = cache
                .get_or_build(resource_id, 1, || {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(schema(resource_id))
                })
                .unwrap();
            assert_eq!(s.version(), 1);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(cache.get(resource_id, 1).is_some());
        assert!(cache.get(resource_id, 2).is_none());
    }

    #[test]
    fn test_failed_build_is_retried() {
        let cache = ResourceSchemaCache::new();
        let resource_id = ResourceId::new();

        let err = cache
            .get_or_build(resource_id, 1, || Err(ResourceError::schema("broken")))
            .unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_ERROR");

        let ok = cache.get_or_build(resource_id, 1, || Ok(schema(resource_id)));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_invalidate() {
        let cache = ResourceSchemaCache::new();
        let resource_id = ResourceId::new();
        cache
            .get_or_build(resource_id, 1, || Ok(schema(resource_id)))
            .unwrap();
        cache.invalidate(resource_id);
        assert!(cache.get(resource_id, 1).is_none());
    }

    #[test]
    fn test_invalidate_keeps_other_resources() {
        let cache = ResourceSchemaCache::new();
        let stale = ResourceId::new();
        let other = ResourceId::new();
        for version in [1, 2] {
            cache
                .get_or_build(stale, version, || Ok(schema(stale)))
                .unwrap();
        }
        cache.get_or_build(other, 1, || Ok(schema(other))).unwrap();

        cache.invalidate(stale);

        assert!(cache.get(stale, 1).is_none());
        assert!(cache.get(stale, 2).is_none());
        assert!(cache.get(other, 1).is_some());
    }

    #[test]
    fn test_failed_build_keeps_error_kind() {
        let cache = ResourceSchemaCache::new();
        let err = cache
            .get_or_build(ResourceId::new(), 1, || {
                Err(ResourceError::configuration("invalid value pattern"))
            })
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_concurrent_first_access_builds_once() {
        let cache = Arc::new(ResourceSchemaCache::new());
        let resource_id = ResourceId::new();
        let builds = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let builds = Arc::clone(&builds);
                std::thread::spawn(move || {
                    cache
                        .get_or_build(resource_id, 7, || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            Ok(schema(resource_id))
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
