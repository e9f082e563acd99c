//! Resource capabilities
//!
//! What a resource is configured to support. The converter checks these
//! before calling the corresponding connector operation.

use serde::{Deserialize, Serialize};

/// Read capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadCapability {
    /// Reads are served from the shadow cache only; the resource is never
    /// contacted for reads.
    #[serde(default)]
    pub cache_only: bool,
}

/// Capability set of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(default = "default_read")]
    pub read: Option<ReadCapability>,

    #[serde(default = "default_true")]
    pub create: bool,

    #[serde(default = "default_true")]
    pub update: bool,

    #[serde(default = "default_true")]
    pub delete: bool,

    #[serde(default)]
    pub live_sync: bool,

    #[serde(default)]
    pub async_update: bool,

    /// Asynchronous operation status can be queried.
    #[serde(default)]
    pub async_operation_status: bool,
}

fn default_true() -> bool {
    true
}

fn default_read() -> Option<ReadCapability> {
    Some(ReadCapability::default())
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            read: default_read(),
            create: true,
            update: true,
            delete: true,
            live_sync: false,
            async_update: false,
            async_operation_status: false,
        }
    }
}

impl Capabilities {
    pub fn can_read(&self) -> bool {
        self.read.is_some()
    }

    /// Reads are configured but must be served from cache.
    pub fn is_read_cache_only(&self) -> bool {
        self.read.is_some_and(|r| r.cache_only)
    }

    #[must_use]
    pub fn with_live_sync(mut self) -> Self {
        self.live_sync = true;
        self
    }

    #[must_use]
    pub fn with_async_update(mut self) -> Self {
        self.async_update = true;
        self
    }

    #[must_use]
    pub fn with_async_operation_status(mut self) -> Self {
        self.async_operation_status = true;
        self
    }

    #[must_use]
    pub fn cache_only_read(mut self) -> Self {
        self.read = Some(ReadCapability { cache_only: true });
        self
    }
}
