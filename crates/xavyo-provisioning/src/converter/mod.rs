//! # Resource Object Converter
//!
//! Facade over the connector for one object class or object type. Every
//! operation takes a [`ProvisioningContext`] and an [`OperationResult`] to
//! record into; connector faults are translated into typed
//! [`ResourceError`]s and no raw connector type leaves this module.
//!
//! ## Operations
//!
//! - Reading: [`ResourceObjectConverter::get_resource_object`],
//!   [`ResourceObjectConverter::locate_resource_object`],
//!   [`ResourceObjectConverter::search_resource_objects`]
//! - Writing: [`ResourceObjectConverter::add_resource_object`],
//!   [`ResourceObjectConverter::modify_resource_object`],
//!   [`ResourceObjectConverter::delete_resource_object`]
//! - Changes: [`ResourceObjectConverter::fetch_current_token`],
//!   [`ResourceObjectConverter::fetch_changes`],
//!   [`ResourceObjectConverter::listen_for_asynchronous_updates`]
//! - [`ResourceObjectConverter::refresh_operation_status`]

mod changes;
pub(crate) mod conversion;
mod read;
pub mod types;
mod write;

use std::sync::Arc;

use xavyo_resource::capabilities::Capabilities;
use xavyo_resource::error::ResourceError;
use xavyo_resource::ids::ResourceId;
use xavyo_resource::schema::{ResourceObjectDefinition, ResourceSchema};
use xavyo_resource::traits::{Connector, FullConnector};

use crate::config::ProvisioningConfig;
use crate::result::{OperationResult, OperationResultStatus};

pub use types::{
    AsynchronousOperationResult, CompleteResourceObject, FetchErrorState, LiveSyncProgress,
    ResourceObjectChange, SearchResultMetadata,
};

/// Name of sub-results recording changes of entitlement objects.
pub const MODIFY_ENTITLEMENT: &str = "modifyEntitlement";

/// What the converter operates on: one resource, one object definition and
/// the connectors serving them.
#[derive(Clone)]
pub struct ProvisioningContext {
    resource_id: ResourceId,
    schema: Arc<ResourceSchema>,
    definition: ResourceObjectDefinition,
    capabilities: Capabilities,
    connector: Arc<dyn FullConnector>,
    read_connector: Option<Arc<dyn FullConnector>>,
}

impl ProvisioningContext {
    pub fn new(
        schema: Arc<ResourceSchema>,
        definition: ResourceObjectDefinition,
        connector: Arc<dyn FullConnector>,
    ) -> Self {
        Self {
            resource_id: schema.resource_id(),
            schema,
            definition,
            capabilities: Capabilities::default(),
            connector,
            read_connector: None,
        }
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Use a separate connector instance for reads.
    #[must_use]
    pub fn with_read_connector(mut self, connector: Arc<dyn FullConnector>) -> Self {
        self.read_connector = Some(connector);
        self
    }

    /// The same context for another object definition of the resource.
    #[must_use]
    pub fn for_definition(&self, definition: ResourceObjectDefinition) -> Self {
        Self {
            definition,
            ..self.clone()
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub fn definition(&self) -> &ResourceObjectDefinition {
        &self.definition
    }

    pub fn object_class(&self) -> &str {
        self.definition.object_class_name()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn connector(&self) -> &dyn FullConnector {
        self.connector.as_ref()
    }

    pub fn read_connector(&self) -> &dyn FullConnector {
        self.read_connector
            .as_deref()
            .unwrap_or_else(|| self.connector.as_ref())
    }

    /// Writes and reads go through different connector instances, so a read
    /// right after a write may not observe it.
    pub fn is_quantum(&self) -> bool {
        self.read_connector
            .as_ref()
            .is_some_and(|r| r.instance_id() != self.connector.instance_id())
    }
}

impl std::fmt::Debug for ProvisioningContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningContext")
            .field("resource_id", &self.resource_id)
            .field("definition", &self.definition)
            .field("connector", &self.connector.display_name())
            .finish_non_exhaustive()
    }
}

/// Converter between shadows and connector operations.
#[derive(Debug, Clone, Default)]
pub struct ResourceObjectConverter {
    config: ProvisioningConfig,
}

impl ResourceObjectConverter {
    pub fn new(config: ProvisioningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }
}

/// Roll up the sub-results of a composite write.
///
/// A failed entitlement change degrades the result to partial error; any
/// other failure is fatal; pending completion makes the result in progress
/// and carries the async reference. Otherwise the usual roll-up applies.
pub fn compute_result_status(result: &mut OperationResult) {
    let mut fatal = None;
    let mut partial = None;
    let mut in_progress = None;
    for sub in result.subresults() {
        if sub.status().is_error() {
            if sub.operation() == MODIFY_ENTITLEMENT {
                partial.get_or_insert_with(|| sub.message().map(str::to_string));
            } else {
                fatal.get_or_insert_with(|| sub.message().map(str::to_string));
            }
        } else if sub.is_in_progress() {
            in_progress.get_or_insert_with(|| sub.async_reference().map(str::to_string));
        }
    }

    if let Some(message) = fatal {
        result.set_status(OperationResultStatus::FatalError);
        if let Some(message) = message {
            result.set_message(message);
        }
    } else if let Some(message) = partial {
        result.set_status(OperationResultStatus::PartialError);
        if let Some(message) = message {
            result.set_message(message);
        }
    } else if let Some(reference) = in_progress {
        result.record_in_progress(reference);
    } else {
        result.compute_status();
    }
}

/// Record a fatal error in `result` and hand the error back for rethrowing.
pub(crate) fn record_fatal(result: &mut OperationResult, error: ResourceError) -> ResourceError {
    tracing::error!(
        operation = %result.operation(),
        error_code = error.error_code(),
        error = %error,
        "Operation failed"
    );
    result.record_fatal_error(&error);
    error
}
