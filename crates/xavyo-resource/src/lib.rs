//! # Resource Framework
//!
//! Core abstractions describing external target systems ("resources") to the
//! xavyo provisioning engine.
//!
//! ## Architecture
//!
//! - [`schema`] - Attribute and object definitions: native connector metadata
//!   merged with administrator customization, viewed per layer, cached per
//!   resource version
//! - [`item`] - Attributes and association values of resource objects
//! - [`delta`] - Item and object deltas
//! - [`traits`] - Capability-based connector traits
//! - [`operation`] - Types exchanged with connectors
//! - [`error`] - Connector faults and the typed resource error taxonomy
//!
//! ## Example
//!
//! ```ignore
//! use xavyo_resource::prelude::*;
//!
//! let account = ResourceObjectDefinition::builder("inetOrgPerson")
//!     .attribute(AttributeDefinition::from_native(
//!         NativeAttributeDefinition::new("uid", AttributeDataType::String),
//!     ))
//!     .primary_identifier("uid")
//!     .build()?;
//!
//! let uid = account.instantiate_attribute("uid", vec!["jack".into()])?;
//! ```

pub mod capabilities;
pub mod delta;
pub mod error;
pub mod ids;
pub mod item;
pub mod matching;
pub mod operation;
pub mod schema;
pub mod traits;
pub mod value;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::capabilities::{Capabilities, ReadCapability};
    pub use crate::delta::{ChangeType, DeltaOrigin, ItemDelta, ItemModification, ObjectDelta};
    pub use crate::error::{ConnectorFault, ConnectorResult, ResourceError, ResourceResult};
    pub use crate::ids::{ConnectorInstanceId, ResourceId, ShadowId};
    pub use crate::item::{AssociationValue, Attribute, ShadowReference};
    pub use crate::matching::MatchingRule;
    pub use crate::operation::{
        AttributeDelta, AttributeSet, ConnectorObject, ConnectorOutcome, Filter, LiveSyncBatch,
        PageRequest, PendingOperationStatus, SearchResult, SyncChange, SyncChangeType, SyncToken,
        Uid,
    };
    pub use crate::schema::{
        AssociationDefinition, AssociationDirection, AssociationParticipantType,
        AttributeCustomization, AttributeDataType, AttributeDefinition, DefinitionKind,
        ExecutionMode, LayerType, NativeAttributeDefinition, ObjectTypeIdentification,
        ResourceObjectDefinition, ResourceSchema, ResourceSchemaCache, ShadowKind,
    };
    pub use crate::traits::{
        AsyncUpdateOp, Connector, CreateOp, DeleteOp, FullConnector, LiveSyncOp,
        OperationStatusOp, SearchOp, UpdateOp,
    };
    pub use crate::value::AttributeValue;
}

// Re-export async_trait for connector implementations
pub use async_trait::async_trait;
