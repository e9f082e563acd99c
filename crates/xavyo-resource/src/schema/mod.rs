//! Attribute and object definition model
//!
//! Definitions merge what the connector reports ([`NativeAttributeDefinition`])
//! with administrator customization ([`AttributeCustomization`]). They are
//! immutable; layer variants share both sources.

pub mod association;
pub mod attribute;
pub mod customization;
pub mod layer;
pub mod native;
pub mod object;
pub mod patterns;
pub mod resource;

pub use association::{
    AssociationDefinition, AssociationDirection, AssociationParticipantType,
    ObjectTypeIdentification, ShadowKind,
};
pub use attribute::{AttributeDefinition, DefinitionKind};
pub use customization::{AttributeCustomization, CorrelatorHint, FetchStrategy};
pub use layer::{ExecutionMode, LayerType, LifecycleState, PropertyAccess, PropertyLimitations};
pub use native::{AttributeDataType, NativeAttributeDefinition};
pub use object::{ResourceObjectDefinition, ResourceObjectDefinitionBuilder};
pub use patterns::ValuePatterns;
pub use resource::{ResourceSchema, ResourceSchemaCache};
