//! # Provisioning Engine
//!
//! Shadow cache model, reconciliation and resource object conversion for
//! xavyo provisioning.
//!
//! This crate provides:
//! - Shadows: local views of resource objects bound to their definitions
//! - Projections: one resource object of a synchronization run, with the
//!   squeezed should-be values computed by mappings
//! - Reconciliation: secondary deltas that bring real values in line with
//!   should-be values, honoring tolerance and mapping strength
//! - Resource object conversion: the typed facade over connectors
//! - Change listeners for live synchronization and asynchronous updates
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │   Projection    │────►│ Reconciliation │────►│ Secondary delta  │
//! │ (squeezed vals) │     │     Engine     │     │                  │
//! └────────┬────────┘     └────────────────┘     └────────┬─────────┘
//!          │ current shadow                               │
//!          │                                              ▼
//! ┌────────┴────────┐     ┌────────────────┐     ┌──────────────────┐
//! │ Change Listener │◄────│ Resource Object│◄────│    Connector     │
//! │                 │     │   Converter    │────►│                  │
//! └─────────────────┘     └────────────────┘     └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use xavyo_provisioning::prelude::*;
//!
//! let engine = ReconciliationEngine::new(schema);
//! let outcome = engine.reconcile(&mut projection).await?;
//! if outcome.has_changes() {
//!     let delta = projection.take_secondary_delta();
//!     converter.modify_resource_object(&ctx, &shadow, &delta, &mut result).await?;
//! }
//! ```

pub mod config;
pub mod converter;
pub mod correlation;
pub mod listener;
pub mod projection;
pub mod reconciliation;
pub mod result;
pub mod shadow;
pub mod squeeze;

pub use config::{ConsistencyChecks, ErrorReportingMode, ProvisioningConfig};
pub use converter::{
    compute_result_status, AsynchronousOperationResult, CompleteResourceObject, FetchErrorState,
    LiveSyncProgress, ProvisioningContext, ResourceObjectChange, ResourceObjectConverter,
    SearchResultMetadata,
};
pub use correlation::{
    CorrelationItem, CorrelatorConfiguration, CorrelatorContext, SynchronizationConfiguration,
};
pub use listener::{
    ChangeHandler, ChangeListener, ListenerHandle, ListenerMode, ListenerReport, StopReason,
};
pub use projection::{Projection, SynchronizationPolicyDecision};
pub use reconciliation::{
    AssociationTargetResolver, DeltaCounts, NotApplicableReason, ReconciliationEngine,
    ReconciliationOutcome, ReconciliationStatus,
};
pub use result::{OperationResult, OperationResultStatus};
pub use shadow::{AbstractShadow, ResourceObjectIdentifiers, ShadowBean};
pub use squeeze::{MappingOrigin, MappingStrength, SqueezedTriple, ValueWithOrigin};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{ConsistencyChecks, ErrorReportingMode, ProvisioningConfig};
    pub use crate::converter::{
        AsynchronousOperationResult, CompleteResourceObject, ProvisioningContext,
        ResourceObjectChange, ResourceObjectConverter, SearchResultMetadata,
    };
    pub use crate::listener::{ChangeHandler, ChangeListener, ListenerMode};
    pub use crate::projection::{Projection, SynchronizationPolicyDecision};
    pub use crate::reconciliation::{ReconciliationEngine, ReconciliationOutcome};
    pub use crate::result::{OperationResult, OperationResultStatus};
    pub use crate::shadow::{AbstractShadow, ResourceObjectIdentifiers, ShadowBean};
    pub use crate::squeeze::{MappingOrigin, MappingStrength, SqueezedTriple, ValueWithOrigin};
}
