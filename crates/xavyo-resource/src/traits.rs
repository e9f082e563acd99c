//! Connector capability traits
//!
//! A connector implements [`Connector`] plus the operation traits it supports.
//! Optional capabilities that the converter discovers at runtime (live sync,
//! asynchronous updates, operation status) are exposed through accessor
//! methods on [`Connector`] returning trait objects.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ConnectorResult;
use crate::ids::ConnectorInstanceId;
use crate::operation::{
    AttributeDelta, AttributeSet, ConnectorObject, ConnectorOutcome, Filter, LiveSyncBatch,
    PageRequest, PendingOperationStatus, SearchResult, SyncChange, SyncToken, Uid,
};

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Identity of this connector instance.
    ///
    /// Reads and writes through instances with different identities may observe
    /// different states of the same resource.
    fn instance_id(&self) -> ConnectorInstanceId;

    fn display_name(&self) -> &str;

    async fn test_connection(&self) -> ConnectorResult<()>;

    /// Live synchronization support, if any.
    fn live_sync(&self) -> Option<&dyn LiveSyncOp> {
        None
    }

    /// Asynchronous update support, if any.
    fn async_update(&self) -> Option<&dyn AsyncUpdateOp> {
        None
    }

    /// Asynchronous operation status support, if any.
    fn operation_status(&self) -> Option<&dyn OperationStatusOp> {
        None
    }
}

#[async_trait]
pub trait CreateOp: Connector {
    async fn create(
        &self,
        object_class: &str,
        auxiliary_object_classes: &[String],
        attributes: AttributeSet,
    ) -> ConnectorResult<ConnectorOutcome<Uid>>;
}

#[async_trait]
pub trait UpdateOp: Connector {
    /// Apply changes; returns the possibly changed UID (renames).
    async fn update(
        &self,
        object_class: &str,
        uid: &Uid,
        changes: AttributeDelta,
    ) -> ConnectorResult<ConnectorOutcome<Uid>>;
}

#[async_trait]
pub trait DeleteOp: Connector {
    async fn delete(&self, object_class: &str, uid: &Uid) -> ConnectorResult<ConnectorOutcome<()>>;
}

#[async_trait]
pub trait SearchOp: Connector {
    async fn search(
        &self,
        object_class: &str,
        filter: Option<Filter>,
        attributes_to_get: Option<Vec<String>>,
        page_request: Option<PageRequest>,
    ) -> ConnectorResult<SearchResult>;

    /// Fetch one object by UID.
    async fn get(
        &self,
        object_class: &str,
        uid: &Uid,
        attributes_to_get: Option<Vec<String>>,
    ) -> ConnectorResult<Option<ConnectorObject>> {
        let filter = Filter::eq(uid.attribute_name(), uid.value());
        let result = self
            .search(object_class, Some(filter), attributes_to_get, None)
            .await?;
        Ok(result.objects.into_iter().next())
    }
}

/// All CRUD operations.
pub trait FullConnector: CreateOp + UpdateOp + DeleteOp + SearchOp {}

impl<T> FullConnector for T where T: CreateOp + UpdateOp + DeleteOp + SearchOp {}

/// Live synchronization: polling for changes since a token.
#[async_trait]
pub trait LiveSyncOp: Send + Sync {
    /// Token representing "now"; changes before it are not reported.
    async fn fetch_current_token(&self, object_class: &str) -> ConnectorResult<Option<SyncToken>>;

    /// Fetch up to `batch_size` changes after `token`.
    async fn fetch_changes(
        &self,
        object_class: &str,
        token: Option<&SyncToken>,
        batch_size: u32,
    ) -> ConnectorResult<LiveSyncBatch>;
}

/// Asynchronous updates pushed by the resource (e.g. a message queue).
#[async_trait]
pub trait AsyncUpdateOp: Send + Sync {
    /// Wait up to `wait` for at most `max` changes. An empty result means the
    /// wait elapsed without changes.
    async fn next_updates(&self, max: usize, wait: Duration) -> ConnectorResult<Vec<SyncChange>>;
}

/// Querying the status of operations the connector completes asynchronously.
#[async_trait]
pub trait OperationStatusOp: Send + Sync {
    async fn operation_status(&self, reference: &str) -> ConnectorResult<PendingOperationStatus>;
}
