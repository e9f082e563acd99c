//! Shapes returned by the converter.

use chrono::{DateTime, Utc};
use serde::Serialize;

use xavyo_resource::operation::{SyncChangeType, SyncToken, Uid};

use crate::result::OperationResultStatus;
use crate::shadow::{ResourceObjectIdentifiers, ShadowBean};

/// Whether a fetched object was converted cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum FetchErrorState {
    #[default]
    Ok,
    /// Conversion failed; the object carries what could be salvaged.
    Error { message: String },
}

impl FetchErrorState {
    pub fn is_error(&self) -> bool {
        matches!(self, FetchErrorState::Error { .. })
    }
}

/// A resource object read from the connector, with associations resolved
/// when requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteResourceObject {
    pub resource_object: ShadowBean,
    pub error_state: FetchErrorState,
}

impl CompleteResourceObject {
    pub fn ok(resource_object: ShadowBean) -> Self {
        Self {
            resource_object,
            error_state: FetchErrorState::Ok,
        }
    }

    pub fn with_error(resource_object: ShadowBean, message: impl Into<String>) -> Self {
        Self {
            resource_object,
            error_state: FetchErrorState::Error {
                message: message.into(),
            },
        }
    }
}

/// Summary of a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResultMetadata {
    /// Cursor to continue from, when the search stopped before the end.
    pub paging_cookie: Option<String>,
    pub approximate_number_all_results: Option<u64>,
    /// The connector did not return every match.
    pub partial_results: bool,
    /// Objects passed to the handler.
    pub handled: usize,
    /// The handler asked to stop.
    pub stopped_by_handler: bool,
    /// Errors of skipped objects (continue-and-collect mode).
    pub errors: Vec<String>,
}

/// Result of a write that the resource may complete later.
#[derive(Debug, Clone, PartialEq)]
pub struct AsynchronousOperationResult<T> {
    pub return_value: T,
    pub status: OperationResultStatus,
    /// Reference for status queries while in progress.
    pub async_reference: Option<String>,
    /// Reads through the read connector may not see this write yet.
    pub quantum_operation: bool,
}

impl<T> AsynchronousOperationResult<T> {
    pub fn is_in_progress(&self) -> bool {
        self.status == OperationResultStatus::InProgress
    }
}

/// A change on the resource, converted to shadow form.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceObjectChange {
    pub uid: Uid,
    pub change_type: SyncChangeType,
    pub object_class: String,
    /// Identifiers known for the changed object.
    pub identifiers: Option<ResourceObjectIdentifiers>,
    /// Current state; absent for deletions and identifier-only changes.
    pub resource_object: Option<ShadowBean>,
    pub token: Option<SyncToken>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Conversion error; the change is still reported so its token advances.
    pub error: Option<String>,
}

impl ResourceObjectChange {
    pub fn is_delete(&self) -> bool {
        self.change_type == SyncChangeType::Delete
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Progress of one live-sync fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSyncProgress {
    /// Token after the last change handled; resume from here.
    pub token: Option<SyncToken>,
    pub changes_processed: usize,
    /// Every available change was fetched and handled.
    pub all_fetched: bool,
}
