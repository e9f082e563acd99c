//! Connector operation types
//!
//! Types exchanged with connectors: UIDs, connector objects, attribute deltas,
//! filters, pagination and sync changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::AttributeValue;

/// Unique identifier for an object in a target system.
///
/// - LDAP: entryUUID or Distinguished Name
/// - Database: primary key column value
/// - REST: resource ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid {
    /// The attribute name used as the identifier (e.g., "dn", "id", "uid").
    attribute_name: String,
    value: String,
}

impl Uid {
    /// Create a new UID with the given attribute name and value.
    pub fn new(attribute_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            value: value.into(),
        }
    }

    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.attribute_name, self.value)
    }
}

/// Multi-valued attributes of an object, as sent to or received from a connector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSet {
    #[serde(flatten)]
    attributes: BTreeMap<String, Vec<AttributeValue>>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to an attribute.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// Set all values of an attribute.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<AttributeValue>) {
        self.attributes.insert(name.into(), values);
    }

    /// Append a value using builder pattern.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&[AttributeValue]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    /// First string value of an attribute.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name)?.first()?.as_str()
    }

    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<AttributeValue>> {
        self.attributes.remove(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<AttributeValue>)> {
        self.attributes.iter()
    }
}

impl FromIterator<(String, Vec<AttributeValue>)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (String, Vec<AttributeValue>)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for AttributeSet {
    type Item = (String, Vec<AttributeValue>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<AttributeValue>>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.into_iter()
    }
}

/// An object as returned by a connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorObject {
    pub object_class: String,
    pub uid: Uid,
    pub attributes: AttributeSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auxiliary_object_classes: Vec<String>,
}

impl ConnectorObject {
    pub fn new(object_class: impl Into<String>, uid: Uid, attributes: AttributeSet) -> Self {
        Self {
            object_class: object_class.into(),
            uid,
            attributes,
            auxiliary_object_classes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_auxiliary_object_class(mut self, name: impl Into<String>) -> Self {
        self.auxiliary_object_classes.push(name.into());
        self
    }
}

/// Changes to apply to an object during update operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDelta {
    /// Values to add.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, Vec<AttributeValue>>,

    /// Values to remove.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub remove: BTreeMap<String, Vec<AttributeValue>>,

    /// Attributes to replace entirely; an empty list clears the attribute.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub replace: BTreeMap<String, Vec<AttributeValue>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_auxiliary_object_classes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_auxiliary_object_classes: Vec<String>,
}

impl AttributeDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, values: Vec<AttributeValue>) -> &mut Self {
        self.add.entry(name.into()).or_default().extend(values);
        self
    }

    pub fn remove(&mut self, name: impl Into<String>, values: Vec<AttributeValue>) -> &mut Self {
        self.remove.entry(name.into()).or_default().extend(values);
        self
    }

    pub fn replace(&mut self, name: impl Into<String>, values: Vec<AttributeValue>) -> &mut Self {
        self.replace.insert(name.into(), values);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty()
            && self.remove.is_empty()
            && self.replace.is_empty()
            && self.add_auxiliary_object_classes.is_empty()
            && self.remove_auxiliary_object_classes.is_empty()
    }
}

/// Filter for search operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Match objects where attribute equals value.
    Equals {
        attribute: String,
        value: AttributeValue,
    },

    /// Match objects where attribute exists.
    Present { attribute: String },

    And { filters: Vec<Filter> },

    Or { filters: Vec<Filter> },
}

impl Filter {
    /// Create an equals filter.
    pub fn eq(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Filter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn present(attribute: impl Into<String>) -> Self {
        Filter::Present {
            attribute: attribute.into(),
        }
    }

    /// Combine this filter with another using AND.
    #[must_use]
    pub fn and_with(self, other: Filter) -> Self {
        match self {
            Filter::And { mut filters } => {
                filters.push(other);
                Filter::And { filters }
            }
            _ => Filter::And {
                filters: vec![self, other],
            },
        }
    }

    /// Combine this filter with another using OR.
    #[must_use]
    pub fn or_with(self, other: Filter) -> Self {
        match self {
            Filter::Or { mut filters } => {
                filters.push(other);
                Filter::Or { filters }
            }
            _ => Filter::Or {
                filters: vec![self, other],
            },
        }
    }

    /// Evaluate against an attribute set. Used by in-memory connectors.
    pub fn matches(&self, attributes: &AttributeSet) -> bool {
        match self {
            Filter::Equals { attribute, value } => attributes
                .get(attribute)
                .is_some_and(|values| values.contains(value)),
            Filter::Present { attribute } => {
                attributes.get(attribute).is_some_and(|v| !v.is_empty())
            }
            Filter::And { filters } => filters.iter().all(|f| f.matches(attributes)),
            Filter::Or { filters } => filters.iter().any(|f| f.matches(attributes)),
        }
    }
}

/// Pagination request for search operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default)]
    pub offset: u32,

    pub page_size: u32,

    /// Opaque cursor for cursor-based pagination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl PageRequest {
    pub fn new(page_size: u32) -> Self {
        Self {
            offset: 0,
            page_size,
            cursor: None,
        }
    }

    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Result of a search operation.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub objects: Vec<ConnectorObject>,

    /// Total number of matching objects (if known).
    pub total_count: Option<u64>,

    /// Cursor for the next page (if more results available).
    pub next_cursor: Option<String>,

    /// Whether the connector stopped before returning every match.
    pub partial: bool,
}

impl SearchResult {
    pub fn new(objects: Vec<ConnectorObject>) -> Self {
        Self {
            objects,
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_total_count(mut self, count: u64) -> Self {
        self.total_count = Some(count);
        self
    }

    #[must_use]
    pub fn with_next_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.next_cursor = Some(cursor.into());
        self
    }
}

/// Outcome of a connector write.
///
/// A connector that completes the operation asynchronously returns a pending
/// reference that can later be passed to operation status queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorOutcome<T> {
    pub value: T,
    pub pending_reference: Option<String>,
}

impl<T> ConnectorOutcome<T> {
    /// Operation finished.
    pub fn done(value: T) -> Self {
        Self {
            value,
            pending_reference: None,
        }
    }

    /// Operation accepted, completion pending.
    pub fn pending(value: T, reference: impl Into<String>) -> Self {
        Self {
            value,
            pending_reference: Some(reference.into()),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending_reference.is_some()
    }
}

/// Opaque synchronization state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncToken(String);

impl SyncToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SyncToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type of change detected on the target system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncChangeType {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for SyncChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncChangeType::Create => write!(f, "create"),
            SyncChangeType::Update => write!(f, "update"),
            SyncChangeType::Delete => write!(f, "delete"),
        }
    }
}

/// A change detected in the target system.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncChange {
    pub uid: Uid,
    pub change_type: SyncChangeType,
    pub object_class: String,
    /// Current state of the object; absent for deletions and for connectors
    /// that report identifiers only.
    pub object: Option<ConnectorObject>,
    /// Token to resume from once this change is processed.
    pub token: Option<SyncToken>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl SyncChange {
    pub fn created(object: ConnectorObject) -> Self {
        Self {
            uid: object.uid.clone(),
            change_type: SyncChangeType::Create,
            object_class: object.object_class.clone(),
            object: Some(object),
            token: None,
            timestamp: None,
        }
    }

    pub fn updated(object: ConnectorObject) -> Self {
        Self {
            change_type: SyncChangeType::Update,
            ..Self::created(object)
        }
    }

    pub fn deleted(uid: Uid, object_class: impl Into<String>) -> Self {
        Self {
            uid,
            change_type: SyncChangeType::Delete,
            object_class: object_class.into(),
            object: None,
            token: None,
            timestamp: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: SyncToken) -> Self {
        self.token = Some(token);
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// One batch of live-sync changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSyncBatch {
    pub changes: Vec<SyncChange>,
    /// Token after the whole batch; `None` if unchanged.
    pub new_token: Option<SyncToken>,
    pub has_more: bool,
}

/// Status of an asynchronously executing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOperationStatus {
    InProgress,
    Succeeded,
    Failed { message: String },
}
