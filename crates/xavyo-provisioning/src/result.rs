//! Operation results
//!
//! A tree of named operation outcomes. Every provisioning operation records
//! into one; composite operations create sub-results and roll their statuses
//! up with [`OperationResult::compute_status`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use xavyo_resource::error::ResourceError;

/// Status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResultStatus {
    Success,
    /// Succeeded with something worth attention.
    Warning,
    /// An error occurred and was compensated.
    HandledError,
    /// Some parts succeeded, some failed.
    PartialError,
    FatalError,
    /// Completion pending on the resource.
    InProgress,
    /// Nothing to do.
    NotApplicable,
    /// Not yet determined.
    #[default]
    Unknown,
}

impl OperationResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationResultStatus::Success => "success",
            OperationResultStatus::Warning => "warning",
            OperationResultStatus::HandledError => "handled_error",
            OperationResultStatus::PartialError => "partial_error",
            OperationResultStatus::FatalError => "fatal_error",
            OperationResultStatus::InProgress => "in_progress",
            OperationResultStatus::NotApplicable => "not_applicable",
            OperationResultStatus::Unknown => "unknown",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            OperationResultStatus::PartialError | OperationResultStatus::FatalError
        )
    }

    /// Roll-up precedence; higher wins.
    fn severity(&self) -> u8 {
        match self {
            OperationResultStatus::FatalError => 7,
            OperationResultStatus::PartialError => 6,
            OperationResultStatus::InProgress => 5,
            OperationResultStatus::HandledError => 4,
            OperationResultStatus::Warning => 3,
            OperationResultStatus::Unknown => 2,
            OperationResultStatus::Success => 1,
            OperationResultStatus::NotApplicable => 0,
        }
    }
}

impl fmt::Display for OperationResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one (possibly composite) operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    operation: String,
    status: OperationResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    /// Reference for querying an operation still in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    async_reference: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    subresults: Vec<OperationResult>,
}

impl OperationResult {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: OperationResultStatus::Unknown,
            message: None,
            error_code: None,
            async_reference: None,
            params: BTreeMap::new(),
            subresults: Vec::new(),
        }
    }

    /// Open a child result and return it for recording.
    pub fn create_subresult(&mut self, operation: impl Into<String>) -> &mut OperationResult {
        self.subresults.push(OperationResult::new(operation));
        let last = self.subresults.len() - 1;
        &mut self.subresults[last]
    }

    /// Attach a finished child result.
    pub fn add_subresult(&mut self, subresult: OperationResult) {
        self.subresults.push(subresult);
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn add_param(&mut self, name: impl Into<String>, value: impl fmt::Display) {
        self.params.insert(name.into(), value.to_string());
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn status(&self) -> OperationResultStatus {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn async_reference(&self) -> Option<&str> {
        self.async_reference.as_deref()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn subresults(&self) -> &[OperationResult] {
        &self.subresults
    }

    pub fn find_subresult(&self, operation: &str) -> Option<&OperationResult> {
        self.subresults.iter().find(|r| r.operation == operation)
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            OperationResultStatus::Success | OperationResultStatus::Warning
        )
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == OperationResultStatus::InProgress
    }

    /// Whether the status is still undetermined.
    pub fn is_unknown(&self) -> bool {
        self.status == OperationResultStatus::Unknown
    }

    pub fn set_status(&mut self, status: OperationResultStatus) {
        self.status = status;
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn record_success(&mut self) {
        self.status = OperationResultStatus::Success;
    }

    pub fn record_warning(&mut self, message: impl Into<String>) {
        self.status = OperationResultStatus::Warning;
        self.message = Some(message.into());
    }

    pub fn record_handled_error(&mut self, message: impl Into<String>) {
        self.status = OperationResultStatus::HandledError;
        self.message = Some(message.into());
    }

    pub fn record_partial_error(&mut self, message: impl Into<String>) {
        self.status = OperationResultStatus::PartialError;
        self.message = Some(message.into());
    }

    /// Record a fatal error, keeping its classification code.
    pub fn record_fatal_error(&mut self, error: &ResourceError) {
        self.status = OperationResultStatus::FatalError;
        self.message = Some(error.to_string());
        self.error_code = Some(error.error_code().to_string());
    }

    pub fn record_not_applicable(&mut self, message: impl Into<String>) {
        self.status = OperationResultStatus::NotApplicable;
        self.message = Some(message.into());
    }

    pub fn record_in_progress(&mut self, async_reference: Option<String>) {
        self.status = OperationResultStatus::InProgress;
        self.async_reference = async_reference;
    }

    /// Close the result: undetermined statuses become success.
    pub fn close(&mut self) {
        if self.status == OperationResultStatus::Unknown {
            self.status = OperationResultStatus::Success;
        }
    }

    /// Derive this result's status from its children.
    ///
    /// The most severe child status wins (fatal, partial, in progress,
    /// handled, warning, success). Children that were not applicable do not
    /// count; a result whose children were all not applicable is not
    /// applicable itself. An in-progress outcome carries the child's async
    /// reference. Results without children keep their own status.
    pub fn compute_status(&mut self) {
        if self.subresults.is_empty() {
            self.close();
            return;
        }
        let mut worst = OperationResultStatus::NotApplicable;
        for sub in &self.subresults {
            if sub.status.severity() > worst.severity() {
                worst = sub.status;
            }
        }
        self.status = match worst {
            OperationResultStatus::Unknown => OperationResultStatus::Success,
            other => other,
        };
        if self.status == OperationResultStatus::InProgress && self.async_reference.is_none() {
            self.async_reference = self
                .subresults
                .iter()
                .find_map(|s| s.async_reference.clone());
        }
        if self.message.is_none() && self.status.is_error() {
            self.message = self
                .subresults
                .iter()
                .filter(|s| s.status.is_error())
                .find_map(|s| s.message.clone());
        }
    }

    /// Indented multi-line rendering of the tree, for diagnostics.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        self.write_summary(&mut out, 0);
        out
    }

    fn write_summary(&self, out: &mut String, depth: usize) {
        let _ = write!(out, "{:indent$}{}: {}", "", self.operation, self.status, indent = depth * 2);
        if let Some(message) = &self.message {
            let _ = write!(out, " ({message})");
        }
        out.push('\n');
        for sub in &self.subresults {
            sub.write_summary(out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_child_wins() {
        let mut result = OperationResult::new("modify");
        result.create_subresult("connector.update").record_success();
        result
            .create_subresult("script")
            .record_fatal_error(&ResourceError::communication("timeout"));
        result.compute_status();

        assert_eq!(result.status(), OperationResultStatus::FatalError);
        assert!(result.message().unwrap().contains("timeout"));
    }

    #[test]
    fn test_in_progress_carries_reference() {
        let mut result = OperationResult::new("add");
        result
            .create_subresult("connector.create")
            .record_in_progress(Some("ticket-17".to_string()));
        result.compute_status();

        assert!(result.is_in_progress());
        assert_eq!(result.async_reference(), Some("ticket-17"));
    }

    #[test]
    fn test_not_applicable_children_ignored() {
        let mut result = OperationResult::new("refresh");
        result.create_subresult("a").record_not_applicable("no capability");
        result.compute_status();
        assert_eq!(result.status(), OperationResultStatus::NotApplicable);

        result.create_subresult("b").close();
        result.compute_status();
        assert_eq!(result.status(), OperationResultStatus::Success);
    }

    #[test]
    fn test_fatal_error_keeps_code() {
        let mut result = OperationResult::new("get");
        result.record_fatal_error(&ResourceError::not_found("uid=jack"));
        assert_eq!(result.error_code(), Some("OBJECT_NOT_FOUND"));
    }

    #[test]
    fn test_summary_tree() {
        let mut result = OperationResult::new("modify");
        result.create_subresult("connector.update").record_success();
        result.compute_status();

        assert_eq!(result.summary(), "modify: success\n  connector.update: success\n");
    }
}
