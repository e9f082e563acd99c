//! Provisioning configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How search errors on individual objects are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReportingMode {
    /// Abort the search on the first bad object.
    #[default]
    FailFast,
    /// Skip bad objects, record their errors and continue.
    ContinueAndCollect,
    /// Hand bad objects to the handler flagged with their error.
    ReportAsFetchError,
}

impl ErrorReportingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReportingMode::FailFast => "fail_fast",
            ErrorReportingMode::ContinueAndCollect => "continue_and_collect",
            ErrorReportingMode::ReportAsFetchError => "report_as_fetch_error",
        }
    }
}

impl std::fmt::Display for ErrorReportingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ErrorReportingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail_fast" => Ok(ErrorReportingMode::FailFast),
            "continue_and_collect" => Ok(ErrorReportingMode::ContinueAndCollect),
            "report_as_fetch_error" => Ok(ErrorReportingMode::ReportAsFetchError),
            _ => Err(format!("Unknown error reporting mode: {s}")),
        }
    }
}

/// Consistency checking applied to shadows and definitions.
///
/// Thorough checks are meant for tests and debugging. Reconciliation only
/// validates the current shadow when they are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyChecks {
    /// Full structural validation of attributes and associations.
    pub thorough: bool,

    /// Accept shadows without a resource reference.
    pub allow_missing_resource_ref: bool,
}

impl ConsistencyChecks {
    /// Checks used in tests.
    pub fn thorough() -> Self {
        Self {
            thorough: true,
            allow_missing_resource_ref: false,
        }
    }
}

/// Provisioning configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    #[serde(default)]
    pub consistency_checks: ConsistencyChecks,

    #[serde(default)]
    pub search_error_reporting: ErrorReportingMode,

    /// Objects requested per search page.
    #[serde(default = "default_search_page_size")]
    pub search_page_size: u32,

    /// Maximum changes fetched per live-sync batch.
    #[serde(default = "default_live_sync_batch_size")]
    pub live_sync_batch_size: u32,

    /// How long one asynchronous update poll waits for changes.
    #[serde(default = "default_async_update_poll_interval_ms")]
    pub async_update_poll_interval_ms: u64,

    /// Listener stops after this many consecutive connector failures.
    #[serde(default = "default_max_consecutive_listener_errors")]
    pub max_consecutive_listener_errors: u32,
}

fn default_search_page_size() -> u32 {
    100
}

fn default_live_sync_batch_size() -> u32 {
    100
}

fn default_async_update_poll_interval_ms() -> u64 {
    1000
}

fn default_max_consecutive_listener_errors() -> u32 {
    5
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            consistency_checks: ConsistencyChecks::default(),
            search_error_reporting: ErrorReportingMode::default(),
            search_page_size: default_search_page_size(),
            live_sync_batch_size: default_live_sync_batch_size(),
            async_update_poll_interval_ms: default_async_update_poll_interval_ms(),
            max_consecutive_listener_errors: default_max_consecutive_listener_errors(),
        }
    }
}

impl ProvisioningConfig {
    /// Get the async update poll interval as a Duration.
    pub fn async_update_poll_interval(&self) -> Duration {
        Duration::from_millis(self.async_update_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: ProvisioningConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(config, ProvisioningConfig::default());
        assert_eq!(config.live_sync_batch_size, 100);
        assert_eq!(config.async_update_poll_interval(), Duration::from_secs(1));
        assert!(!config.consistency_checks.thorough);
    }

    #[test]
    fn test_partial_json() {
        let config: ProvisioningConfig = serde_json::from_value(serde_json::json!({
            "consistency_checks": { "thorough": true },
            "search_error_reporting": "continue_and_collect",
            "live_sync_batch_size": 10
        }))
        .unwrap();

        assert!(config.consistency_checks.thorough);
        assert!(!config.consistency_checks.allow_missing_resource_ref);
        assert_eq!(
            config.search_error_reporting,
            ErrorReportingMode::ContinueAndCollect
        );
        assert_eq!(config.live_sync_batch_size, 10);
        assert_eq!(config.max_consecutive_listener_errors, 5);
    }

    #[test]
    fn test_reporting_mode_parse() {
        assert_eq!(
            "report_as_fetch_error".parse::<ErrorReportingMode>().unwrap(),
            ErrorReportingMode::ReportAsFetchError
        );
        assert!("ignore".parse::<ErrorReportingMode>().is_err());
    }
}
