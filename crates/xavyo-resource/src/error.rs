//! Resource error taxonomy
//!
//! Two layers of errors live here. [`ConnectorFault`] is what a connector
//! implementation reports; it never crosses the provisioning boundary.
//! [`ResourceError`] is the typed taxonomy surfaced to callers, and
//! [`ResourceError::from_fault`] is the single place where one becomes the
//! other.

use std::sync::Arc;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by schema handling, shadows, reconciliation and the
/// resource object converter.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Malformed or missing definitions, multiplicity violations and
    /// ambiguous single-value conflicts.
    #[error("schema error: {message}")]
    Schema { message: String },

    /// Invalid configuration, e.g. an unparseable value pattern or missing
    /// naming-attribute metadata.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Connector or network failure.
    #[error("communication error: {message}")]
    Communication {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Opaque failure reported by the connector.
    #[error("connector error: {message}")]
    GenericConnector {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The object does not exist on the resource (or in the shadow cache).
    #[error("object not found: {identifier}")]
    ObjectNotFound { identifier: String },

    /// The resource refused the operation for security reasons.
    #[error("security violation: {message}")]
    SecurityViolation { message: String },

    /// The resource refused the operation because of a policy.
    #[error("policy violation: {message}")]
    PolicyViolation { message: String },

    /// An object with the same identifiers already exists.
    #[error("object already exists: {identifier}")]
    ObjectAlreadyExists { identifier: String },

    /// A mapping failed to evaluate upstream.
    #[error("expression evaluation failed: {message}")]
    ExpressionEvaluation { message: String },

    /// The resource or connector lacks the capability required.
    #[error("operation not supported: {capability}")]
    Unsupported { capability: String },

    /// Programming error, e.g. a violated internal invariant.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ResourceError {
    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        ResourceError::Schema {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        ResourceError::Configuration {
            message: message.into(),
        }
    }

    /// Create a communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        ResourceError::Communication {
            message: message.into(),
            source: None,
        }
    }

    /// Create a communication error wrapping a lower-level cause.
    pub fn communication_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ResourceError::Communication {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a generic connector error.
    pub fn generic_connector(message: impl Into<String>) -> Self {
        ResourceError::GenericConnector {
            message: message.into(),
            source: None,
        }
    }

    /// Create a generic connector error wrapping a lower-level cause.
    pub fn generic_connector_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ResourceError::GenericConnector {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an object-not-found error.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        ResourceError::ObjectNotFound {
            identifier: identifier.into(),
        }
    }

    /// Create an unsupported-capability error.
    pub fn unsupported(capability: impl Into<String>) -> Self {
        ResourceError::Unsupported {
            capability: capability.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ResourceError::Internal {
            message: message.into(),
        }
    }

    /// Recover an owned error from one shared between concurrent callers.
    ///
    /// The variant and message are kept; a lower-level cause that cannot be
    /// moved out is replaced by the shared error itself.
    pub fn from_shared(shared: Arc<ResourceError>) -> Self {
        let shared = match Arc::try_unwrap(shared) {
            Ok(error) => return error,
            Err(shared) => shared,
        };
        match shared.as_ref() {
            ResourceError::Schema { message } => ResourceError::schema(message.clone()),
            ResourceError::Configuration { message } => {
                ResourceError::configuration(message.clone())
            }
            ResourceError::Communication { message, .. } => ResourceError::Communication {
                message: message.clone(),
                source: Some(Box::new(Arc::clone(&shared))),
            },
            ResourceError::GenericConnector { message, .. } => ResourceError::GenericConnector {
                message: message.clone(),
                source: Some(Box::new(Arc::clone(&shared))),
            },
            ResourceError::ObjectNotFound { identifier } => ResourceError::not_found(identifier.clone()),
            ResourceError::SecurityViolation { message } => ResourceError::SecurityViolation {
                message: message.clone(),
            },
            ResourceError::PolicyViolation { message } => ResourceError::PolicyViolation {
                message: message.clone(),
            },
            ResourceError::ObjectAlreadyExists { identifier } => {
                ResourceError::ObjectAlreadyExists {
                    identifier: identifier.clone(),
                }
            }
            ResourceError::ExpressionEvaluation { message } => {
                ResourceError::ExpressionEvaluation {
                    message: message.clone(),
                }
            }
            ResourceError::Unsupported { capability } => ResourceError::unsupported(capability.clone()),
            ResourceError::Internal { message } => ResourceError::internal(message.clone()),
        }
    }

    /// Translate a connector fault raised while executing `operation`.
    ///
    /// Connection-level faults become [`ResourceError::Communication`],
    /// faults with a direct typed counterpart keep their meaning, and the
    /// rest become [`ResourceError::GenericConnector`].
    pub fn from_fault(fault: ConnectorFault, operation: &str) -> Self {
        match fault {
            ConnectorFault::ObjectAlreadyExists { identifier } => {
                ResourceError::ObjectAlreadyExists { identifier }
            }
            ConnectorFault::ObjectNotFound { identifier } => {
                ResourceError::ObjectNotFound { identifier }
            }
            ConnectorFault::PermissionDenied { message } => ResourceError::SecurityViolation {
                message: format!("{operation}: {message}"),
            },
            ConnectorFault::PolicyViolation { message } => ResourceError::PolicyViolation {
                message: format!("{operation}: {message}"),
            },
            ConnectorFault::InvalidAttributeValue { attribute, message } => {
                ResourceError::schema(format!(
                    "{operation}: invalid value of attribute '{attribute}': {message}"
                ))
            }
            fault if fault.is_transient() => {
                ResourceError::communication_with_source(format!("{operation} failed"), fault)
            }
            fault => {
                ResourceError::generic_connector_with_source(format!("{operation} failed"), fault)
            }
        }
    }

    /// Check if this error is transient and the operation may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, ResourceError::Communication { .. })
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ResourceError::Schema { .. } => "SCHEMA_ERROR",
            ResourceError::Configuration { .. } => "CONFIGURATION_ERROR",
            ResourceError::Communication { .. } => "COMMUNICATION_ERROR",
            ResourceError::GenericConnector { .. } => "GENERIC_CONNECTOR_ERROR",
            ResourceError::ObjectNotFound { .. } => "OBJECT_NOT_FOUND",
            ResourceError::SecurityViolation { .. } => "SECURITY_VIOLATION",
            ResourceError::PolicyViolation { .. } => "POLICY_VIOLATION",
            ResourceError::ObjectAlreadyExists { .. } => "OBJECT_ALREADY_EXISTS",
            ResourceError::ExpressionEvaluation { .. } => "EXPRESSION_EVALUATION_ERROR",
            ResourceError::Unsupported { .. } => "UNSUPPORTED",
            ResourceError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

/// Result type for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Failure reported by a connector implementation.
#[derive(Debug, Error)]
pub enum ConnectorFault {
    /// Failed to establish connection to the target system.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Connection timed out.
    #[error("connection timeout after {timeout_secs} seconds")]
    ConnectionTimeout { timeout_secs: u64 },

    /// Target system is temporarily unavailable.
    #[error("target system unavailable: {message}")]
    TargetUnavailable { message: String },

    /// Network error during communication.
    #[error("network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Object already exists in the target system.
    #[error("object already exists: {identifier}")]
    ObjectAlreadyExists { identifier: String },

    /// Object not found in the target system.
    #[error("object not found: {identifier}")]
    ObjectNotFound { identifier: String },

    /// Insufficient permissions for the operation.
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    /// Operation rejected by a target-side policy or constraint.
    #[error("policy violation: {message}")]
    PolicyViolation { message: String },

    /// Attribute value rejected by the target system.
    #[error("invalid value for attribute '{attribute}': {message}")]
    InvalidAttributeValue { attribute: String, message: String },

    /// Any other failure.
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl ConnectorFault {
    /// Check if this fault is caused by a temporary condition.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorFault::ConnectionFailed { .. }
                | ConnectorFault::ConnectionTimeout { .. }
                | ConnectorFault::TargetUnavailable { .. }
                | ConnectorFault::NetworkError { .. }
        )
    }

    /// Create a connection failed fault.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorFault::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network fault.
    pub fn network(message: impl Into<String>) -> Self {
        ConnectorFault::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failed fault.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        ConnectorFault::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failed fault with source.
    pub fn operation_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorFault::OperationFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for connector calls.
pub type ConnectorResult<T> = Result<T, ConnectorFault>;
