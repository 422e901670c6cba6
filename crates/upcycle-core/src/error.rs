// Error types for flow invocations

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result of one flow invocation.
pub type InvocationResult<T> = std::result::Result<T, FlowError>;

/// Classification of a failed invocation. Every kind is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowErrorKind {
    /// Caller data failed the input contract. Fix the input; do not retry as-is.
    InvalidInput,
    /// The model could not be reached or failed at the transport level. Retry with backoff.
    UpstreamUnavailable,
    /// The model answered but the answer breaks the output contract.
    SchemaViolation,
}

impl fmt::Display for FlowErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidInput => "invalid input",
            Self::UpstreamUnavailable => "upstream unavailable",
            Self::SchemaViolation => "schema violation",
        })
    }
}

/// A failed invocation: which flow, what kind, and a cause safe to show users.
///
/// Raw transport errors are logged where they happen and never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{flow}: {kind}: {message}")]
pub struct FlowError {
    /// Failure class.
    pub kind: FlowErrorKind,
    /// Name of the failing flow.
    pub flow: String,
    /// Human-readable cause.
    pub message: String,
}

impl FlowError {
    /// Creates a flow error.
    pub fn new(kind: FlowErrorKind, flow: &str, message: impl Into<String>) -> Self {
        Self { kind, flow: flow.to_string(), message: message.into() }
    }

    /// Input contract violation.
    pub fn invalid_input(flow: &str, message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::InvalidInput, flow, message)
    }

    /// Model unreachable.
    pub fn upstream_unavailable(flow: &str, message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::UpstreamUnavailable, flow, message)
    }

    /// Reply breaks the output contract.
    pub fn schema_violation(flow: &str, message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::SchemaViolation, flow, message)
    }

    /// Whether a caller may reasonably retry the same request later.
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, FlowErrorKind::UpstreamUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_flow_and_kind() {
        let err = FlowError::schema_violation("identifyMaterialFlow", "missing required field 'material'");
        assert_eq!(
            err.to_string(),
            "identifyMaterialFlow: schema violation: missing required field 'material'"
        );
        assert!(!err.is_retryable());
        assert!(FlowError::upstream_unavailable("f", "down").is_retryable());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let err = FlowError::invalid_input("f", "bad");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "invalid_input");
        assert_eq!(json["flow"], "f");
    }
}
