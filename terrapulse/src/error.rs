//! Task-visible error taxonomy.
//!
//! Every failed task carries an [`ErrorKind`] plus a human-readable message.
//! The kind tells a client whether resubmission can help; internal detail
//! such as upstream response bodies or stack traces stays in the logs and
//! never reaches a task record. Credential values must never appear in a
//! message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed request, rejected before a task was created
    Validation,
    /// Upstream had no usable pixels or cloud-free scene; resubmitting with
    /// different parameters may succeed
    NoDataAvailable,
    /// Network error, timeout, or 5xx from an upstream; resubmitting the
    /// same request later may succeed
    TransientUpstream,
    /// Misconfigured upstream credentials; an operator must fix the
    /// configuration, retrying cannot help
    AuthFailure,
    /// Task was cancelled before it finished
    Cancelled,
    /// Unexpected failure caught at the worker boundary
    Internal,
}

impl ErrorKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NoDataAvailable => "no_data_available",
            Self::TransientUpstream => "transient_upstream",
            Self::AuthFailure => "auth_failure",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }

    /// Returns true when resubmitting the identical request later is a
    /// reasonable recovery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientUpstream)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The error recorded on a failed task: kind plus client-safe message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct TaskFailure {
    /// Failure classification
    pub kind: ErrorKind,
    /// Human-readable description, free of secrets and stack detail
    pub message: String,
}

impl TaskFailure {
    /// Creates a failure with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates an internal failure with a generic client-safe message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::NoDataAvailable).unwrap(),
            "\"no_data_available\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::TransientUpstream).unwrap(),
            "\"transient_upstream\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::AuthFailure).unwrap(),
            "\"auth_failure\""
        );
    }

    #[test]
    fn test_error_kind_retryability() {
        assert!(ErrorKind::TransientUpstream.is_retryable());
        assert!(!ErrorKind::AuthFailure.is_retryable());
        assert!(!ErrorKind::NoDataAvailable.is_retryable());
        assert!(!ErrorKind::Internal.is_retryable());
    }

    #[test]
    fn test_task_failure_display() {
        let failure = TaskFailure::new(ErrorKind::NoDataAvailable, "no cloud-free scene");
        assert_eq!(
            format!("{}", failure),
            "no_data_available: no cloud-free scene"
        );
    }

    #[test]
    fn test_task_failure_json_shape() {
        let failure = TaskFailure::new(ErrorKind::AuthFailure, "credentials rejected");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "auth_failure");
        assert_eq!(json["message"], "credentials rejected");
    }
}
