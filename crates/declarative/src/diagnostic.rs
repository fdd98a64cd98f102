//! Diagnostic translation
//!
//! Remote failures are mapped into a uniform taxonomy so callers can decide
//! between retrying, abandoning, and surfacing a problem to the operator.
//! This module is the only place that inspects raw [`RemoteError`]s.

use crate::store::RemoteError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Desired state does not match its schema
    SchemaViolation,
    /// Declared references form a cycle
    CyclicDependency,
    /// A reference names nothing in the batch or in known state
    DependencyUnresolved,
    /// A dependency of this instance failed earlier in the batch
    DependencyFailed,
    /// The remote entity does not exist
    NotFound,
    /// A previously created entity disappeared
    Vanished,
    /// Credentials were rejected
    AuthFailure,
    /// Network or timeout failure worth retrying
    Transient,
    /// The remote side rejected the change due to a concurrent modification
    Conflict,
    /// The remote side rejected the request as invalid
    BadRequest,
    /// The call was cancelled or ran past its deadline
    Cancelled,
    /// The kind does not support the requested operation
    Unsupported,
    /// Not attempted because an earlier failure ended the batch
    Aborted,
    /// Any other remote failure
    Remote,
}

impl DiagnosticKind {
    /// Whether the failure may succeed if simply tried again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Whether the failure ends the whole batch
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SchemaViolation
                | Self::CyclicDependency
                | Self::DependencyUnresolved
                | Self::AuthFailure
                | Self::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaViolation => "schema violation",
            Self::CyclicDependency => "cyclic dependency",
            Self::DependencyUnresolved => "unresolved dependency",
            Self::DependencyFailed => "dependency failed",
            Self::NotFound => "not found",
            Self::Vanished => "vanished",
            Self::AuthFailure => "authentication failure",
            Self::Transient => "transient",
            Self::Conflict => "conflict",
            Self::BadRequest => "bad request",
            Self::Cancelled => "cancelled",
            Self::Unsupported => "unsupported",
            Self::Aborted => "aborted",
            Self::Remote => "remote error",
        }
    }

    /// Actionable advice for the operator
    pub fn advice(&self) -> &'static str {
        match self {
            Self::SchemaViolation => "Fix the resource attributes in the manifest",
            Self::CyclicDependency => "Break the reference cycle between resources",
            Self::DependencyUnresolved => {
                "Declare the referenced resource or import it with its remote ID"
            }
            Self::DependencyFailed => "Resolve the failure of the referenced resource first",
            Self::NotFound => "Check the remote ID and parent references",
            Self::Vanished => "Re-run with --recreate-vanished or forget the state entry",
            Self::AuthFailure => "Check the API token and its permissions",
            Self::Transient => "Check connectivity and try again",
            Self::Conflict => "Another change raced this one; re-run to re-read and retry",
            Self::BadRequest => "Check the attribute values against the API's constraints",
            Self::Cancelled => "Increase the timeout or re-run",
            Self::Unsupported => "This operation is not available for the resource kind",
            Self::Aborted => "Resolve the earlier failure and re-run",
            Self::Remote => "Check the error details for more information",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub retryable: bool,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable: kind.is_retryable(),
            message: message.into(),
        }
    }

    pub fn vanished(id: &str) -> Self {
        Self::new(
            DiagnosticKind::Vanished,
            format!("remote entity {id} no longer exists"),
        )
    }

    pub fn dependency_failed(dependency: &str) -> Self {
        Self::new(
            DiagnosticKind::DependencyFailed,
            format!("dependency '{dependency}' failed"),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(DiagnosticKind::Cancelled, "operation cancelled")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Classify a raw remote failure
pub fn translate(error: &RemoteError) -> Diagnostic {
    let message = error.to_string();
    let kind = match error {
        RemoteError::NotFound(_) => DiagnosticKind::NotFound,
        RemoteError::Status { status, message } => classify_status(*status, message),
        RemoteError::Transport(_) | RemoteError::Timeout(_) => DiagnosticKind::Transient,
        RemoteError::Cancelled => DiagnosticKind::Cancelled,
        RemoteError::Unsupported { .. } => DiagnosticKind::Unsupported,
        RemoteError::Other(text) => classify_message(text),
    };
    Diagnostic::new(kind, message)
}

fn classify_status(status: u16, message: &str) -> DiagnosticKind {
    match status {
        401 | 403 => DiagnosticKind::AuthFailure,
        404 => DiagnosticKind::NotFound,
        409 | 412 => DiagnosticKind::Conflict,
        408 | 429 => DiagnosticKind::Transient,
        400..=499 => DiagnosticKind::BadRequest,
        500..=599 => DiagnosticKind::Transient,
        _ => classify_message(message),
    }
}

/// Classify a free-form error message by its content
fn classify_message(message: &str) -> DiagnosticKind {
    let lower = message.to_lowercase();

    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("could not resolve")
        || lower.contains("temporarily unavailable")
    {
        return DiagnosticKind::Transient;
    }

    if lower.contains("unauthorized")
        || lower.contains("forbidden")
        || lower.contains("invalid token")
        || lower.contains("permission denied")
    {
        return DiagnosticKind::AuthFailure;
    }

    if lower.contains("conflict") || lower.contains("already exists") {
        return DiagnosticKind::Conflict;
    }

    if lower.contains("not found") {
        return DiagnosticKind::NotFound;
    }

    DiagnosticKind::Remote
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> RemoteError {
        RemoteError::Status {
            status: code,
            message: "boom".into(),
        }
    }

    #[test]
    fn test_transport_is_retryable() {
        let d = translate(&RemoteError::Transport("connection refused".into()));
        assert_eq!(d.kind, DiagnosticKind::Transient);
        assert!(d.retryable);

        let d = translate(&RemoteError::Timeout("30s".into()));
        assert!(d.retryable);
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        assert_eq!(translate(&status(400)).kind, DiagnosticKind::BadRequest);
        assert_eq!(translate(&status(404)).kind, DiagnosticKind::NotFound);
        assert_eq!(translate(&status(409)).kind, DiagnosticKind::Conflict);
        assert_eq!(translate(&status(422)).kind, DiagnosticKind::BadRequest);
        for code in [400, 404, 409, 422] {
            assert!(!translate(&status(code)).retryable);
        }
    }

    #[test]
    fn test_auth_failure_is_distinct_and_never_retryable() {
        for code in [401, 403] {
            let d = translate(&status(code));
            assert_eq!(d.kind, DiagnosticKind::AuthFailure);
            assert!(!d.retryable);
            assert!(d.kind.is_fatal());
        }
    }

    #[test]
    fn test_server_errors_and_throttling_are_transient() {
        for code in [429, 500, 502, 503] {
            assert_eq!(translate(&status(code)).kind, DiagnosticKind::Transient);
        }
    }

    #[test]
    fn test_cancelled() {
        let d = translate(&RemoteError::Cancelled);
        assert_eq!(d.kind, DiagnosticKind::Cancelled);
        assert!(!d.retryable);
    }

    #[test]
    fn test_free_form_messages() {
        let d = translate(&RemoteError::Other("read: connection reset by peer".into()));
        assert_eq!(d.kind, DiagnosticKind::Transient);

        let d = translate(&RemoteError::Other("Unauthorized: invalid token".into()));
        assert_eq!(d.kind, DiagnosticKind::AuthFailure);

        let d = translate(&RemoteError::Other("stream name already exists".into()));
        assert_eq!(d.kind, DiagnosticKind::Conflict);

        let d = translate(&RemoteError::Other("something odd".into()));
        assert_eq!(d.kind, DiagnosticKind::Remote);
    }

    #[test]
    fn test_message_is_kept_verbatim() {
        let d = translate(&RemoteError::Status {
            status: 400,
            message: "subjects overlap with stream ORDERS".into(),
        });
        assert_eq!(d.message, "HTTP 400: subjects overlap with stream ORDERS");
    }
}
