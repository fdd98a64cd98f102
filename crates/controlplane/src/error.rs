//! Error types for control-plane operations.
//!
//! Transport and response failures are collected here and converted into
//! the engine's [`RemoteError`] at the [`RemoteStore`](declarative::RemoteStore)
//! boundary, where the diagnostic translator classifies them.

use declarative::{RemoteError, ResourceKind};

/// Result type alias for control-plane operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the control plane.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configured endpoint is not an http(s) URL.
    #[error("invalid API endpoint '{0}': expected an http:// or https:// URL")]
    InvalidEndpoint(String),

    /// No API token was configured.
    #[error("missing API token (set SYNADIA_API_TOKEN or pass --token)")]
    MissingToken,

    /// A path parent required by the kind's route was not supplied.
    #[error("{kind} requires '{attribute}' to build its API path")]
    MissingParent {
        /// Kind being addressed.
        kind: ResourceKind,
        /// Parent attribute that was absent.
        attribute: &'static str,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },

    /// The request did not complete before its timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection, DNS, TLS, or other transport failure.
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// Response body was not the JSON shape expected.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// A store call failed during a lookup.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A lookup matched nothing.
    #[error("no {kind} matches {query}")]
    NoMatch {
        /// Kind searched.
        kind: ResourceKind,
        /// Human-readable query.
        query: String,
    },

    /// A lookup that should match one entity matched several.
    #[error("{count} {kind} entities match {query}")]
    Ambiguous {
        /// Kind searched.
        kind: ResourceKind,
        /// Human-readable query.
        query: String,
        /// Number of matches.
        count: usize,
    },
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Status {
                status: code,
                message: format!("HTTP {code}"),
            },
            ureq::Error::Timeout(which) => Self::Timeout(which.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<Error> for RemoteError {
    fn from(err: Error) -> Self {
        match err {
            Error::Status { status: 404, message } => Self::NotFound(message),
            Error::Status { status, message } => Self::Status { status, message },
            Error::Timeout(message) => Self::Timeout(message),
            Error::Transport(message) => Self::Transport(message),
            Error::Remote(inner) => inner,
            other => Self::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_404_becomes_not_found() {
        let err = Error::Status {
            status: 404,
            message: "stream not found".to_string(),
        };
        let remote: RemoteError = err.into();
        assert!(remote.is_not_found());
        assert_eq!(remote, RemoteError::NotFound("stream not found".to_string()));
    }

    #[test]
    fn test_status_keeps_code_and_message() {
        let err = Error::Status {
            status: 409,
            message: "name taken".to_string(),
        };
        let remote: RemoteError = err.into();
        assert_eq!(
            remote,
            RemoteError::Status {
                status: 409,
                message: "name taken".to_string()
            }
        );
    }

    #[test]
    fn test_transport_and_timeout_conversion() {
        let remote: RemoteError = Error::Timeout("global".to_string()).into();
        assert!(matches!(remote, RemoteError::Timeout(_)));

        let remote: RemoteError = Error::Transport("connection refused".to_string()).into();
        assert!(matches!(remote, RemoteError::Transport(_)));
    }

    #[test]
    fn test_remote_passes_through() {
        let remote: RemoteError = Error::Remote(RemoteError::Cancelled).into();
        assert_eq!(remote, RemoteError::Cancelled);
    }

    #[test]
    fn test_local_errors_become_other() {
        let err = Error::MissingParent {
            kind: ResourceKind::Stream,
            attribute: "cluster_id",
        };
        let remote: RemoteError = err.into();
        match remote {
            RemoteError::Other(msg) => assert!(msg.contains("cluster_id")),
            other => panic!("expected Other, got {other:?}"),
        }
    }

    #[test]
    fn test_retry_decided_by_translator() {
        let unavailable: RemoteError = Error::Status {
            status: 503,
            message: "try later".to_string(),
        }
        .into();
        assert!(declarative::translate(&unavailable).retryable);

        let bad: RemoteError = Error::Status {
            status: 400,
            message: "bad subject".to_string(),
        }
        .into();
        assert!(!declarative::translate(&bad).retryable);

        let timeout: RemoteError = Error::Timeout("global".to_string()).into();
        assert!(declarative::translate(&timeout).retryable);
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }
}
