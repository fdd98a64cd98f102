//! Remote store boundary
//!
//! The engine talks to the control plane only through [`RemoteStore`].
//! Implementations own transport and credentials; they are constructed by
//! the caller and passed in at call time.

use crate::context::CallContext;
use crate::kind::ResourceKind;
use crate::value::Attributes;
use std::collections::BTreeMap;
use thiserror::Error;

/// Opaque identifier of a live remote entity
pub type RemoteId = String;

/// Resolved remote IDs of an instance's dependencies, keyed by the
/// referencing attribute name (e.g. `cluster_id`)
pub type ParentIds = BTreeMap<String, RemoteId>;

/// Raw failure reported by a remote store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{operation} is not supported for {kind}")]
    Unsupported {
        kind: ResourceKind,
        operation: &'static str,
    },

    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Status { status: 404, .. })
    }
}

/// Typed CRUD access to the control plane
///
/// Every call is a blocking round-trip. Implementations should honor
/// [`CallContext::remaining`] as a timeout and report an interrupted call
/// as [`RemoteError::Cancelled`].
pub trait RemoteStore: Send + Sync {
    /// Create an entity, returning its ID and the state the remote side
    /// recorded
    fn create(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        attrs: &Attributes,
    ) -> Result<(RemoteId, Attributes), RemoteError>;

    /// Read an entity; a missing entity is [`RemoteError::NotFound`]
    fn read(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        id: &str,
    ) -> Result<Attributes, RemoteError>;

    /// Replace an entity's attributes with `attrs`
    fn update(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        id: &str,
        attrs: &Attributes,
    ) -> Result<Attributes, RemoteError>;

    /// Delete an entity; a missing entity is [`RemoteError::NotFound`]
    fn delete(
        &self,
        ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        id: &str,
    ) -> Result<(), RemoteError>;

    /// List entities of a kind under the given parents
    fn list(
        &self,
        _ctx: &CallContext,
        kind: ResourceKind,
        _parents: &ParentIds,
    ) -> Result<Vec<(RemoteId, Attributes)>, RemoteError> {
        Err(RemoteError::Unsupported {
            kind,
            operation: "list",
        })
    }
}
