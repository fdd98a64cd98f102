//! In-memory remote store
//!
//! Behaves like a small control plane: assigns IDs, keeps parent links,
//! refuses to delete entities that still have children, and lists by
//! kind. Tests use it to count calls, inject faults, and simulate drift.

use crate::context::{CallContext, CancelToken};
use crate::kind::ResourceKind;
use crate::store::{ParentIds, RemoteError, RemoteId, RemoteStore};
use crate::value::{Attributes, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Remote operation, used to target injected faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

/// Number of calls received per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create: usize,
    pub read: usize,
    pub update: usize,
    pub delete: usize,
    pub list: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.create + self.read + self.update + self.delete + self.list
    }

    /// Calls that change remote state
    pub fn mutations(&self) -> usize {
        self.create + self.update + self.delete
    }

    fn record(&mut self, operation: Operation) {
        match operation {
            Operation::Create => self.create += 1,
            Operation::Read => self.read += 1,
            Operation::Update => self.update += 1,
            Operation::Delete => self.delete += 1,
            Operation::List => self.list += 1,
        }
    }
}

#[derive(Debug, Clone)]
struct Entity {
    kind: ResourceKind,
    parents: ParentIds,
    attributes: Attributes,
}

#[derive(Debug, Clone)]
struct Fault {
    operation: Operation,
    kind: Option<ResourceKind>,
    error: RemoteError,
    /// Remaining injections; `None` never runs out
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct Inner {
    entities: BTreeMap<RemoteId, Entity>,
    next_id: u64,
    counts: CallCounts,
    faults: Vec<Fault>,
    cancel_on: Vec<(Operation, CancelToken)>,
}

impl Inner {
    /// Count the call and return an injected failure, if any
    fn enter(&mut self, operation: Operation, kind: ResourceKind) -> Result<(), RemoteError> {
        self.counts.record(operation);

        if let Some(pos) = self.cancel_on.iter().position(|(op, _)| *op == operation) {
            let (_, token) = self.cancel_on.remove(pos);
            token.cancel();
            return Err(RemoteError::Cancelled);
        }

        let fault = self.faults.iter_mut().find(|f| {
            f.operation == operation
                && f.kind.is_none_or(|k| k == kind)
                && f.remaining.is_none_or(|n| n > 0)
        });
        match fault {
            Some(fault) => {
                if let Some(n) = fault.remaining.as_mut() {
                    *n -= 1;
                }
                Err(fault.error.clone())
            }
            None => Ok(()),
        }
    }

    fn entity(&self, kind: ResourceKind, id: &str) -> Result<&Entity, RemoteError> {
        self.entities
            .get(id)
            .filter(|e| e.kind == kind)
            .ok_or_else(|| RemoteError::NotFound(format!("{kind} {id}")))
    }

    fn check_parents(&self, parents: &ParentIds) -> Result<(), RemoteError> {
        for (attribute, id) in parents {
            if !self.entities.contains_key(id) {
                return Err(RemoteError::NotFound(format!("{attribute} {id}")));
            }
        }
        Ok(())
    }

    fn insert(&mut self, kind: ResourceKind, parents: ParentIds, attributes: Attributes) -> RemoteId {
        self.next_id += 1;
        let id = format!("{kind}-{}", self.next_id);
        self.entities.insert(
            id.clone(),
            Entity {
                kind,
                parents,
                attributes,
            },
        );
        id
    }
}

/// Thread-safe in-memory [`RemoteStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an entity directly, bypassing call counting
    pub fn seed(&self, kind: ResourceKind, parents: ParentIds, attributes: Attributes) -> RemoteId {
        let mut stored = attributes;
        for (attribute, id) in &parents {
            stored.insert(attribute.clone(), Value::from(id.as_str()));
        }
        self.lock().insert(kind, parents, stored)
    }

    pub fn counts(&self) -> CallCounts {
        self.lock().counts
    }

    pub fn reset_counts(&self) {
        self.lock().counts = CallCounts::default();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored attributes of an entity
    pub fn attributes(&self, id: &str) -> Option<Attributes> {
        self.lock().entities.get(id).map(|e| e.attributes.clone())
    }

    /// Change an attribute behind the engine's back
    pub fn tamper(&self, id: &str, attribute: &str, value: Value) {
        if let Some(entity) = self.lock().entities.get_mut(id) {
            entity.attributes.insert(attribute.to_string(), value);
        }
    }

    /// Drop an attribute from the stored state
    pub fn tamper_remove(&self, id: &str, attribute: &str) {
        if let Some(entity) = self.lock().entities.get_mut(id) {
            entity.attributes.remove(attribute);
        }
    }

    /// Delete an entity behind the engine's back
    pub fn remove(&self, id: &str) {
        self.lock().entities.remove(id);
    }

    /// Fail every call of `operation` with `error`
    pub fn fail(&self, operation: Operation, error: RemoteError) {
        self.push_fault(operation, None, error, None);
    }

    /// Fail the next `times` calls of `operation` with `error`
    pub fn fail_times(&self, operation: Operation, times: usize, error: RemoteError) {
        self.push_fault(operation, None, error, Some(times));
    }

    /// Fail every call of `operation` on `kind` with `error`
    pub fn fail_kind(&self, kind: ResourceKind, operation: Operation, error: RemoteError) {
        self.push_fault(operation, Some(kind), error, None);
    }

    /// Cancel `token` when `operation` is next called; that call reports
    /// [`RemoteError::Cancelled`]
    pub fn cancel_on(&self, operation: Operation, token: CancelToken) {
        self.lock().cancel_on.push((operation, token));
    }

    pub fn clear_faults(&self) {
        let mut inner = self.lock();
        inner.faults.clear();
        inner.cancel_on.clear();
    }

    fn push_fault(
        &self,
        operation: Operation,
        kind: Option<ResourceKind>,
        error: RemoteError,
        remaining: Option<usize>,
    ) {
        self.lock().faults.push(Fault {
            operation,
            kind,
            error,
            remaining,
        });
    }
}

impl RemoteStore for MemoryStore {
    fn create(
        &self,
        _ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
        attrs: &Attributes,
    ) -> Result<(RemoteId, Attributes), RemoteError> {
        let mut inner = self.lock();
        inner.enter(Operation::Create, kind)?;
        inner.check_parents(parents)?;

        let mut stored = attrs.clone();
        for (attribute, id) in parents {
            stored.insert(attribute.clone(), Value::from(id.as_str()));
        }
        let id = inner.insert(kind, parents.clone(), stored.clone());
        Ok((id, stored))
    }

    fn read(
        &self,
        _ctx: &CallContext,
        kind: ResourceKind,
        _parents: &ParentIds,
        id: &str,
    ) -> Result<Attributes, RemoteError> {
        let mut inner = self.lock();
        inner.enter(Operation::Read, kind)?;
        Ok(inner.entity(kind, id)?.attributes.clone())
    }

    fn update(
        &self,
        _ctx: &CallContext,
        kind: ResourceKind,
        _parents: &ParentIds,
        id: &str,
        attrs: &Attributes,
    ) -> Result<Attributes, RemoteError> {
        let mut inner = self.lock();
        inner.enter(Operation::Update, kind)?;
        inner.entity(kind, id)?;

        let entity = inner
            .entities
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(format!("{kind} {id}")))?;
        let mut stored = attrs.clone();
        for (attribute, parent) in &entity.parents {
            stored.insert(attribute.clone(), Value::from(parent.as_str()));
        }
        entity.attributes = stored.clone();
        Ok(stored)
    }

    fn delete(
        &self,
        _ctx: &CallContext,
        kind: ResourceKind,
        _parents: &ParentIds,
        id: &str,
    ) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.enter(Operation::Delete, kind)?;
        inner.entity(kind, id)?;

        if let Some((child, _)) = inner
            .entities
            .iter()
            .find(|(_, e)| e.parents.values().any(|p| p == id))
        {
            return Err(RemoteError::Status {
                status: 409,
                message: format!("{kind} {id} is still referenced by {child}"),
            });
        }

        inner.entities.remove(id);
        Ok(())
    }

    fn list(
        &self,
        _ctx: &CallContext,
        kind: ResourceKind,
        parents: &ParentIds,
    ) -> Result<Vec<(RemoteId, Attributes)>, RemoteError> {
        let mut inner = self.lock();
        inner.enter(Operation::List, kind)?;
        Ok(inner
            .entities
            .iter()
            .filter(|(_, e)| {
                e.kind == kind && parents.iter().all(|(a, id)| e.parents.get(a) == Some(id))
            })
            .map(|(id, e)| (id.clone(), e.attributes.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::attributes;

    fn parents(pairs: &[(&str, &str)]) -> ParentIds {
        pairs
            .iter()
            .map(|(a, id)| ((*a).to_string(), (*id).to_string()))
            .collect()
    }

    #[test]
    fn test_crud_roundtrip() {
        let store = MemoryStore::new();
        let ctx = CallContext::new();

        let (id, observed) = store
            .create(&ctx, ResourceKind::Cluster, &ParentIds::new(), &attributes([("name", "prod")]))
            .unwrap();
        assert_eq!(id, "cluster-1");
        assert_eq!(observed["name"], Value::from("prod"));

        let updated = store
            .update(
                &ctx,
                ResourceKind::Cluster,
                &ParentIds::new(),
                &id,
                &attributes([("name", "staging")]),
            )
            .unwrap();
        assert_eq!(updated["name"], Value::from("staging"));

        store.delete(&ctx, ResourceKind::Cluster, &ParentIds::new(), &id).unwrap();
        let err = store
            .read(&ctx, ResourceKind::Cluster, &ParentIds::new(), &id)
            .unwrap_err();
        assert!(err.is_not_found());

        let counts = store.counts();
        assert_eq!((counts.create, counts.update, counts.delete, counts.read), (1, 1, 1, 1));
    }

    #[test]
    fn test_kind_mismatch_is_not_found() {
        let store = MemoryStore::new();
        let id = store.seed(ResourceKind::Cluster, ParentIds::new(), attributes([("name", "prod")]));
        let err = store
            .read(&CallContext::new(), ResourceKind::Stream, &ParentIds::new(), &id)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_missing_parent_is_rejected() {
        let store = MemoryStore::new();
        let err = store
            .create(
                &CallContext::new(),
                ResourceKind::Stream,
                &parents(&[("cluster_id", "cluster-9")]),
                &attributes([("name", "orders")]),
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_with_children_conflicts() {
        let store = MemoryStore::new();
        let ctx = CallContext::new();
        let cluster = store.seed(ResourceKind::Cluster, ParentIds::new(), Attributes::new());
        store.seed(
            ResourceKind::Stream,
            parents(&[("cluster_id", cluster.as_str())]),
            Attributes::new(),
        );

        let err = store
            .delete(&ctx, ResourceKind::Cluster, &ParentIds::new(), &cluster)
            .unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 409, .. }));
    }

    #[test]
    fn test_list_filters_by_kind_and_parent() {
        let store = MemoryStore::new();
        let ctx = CallContext::new();
        let a = store.seed(ResourceKind::Cluster, ParentIds::new(), Attributes::new());
        let b = store.seed(ResourceKind::Cluster, ParentIds::new(), Attributes::new());
        store.seed(ResourceKind::Stream, parents(&[("cluster_id", a.as_str())]), Attributes::new());
        store.seed(ResourceKind::Stream, parents(&[("cluster_id", b.as_str())]), Attributes::new());

        let clusters = store.list(&ctx, ResourceKind::Cluster, &ParentIds::new()).unwrap();
        assert_eq!(clusters.len(), 2);

        let streams = store
            .list(&ctx, ResourceKind::Stream, &parents(&[("cluster_id", a.as_str())]))
            .unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].1["cluster_id"], Value::from(a.as_str()));
    }

    #[test]
    fn test_fault_injection() {
        let store = MemoryStore::new();
        let ctx = CallContext::new();
        store.fail_times(Operation::Create, 1, RemoteError::Transport("reset".into()));

        let first = store.create(&ctx, ResourceKind::Cluster, &ParentIds::new(), &Attributes::new());
        assert!(matches!(first, Err(RemoteError::Transport(_))));
        let second = store.create(&ctx, ResourceKind::Cluster, &ParentIds::new(), &Attributes::new());
        assert!(second.is_ok());
        assert_eq!(store.counts().create, 2);

        store.fail_kind(ResourceKind::Stream, Operation::Read, RemoteError::Cancelled);
        let err = store
            .read(&ctx, ResourceKind::Stream, &ParentIds::new(), "stream-1")
            .unwrap_err();
        assert_eq!(err, RemoteError::Cancelled);
    }

    #[test]
    fn test_cancel_on_fires_token() {
        let store = MemoryStore::new();
        let token = CancelToken::new();
        store.cancel_on(Operation::Create, token.clone());

        let err = store
            .create(&CallContext::new(), ResourceKind::Cluster, &ParentIds::new(), &Attributes::new())
            .unwrap_err();
        assert_eq!(err, RemoteError::Cancelled);
        assert!(token.is_cancelled());
        assert!(store.is_empty());
    }
}
