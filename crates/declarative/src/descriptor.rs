//! Resource descriptors
//!
//! A [`Descriptor`] binds a [`ResourceKind`] to its schema, its mutability,
//! and the four lifecycle operations expressed against a [`RemoteStore`].
//! Descriptors live in a [`DescriptorTable`] keyed by kind.

use crate::context::CallContext;
use crate::kind::ResourceKind;
use crate::schema::{AttributeSpec, DependencyReference, RegistryError, Schema, SchemaRegistry};
use crate::store::{ParentIds, RemoteError, RemoteId, RemoteStore};
use crate::value::Attributes;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How a kind absorbs changes to its attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// Changed in place with an update call
    InPlace,
    /// Any change deletes the entity and creates a new one
    Replace,
}

/// Per-kind lifecycle declaration
#[derive(Debug, Clone)]
pub struct Descriptor {
    kind: ResourceKind,
    schema: Arc<Schema>,
    mutability: Mutability,
}

impl Descriptor {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn mutability(&self) -> Mutability {
        self.mutability
    }

    pub fn dependency_references(&self) -> Vec<DependencyReference> {
        self.schema.dependency_references()
    }

    /// Resolved parent IDs, taken from the reference attributes of a
    /// record whose references already hold remote IDs
    pub fn parent_ids(&self, attrs: &Attributes) -> ParentIds {
        self.dependency_references()
            .into_iter()
            .filter_map(|r| {
                let id = attrs.get(&r.attribute)?.as_str()?;
                Some((r.attribute, id.to_string()))
            })
            .collect()
    }

    pub fn create(
        &self,
        store: &dyn RemoteStore,
        ctx: &CallContext,
        parents: &ParentIds,
        desired: &Attributes,
    ) -> Result<(RemoteId, Attributes), RemoteError> {
        ctx.check()?;
        log::debug!("create {} under {:?}", self.kind, parents);
        let payload = self.payload(desired);
        let (id, observed) = store
            .create(ctx, self.kind, parents, &payload)
            .map_err(|e| interrupted(ctx, e))?;
        Ok((id, self.observed(observed, parents)))
    }

    pub fn read(
        &self,
        store: &dyn RemoteStore,
        ctx: &CallContext,
        parents: &ParentIds,
        id: &str,
    ) -> Result<Attributes, RemoteError> {
        ctx.check()?;
        log::debug!("read {} {}", self.kind, id);
        let observed = store
            .read(ctx, self.kind, parents, id)
            .map_err(|e| interrupted(ctx, e))?;
        Ok(self.observed(observed, parents))
    }

    pub fn update(
        &self,
        store: &dyn RemoteStore,
        ctx: &CallContext,
        parents: &ParentIds,
        id: &str,
        desired: &Attributes,
    ) -> Result<Attributes, RemoteError> {
        if self.mutability == Mutability::Replace {
            return Err(RemoteError::Unsupported {
                kind: self.kind,
                operation: "update",
            });
        }
        ctx.check()?;
        log::debug!("update {} {}", self.kind, id);
        let payload = self.payload(desired);
        let observed = store
            .update(ctx, self.kind, parents, id, &payload)
            .map_err(|e| interrupted(ctx, e))?;
        Ok(self.observed(observed, parents))
    }

    pub fn delete(
        &self,
        store: &dyn RemoteStore,
        ctx: &CallContext,
        parents: &ParentIds,
        id: &str,
    ) -> Result<(), RemoteError> {
        ctx.check()?;
        log::debug!("delete {} {}", self.kind, id);
        store
            .delete(ctx, self.kind, parents, id)
            .map_err(|e| interrupted(ctx, e))
    }

    /// Managed attributes sent to the store
    fn payload(&self, desired: &Attributes) -> Attributes {
        desired
            .iter()
            .filter(|(name, _)| {
                self.schema
                    .attribute(name)
                    .is_some_and(|spec| !spec.is_computed())
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Keep declared attributes only and restore parent references, which
    /// some endpoints leave out of their response bodies
    fn observed(&self, mut observed: Attributes, parents: &ParentIds) -> Attributes {
        observed.retain(|name, _| self.schema.attribute(name).is_some());
        for (attribute, id) in parents {
            observed
                .entry(attribute.clone())
                .or_insert_with(|| id.clone().into());
        }
        observed
    }
}

/// A call that was in flight when the context fired reports `Cancelled`
fn interrupted(ctx: &CallContext, error: RemoteError) -> RemoteError {
    if ctx.is_cancelled() {
        RemoteError::Cancelled
    } else {
        error
    }
}

/// Descriptors keyed by kind, together with the registry holding their
/// schemas
#[derive(Debug, Clone, Default)]
pub struct DescriptorTable {
    registry: SchemaRegistry,
    descriptors: BTreeMap<ResourceKind, Descriptor>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind's schema and mutability
    pub fn register(
        &mut self,
        kind: ResourceKind,
        mutability: Mutability,
        attributes: Vec<AttributeSpec>,
    ) -> Result<&Descriptor, RegistryError> {
        let schema = self.registry.register(kind, attributes)?;
        let descriptor = self.descriptors.entry(kind).or_insert(Descriptor {
            kind,
            schema,
            mutability,
        });
        Ok(descriptor)
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&Descriptor> {
        self.descriptors.get(&kind)
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.descriptors.keys().copied()
    }
}
