//! Read-only lookups (data sources).
//!
//! These never mutate the control plane. They run against any
//! [`RemoteStore`], so they work the same over HTTP and in memory.

use crate::error::{Error, Result};
use declarative::{Attributes, CallContext, ParentIds, RemoteId, RemoteStore, ResourceKind};
use serde::Serialize;

/// An entity found by a lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub id: RemoteId,
    pub attributes: Attributes,
}

impl Entity {
    fn new((id, attributes): (RemoteId, Attributes)) -> Self {
        Self { id, attributes }
    }

    /// A string attribute, if present
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|v| v.as_str())
    }
}

/// IDs of every cluster visible to the token
pub fn cluster_ids(store: &dyn RemoteStore, ctx: &CallContext) -> Result<Vec<RemoteId>> {
    let clusters = store.list(ctx, ResourceKind::Cluster, &ParentIds::new())?;
    Ok(clusters.into_iter().map(|(id, _)| id).collect())
}

/// A cluster by ID
pub fn cluster(store: &dyn RemoteStore, ctx: &CallContext, id: &str) -> Result<Entity> {
    match store.read(ctx, ResourceKind::Cluster, &ParentIds::new(), id) {
        Ok(attributes) => Ok(Entity {
            id: id.to_string(),
            attributes,
        }),
        Err(e) if e.is_not_found() => Err(Error::NoMatch {
            kind: ResourceKind::Cluster,
            query: format!("id '{id}'"),
        }),
        Err(e) => Err(e.into()),
    }
}

/// The organization the token belongs to
///
/// A token is scoped to a single organization, so listing organizations
/// yields exactly that one.
pub fn my_organization(store: &dyn RemoteStore, ctx: &CallContext) -> Result<Entity> {
    let orgs = store.list(ctx, ResourceKind::Organization, &ParentIds::new())?;
    single(ResourceKind::Organization, "the API token", orgs)
}

/// A user by email address (case-insensitive)
pub fn user_by_email(store: &dyn RemoteStore, ctx: &CallContext, email: &str) -> Result<Entity> {
    let wanted = email.trim();
    let users: Vec<_> = store
        .list(ctx, ResourceKind::User, &ParentIds::new())?
        .into_iter()
        .filter(|(_, attrs)| {
            attrs
                .get("email")
                .and_then(|v| v.as_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
        })
        .collect();
    single(ResourceKind::User, &format!("email '{wanted}'"), users)
}

fn single(
    kind: ResourceKind,
    query: &str,
    mut matches: Vec<(RemoteId, Attributes)>,
) -> Result<Entity> {
    match matches.len() {
        0 => Err(Error::NoMatch {
            kind,
            query: query.to_string(),
        }),
        1 => Ok(Entity::new(matches.remove(0))),
        count => Err(Error::Ambiguous {
            kind,
            query: query.to_string(),
            count,
        }),
    }
}
