//! REST routes per resource kind.
//!
//! Each kind lives in a collection, optionally nested under the collections
//! of its parents, e.g. `/clusters/{cluster_id}/streams/{id}`. Parents that
//! appear in the path are not repeated in the request body.

use crate::error::{Error, Result};
use declarative::{ParentIds, ResourceKind};

/// One `/{collection}/{parent id}` step of a nested path
#[derive(Debug, Clone, Copy)]
struct Scope {
    collection: &'static str,
    attribute: &'static str,
}

/// Where a kind's collection lives
#[derive(Debug, Clone, Copy)]
pub struct Route {
    kind: ResourceKind,
    scopes: &'static [Scope],
    collection: &'static str,
    /// Scopes may be omitted entirely, addressing the top-level collection
    optional_scope: bool,
}

const ORGANIZATION: Scope = Scope {
    collection: "organizations",
    attribute: "organization_id",
};
const CLUSTER: Scope = Scope {
    collection: "clusters",
    attribute: "cluster_id",
};
const STREAM: Scope = Scope {
    collection: "streams",
    attribute: "stream_id",
};
const USER: Scope = Scope {
    collection: "users",
    attribute: "user_id",
};

impl Route {
    /// Route for a kind
    pub fn of(kind: ResourceKind) -> Self {
        use ResourceKind as K;

        let (scopes, collection, optional_scope): (&'static [Scope], &'static str, bool) =
            match kind {
                K::Organization => (&[], "organizations", false),
                K::Project => (&[ORGANIZATION], "projects", false),
                K::Cluster => (&[ORGANIZATION], "clusters", true),
                K::User => (&[ORGANIZATION], "users", true),
                K::JwtClaim => (&[USER], "jwt-claims", false),
                K::Permission => (&[USER], "permissions", false),
                K::Stream => (&[CLUSTER], "streams", false),
                K::Consumer => (&[CLUSTER, STREAM], "consumers", false),
                K::KvBucket => (&[CLUSTER], "kv-buckets", false),
                K::ObjectStore => (&[CLUSTER], "object-stores", false),
                K::ClusterGateway => (&[CLUSTER], "gateways", false),
                K::Leafnode => (&[CLUSTER], "leafnodes", false),
                K::ServiceExport => (&[CLUSTER], "service-exports", false),
                K::ServiceImport => (&[CLUSTER], "service-imports", false),
            };

        Self {
            kind,
            scopes,
            collection,
            optional_scope,
        }
    }

    /// Path of the kind's collection under `parents`
    pub fn collection_path(&self, parents: &ParentIds) -> Result<String> {
        if self.optional_scope
            && self
                .scopes
                .iter()
                .any(|s| !parents.contains_key(s.attribute))
        {
            return Ok(format!("/{}", self.collection));
        }

        let mut path = String::new();
        for scope in self.scopes {
            let id = parents.get(scope.attribute).ok_or(Error::MissingParent {
                kind: self.kind,
                attribute: scope.attribute,
            })?;
            path.push_str(&format!("/{}/{}", scope.collection, urlencoding::encode(id)));
        }
        path.push_str(&format!("/{}", self.collection));
        Ok(path)
    }

    /// Path of a single entity; IDs are escaped as path segments
    pub fn entity_path(&self, parents: &ParentIds, id: &str) -> Result<String> {
        Ok(format!(
            "{}/{}",
            self.collection_path(parents)?,
            urlencoding::encode(id)
        ))
    }

    /// Whether an attribute is carried by the path rather than the body
    pub fn is_path_parent(&self, attribute: &str) -> bool {
        self.scopes.iter().any(|s| s.attribute == attribute)
    }
}
