//! Resource kinds managed by the control plane

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tag identifying the kind of a managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourceKind {
    Cluster,
    Organization,
    Project,
    User,
    JwtClaim,
    Permission,
    Stream,
    Consumer,
    KvBucket,
    ObjectStore,
    ClusterGateway,
    Leafnode,
    ServiceExport,
    ServiceImport,
}

/// Error for an unrecognized kind name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown resource kind '{0}'")]
pub struct UnknownKind(pub String);

impl ResourceKind {
    /// Every kind, in registration order
    pub const ALL: [ResourceKind; 14] = [
        Self::Organization,
        Self::Project,
        Self::Cluster,
        Self::User,
        Self::JwtClaim,
        Self::Permission,
        Self::Stream,
        Self::Consumer,
        Self::KvBucket,
        Self::ObjectStore,
        Self::ClusterGateway,
        Self::Leafnode,
        Self::ServiceExport,
        Self::ServiceImport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Organization => "organization",
            Self::Project => "project",
            Self::User => "user",
            Self::JwtClaim => "jwt_claim",
            Self::Permission => "permission",
            Self::Stream => "stream",
            Self::Consumer => "consumer",
            Self::KvBucket => "kv_bucket",
            Self::ObjectStore => "object_store",
            Self::ClusterGateway => "cluster_gateway",
            Self::Leafnode => "leafnode",
            Self::ServiceExport => "service_export",
            Self::ServiceImport => "service_import",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    /// Accepts the bare name (`stream`) and the provider-prefixed
    /// name (`synadia_stream`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_prefix("synadia_").unwrap_or(name);
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

impl TryFrom<String> for ResourceKind {
    type Error = UnknownKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("stream".parse::<ResourceKind>(), Ok(ResourceKind::Stream));
        assert_eq!(
            "synadia_kv_bucket".parse::<ResourceKind>(),
            Ok(ResourceKind::KvBucket)
        );
        assert_eq!(
            "bucket".parse::<ResourceKind>(),
            Err(UnknownKind("bucket".to_string()))
        );
    }

    #[test]
    fn test_round_trip_every_kind() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&ResourceKind::ClusterGateway).unwrap();
        assert_eq!(json, "\"cluster_gateway\"");
        let kind: ResourceKind = serde_json::from_str("\"jwt_claim\"").unwrap();
        assert_eq!(kind, ResourceKind::JwtClaim);
        assert!(serde_json::from_str::<ResourceKind>("\"nope\"").is_err());
    }
}
