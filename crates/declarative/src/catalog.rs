//! The control plane's resource kinds

use crate::descriptor::{DescriptorTable, Mutability};
use crate::kind::ResourceKind;
use crate::schema::{AttributeSpec, RegistryError, ValueType};

/// Upper bound accepted by the API for stream limits
const STREAM_LIMIT_MAX: i64 = i32::MAX as i64;

/// Build the descriptor table for every kind the control plane manages
pub fn standard_table() -> Result<DescriptorTable, RegistryError> {
    use AttributeSpec as A;
    use Mutability::{InPlace, Replace};
    use ResourceKind as K;
    use ValueType::{Bool, Int, String, StringList};

    let mut table = DescriptorTable::new();

    table.register(
        K::Organization,
        InPlace,
        vec![
            A::required("name", String),
            A::optional("description", String),
        ],
    )?;

    table.register(
        K::Project,
        InPlace,
        vec![
            A::required("name", String),
            A::required("organization_id", String).references(K::Organization),
            A::optional("description", String),
        ],
    )?;

    table.register(
        K::Cluster,
        Replace,
        vec![
            A::required("name", String),
            A::required("region", String),
            A::optional("tier", String).with_default("standard"),
            A::optional("organization_id", String).references(K::Organization),
        ],
    )?;

    table.register(
        K::User,
        InPlace,
        vec![
            A::required("organization_id", String).references(K::Organization),
            A::optional("project_id", String).references(K::Project),
            A::required("email", String),
            A::optional("name", String),
            A::optional("roles", StringList),
        ],
    )?;

    table.register(
        K::JwtClaim,
        InPlace,
        vec![
            A::required("user_id", String).references(K::User),
            A::optional("permissions", StringList),
            A::computed("jwt", String),
        ],
    )?;

    table.register(
        K::Permission,
        InPlace,
        vec![
            A::required("subject", String),
            A::required("action", String),
            A::required("user_id", String).references(K::User),
            A::optional("allow", Bool).with_default(true),
        ],
    )?;

    table.register(
        K::Stream,
        InPlace,
        vec![
            A::required("name", String),
            A::required("cluster_id", String).references(K::Cluster),
            A::required("subjects", StringList),
            A::optional("max_msgs", Int).with_range(0, STREAM_LIMIT_MAX),
            A::optional("max_bytes", Int).with_range(0, STREAM_LIMIT_MAX),
            A::optional("max_age_seconds", Int).with_range(0, STREAM_LIMIT_MAX),
        ],
    )?;

    table.register(
        K::Consumer,
        Replace,
        vec![
            A::required("cluster_id", String).references(K::Cluster),
            A::required("stream_id", String).references(K::Stream),
            A::required("name", String),
            A::required("durable", String),
        ],
    )?;

    table.register(
        K::KvBucket,
        Replace,
        vec![
            A::required("cluster_id", String).references(K::Cluster),
            A::required("name", String),
            A::optional("max_value_size", Int).with_default(1024_i64),
        ],
    )?;

    table.register(
        K::ObjectStore,
        Replace,
        vec![
            A::required("cluster_id", String).references(K::Cluster),
            A::required("name", String),
        ],
    )?;

    table.register(
        K::ClusterGateway,
        Replace,
        vec![
            A::required("cluster_id", String).references(K::Cluster),
            A::required("remote_cluster_id", String).references(K::Cluster),
            A::required("name", String),
        ],
    )?;

    table.register(
        K::Leafnode,
        Replace,
        vec![
            A::required("cluster_id", String).references(K::Cluster),
            A::required("remote_url", String),
            A::required("name", String),
        ],
    )?;

    table.register(
        K::ServiceExport,
        Replace,
        vec![
            A::required("cluster_id", String).references(K::Cluster),
            A::required("name", String),
            A::required("subject", String),
            A::required("visibility", String),
        ],
    )?;

    table.register(
        K::ServiceImport,
        Replace,
        vec![
            A::required("cluster_id", String).references(K::Cluster),
            A::required("name", String),
            A::required("remote_cluster", String),
            A::required("subject_mapping", String),
        ],
    )?;

    Ok(table)
}
