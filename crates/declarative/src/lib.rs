//! # Declarative
//!
//! A lifecycle engine for declaratively managed remote resources.
//!
//! Callers declare the desired state of a batch of instances. The engine
//! validates it, orders it by the references between instances, and
//! converges the remote side through a [`RemoteStore`], reporting one
//! outcome per instance.
//!
//! ## Core Concepts
//!
//! - **Schema**: the attributes a kind accepts, with types, presence and defaults
//! - **Descriptor**: a kind's schema, mutability and lifecycle operations
//! - **Reconciler**: create/read/diff/update/replace/delete for one instance
//! - **ExecutionPlan**: a validated, dependency-ordered batch
//! - **Executor**: runs a plan, short-circuiting dependents of failures
//! - **Diagnostic**: a classified failure with a retryability decision
//!
//! ## Example
//!
//! ```
//! use declarative::{
//!     CallContext, ExecutionPlan, Executor, Instance, KnownResources, MemoryStore,
//!     NoProgress, ResourceKind, attributes, standard_table,
//! };
//!
//! let table = standard_table()?;
//! let store = MemoryStore::new();
//! let ctx = CallContext::new();
//!
//! let plan = ExecutionPlan::build(
//!     &table,
//!     vec![Instance::new(
//!         "prod",
//!         ResourceKind::Cluster,
//!         attributes([("name", "prod"), ("region", "us-east")]),
//!     )],
//!     &KnownResources::new(),
//! )?;
//!
//! let report = Executor::new(&store, &table, &ctx)
//!     .apply(&plan, &KnownResources::new(), &mut NoProgress);
//! assert_eq!(report.summary.created, 1);
//! assert_eq!(store.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Provider Traits
//!
//! - [`RemoteStore`]: typed CRUD access to the control plane
//! - [`ProgressCallback`]: receives progress updates
//! - [`ConfirmCallback`]: handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on a
//! transport or a terminal UI.

pub mod catalog;
pub mod context;
pub mod descriptor;
pub mod diagnostic;
pub mod diff;
pub mod executor;
pub mod kind;
pub mod memory;
pub mod orderer;
pub mod planner;
pub mod reconciler;
pub mod retry;
pub mod schema;
pub mod store;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use catalog::standard_table;
pub use context::{
    AutoConfirm, CallContext, CancelToken, ConfirmCallback, NoProgress, ProgressCallback,
};
pub use descriptor::{Descriptor, DescriptorTable, Mutability};
pub use diagnostic::{Diagnostic, DiagnosticKind, translate};
pub use diff::{AttributeChange, AttributeDiff, DiffSummary, group_by_kind};
pub use executor::{Executor, orphans};
pub use kind::{ResourceKind, UnknownKind};
pub use memory::{CallCounts, MemoryStore, Operation};
pub use orderer::{CyclicDependency, Node};
pub use planner::{BatchError, ExecutionPlan, Instance, KnownResource, KnownResources};
pub use reconciler::Reconciler;
pub use retry::RetryConfig;
pub use schema::{
    AttributeSpec, Presence, RegistryError, Schema, SchemaRegistry, SchemaViolation, ValueType,
    Violation,
};
pub use store::{ParentIds, RemoteError, RemoteId, RemoteStore};
pub use types::{
    BatchOptions, BatchReport, ExecuteSummary, InstanceResult, PlannedAction, PlannedChange,
    ReconcileOptions, ReconcileOutcome, Reconciliation,
};
pub use value::{Attributes, Value, attributes};
