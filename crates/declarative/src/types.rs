//! Core types for reconciliation results and plans

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::diff::AttributeDiff;
use crate::kind::ResourceKind;
use crate::retry::RetryConfig;
use crate::store::RemoteId;
use crate::value::Attributes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of reconciling or retiring one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Remote state already matches
    NoChange,
    /// A new remote entity was created
    Created { id: RemoteId, diff: AttributeDiff },
    /// The entity was updated in place
    Updated { diff: AttributeDiff },
    /// The entity was deleted and created again under a new ID
    Replaced { id: RemoteId, diff: AttributeDiff },
    /// The entity was deleted
    Deleted,
    /// Reconciliation failed
    Failed { diagnostic: Diagnostic },
}

impl ReconcileOutcome {
    pub fn failed(diagnostic: Diagnostic) -> Self {
        Self::Failed { diagnostic }
    }

    /// Check if the outcome represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the outcome represents a change to remote state
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created { .. } | Self::Updated { .. } | Self::Replaced { .. } | Self::Deleted
        )
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Failed { diagnostic } => Some(diagnostic),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoChange => "unchanged",
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Replaced { .. } => "replaced",
            Self::Deleted => "deleted",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created { id, .. } => write!(f, "created ({id})"),
            Self::Replaced { id, .. } => write!(f, "replaced ({id})"),
            Self::Updated { diff } => write!(f, "updated ({} attributes)", diff.len()),
            Self::Failed { diagnostic } => write!(f, "failed: {diagnostic}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Outcome of one reconciliation together with the resulting remote state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub outcome: ReconcileOutcome,
    /// The entity's ID after the pass; `None` when it does not exist
    pub remote_id: Option<RemoteId>,
    /// Last observed attributes, when a read or write returned them
    pub observed: Option<Attributes>,
}

impl Reconciliation {
    /// A failure that leaves the known remote ID in place
    pub fn failed(diagnostic: Diagnostic, remote_id: Option<RemoteId>) -> Self {
        Self {
            outcome: ReconcileOutcome::failed(diagnostic),
            remote_id,
            observed: None,
        }
    }
}

/// Result for one instance of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceResult {
    pub key: String,
    pub kind: ResourceKind,
    pub outcome: ReconcileOutcome,
    pub remote_id: Option<RemoteId>,
    pub observed: Option<Attributes>,
}

impl InstanceResult {
    pub fn new(key: &str, kind: ResourceKind, reconciliation: Reconciliation) -> Self {
        Self {
            key: key.to_string(),
            kind,
            outcome: reconciliation.outcome,
            remote_id: reconciliation.remote_id,
            observed: reconciliation.observed,
        }
    }

    pub fn diagnostic_kind(&self) -> Option<DiagnosticKind> {
        self.outcome.diagnostic().map(|d| d.kind)
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub no_change: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.replaced + self.deleted
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of instances processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.no_change + self.failed
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.replaced += other.replaced;
        self.deleted += other.deleted;
        self.no_change += other.no_change;
        self.failed += other.failed;
    }

    /// Add an outcome to the summary
    pub fn add_outcome(&mut self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::NoChange => self.no_change += 1,
            ReconcileOutcome::Created { .. } => self.created += 1,
            ReconcileOutcome::Updated { .. } => self.updated += 1,
            ReconcileOutcome::Replaced { .. } => self.replaced += 1,
            ReconcileOutcome::Deleted => self.deleted += 1,
            ReconcileOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Per-instance results of a batch, in execution order
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub results: Vec<InstanceResult>,
    pub summary: ExecuteSummary,
}

impl BatchReport {
    pub fn push(&mut self, result: InstanceResult) {
        self.summary.add_outcome(&result.outcome);
        self.results.push(result);
    }

    pub fn get(&self, key: &str) -> Option<&InstanceResult> {
        self.results.iter().find(|r| r.key == key)
    }

    pub fn failures(&self) -> impl Iterator<Item = &InstanceResult> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }
}

/// What a pass would do to one instance, determined without mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    NoChange,
    Create,
    Update { diff: AttributeDiff },
    Replace { diff: AttributeDiff },
    /// The known entity is gone and would be created again
    Recreate,
    /// The known entity is gone and recreation is disabled
    Vanished,
    Delete,
    Failed { diagnostic: Diagnostic },
}

impl PlannedAction {
    pub fn diff(&self) -> Option<&AttributeDiff> {
        match self {
            Self::Update { diff } | Self::Replace { diff } => Some(diff),
            _ => None,
        }
    }

    /// Symbol used when rendering a plan
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::NoChange => " ",
            Self::Create | Self::Recreate => "+",
            Self::Update { .. } => "~",
            Self::Replace { .. } => "-/+",
            Self::Delete => "-",
            Self::Vanished | Self::Failed { .. } => "!",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedChange {
    pub key: String,
    pub kind: ResourceKind,
    #[serde(flatten)]
    pub action: PlannedAction,
}

/// Options that change how the reconciler treats drift
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Create a new entity when a known one has vanished
    pub recreate_vanished: bool,
}

/// Options for batch execution
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub reconcile: ReconcileOptions,
    /// Retry policy for retryable diagnostics
    pub retry: RetryConfig,
    /// Also retry `Conflict` failures (the next attempt re-reads first)
    pub retry_conflicts: bool,
    /// Worker count for instances at the same dependency level; 1 runs
    /// strictly sequentially
    pub jobs: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            reconcile: ReconcileOptions::default(),
            retry: RetryConfig::no_retry(),
            retry_conflicts: false,
            jobs: 1,
        }
    }
}

impl BatchOptions {
    /// Whether a failed outcome should be attempted again
    pub fn should_retry(&self, outcome: &ReconcileOutcome) -> bool {
        outcome.diagnostic().is_some_and(|d| {
            d.retryable || (self.retry_conflicts && d.kind == DiagnosticKind::Conflict)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_predicates() {
        assert!(ReconcileOutcome::NoChange.is_success());
        assert!(!ReconcileOutcome::NoChange.is_change());
        assert!(ReconcileOutcome::Deleted.is_change());

        let failed = ReconcileOutcome::failed(Diagnostic::cancelled());
        assert!(!failed.is_success());
        assert_eq!(failed.diagnostic().map(|d| d.kind), Some(DiagnosticKind::Cancelled));
    }

    #[test]
    fn test_summary_add_and_merge() {
        let mut summary = ExecuteSummary::default();
        summary.add_outcome(&ReconcileOutcome::Created {
            id: "c1".into(),
            diff: AttributeDiff::default(),
        });
        summary.add_outcome(&ReconcileOutcome::NoChange);
        summary.add_outcome(&ReconcileOutcome::failed(Diagnostic::cancelled()));

        assert_eq!(summary.total_changes(), 1);
        assert_eq!(summary.total(), 3);
        assert!(!summary.is_success());

        let mut other = ExecuteSummary::default();
        other.merge(&summary);
        assert_eq!(other, summary);
    }

    #[test]
    fn test_should_retry() {
        let mut options = BatchOptions::default();
        let transient =
            ReconcileOutcome::failed(Diagnostic::new(DiagnosticKind::Transient, "503"));
        let conflict = ReconcileOutcome::failed(Diagnostic::new(DiagnosticKind::Conflict, "409"));

        assert!(options.should_retry(&transient));
        assert!(!options.should_retry(&conflict));
        assert!(!options.should_retry(&ReconcileOutcome::NoChange));

        options.retry_conflicts = true;
        assert!(options.should_retry(&conflict));
    }

    #[test]
    fn test_planned_change_serializes_flat() {
        let change = PlannedChange {
            key: "prod".into(),
            kind: ResourceKind::Cluster,
            action: PlannedAction::Create,
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["action"], "create");
        assert_eq!(json["kind"], "cluster");
    }
}
