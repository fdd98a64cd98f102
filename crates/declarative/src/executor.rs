//! Execution engine - runs a validated plan against a remote store
//!
//! Instances run in plan order. Dependents of a failed instance are not
//! attempted, and after an authentication failure or cancellation nothing
//! else is. With `jobs > 1`, instances at the same dependency level run
//! on a bounded rayon pool; results are merged one level at a time.

use crate::context::{CallContext, ProgressCallback};
use crate::descriptor::{Descriptor, DescriptorTable, Mutability};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::diff::AttributeDiff;
use crate::kind::ResourceKind;
use crate::orderer::{self, Node};
use crate::planner::{BatchError, ExecutionPlan, KnownResources, PlannedInstance};
use crate::reconciler::Reconciler;
use crate::retry::with_retry;
use crate::store::{RemoteId, RemoteStore};
use crate::types::{
    BatchOptions, BatchReport, InstanceResult, PlannedAction, PlannedChange, Reconciliation,
};
use crate::value::{Attributes, Value};
use rayon::ThreadPool;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

/// Stand-in for references to instances that do not exist yet
const PENDING_ID: &str = "(known after apply)";

/// Runs plans against one store under one call context
pub struct Executor<'a> {
    store: &'a dyn RemoteStore,
    table: &'a DescriptorTable,
    ctx: &'a CallContext,
    options: BatchOptions,
}

/// Bookkeeping shared by every instance of a run
struct RunState {
    ids: HashMap<String, RemoteId>,
    failed: HashSet<String>,
    halted: Option<Diagnostic>,
    report: BatchReport,
}

impl RunState {
    fn new(known: &KnownResources) -> Self {
        Self {
            ids: known
                .iter()
                .map(|(key, k)| (key.clone(), k.remote_id.clone()))
                .collect(),
            failed: HashSet::new(),
            halted: None,
            report: BatchReport::default(),
        }
    }

    /// Why an instance must not run, if it must not
    fn blocked(&self, depends_on: &[&str], failure: impl Fn(&str) -> Diagnostic) -> Option<Diagnostic> {
        if let Some(halted) = &self.halted {
            return Some(halted.clone());
        }
        depends_on
            .iter()
            .find(|dep| self.failed.contains(**dep))
            .map(|dep| failure(dep))
    }

    fn record<P: ProgressCallback>(&mut self, result: InstanceResult, progress: &mut P) {
        match &result.remote_id {
            Some(id) => {
                self.ids.insert(result.key.clone(), id.clone());
            }
            None => {
                self.ids.remove(&result.key);
            }
        }

        if let Some(diagnostic) = result.outcome.diagnostic() {
            log::warn!("{}.{}: {}", result.kind, result.key, diagnostic);
            self.failed.insert(result.key.clone());
            if self.halted.is_none() {
                self.halted = halt_diagnostic(&result);
            }
        } else {
            log::info!("{}.{}: {}", result.kind, result.key, result.outcome);
        }

        progress.on_instance_complete(&result);
        self.report.push(result);
    }
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a dyn RemoteStore, table: &'a DescriptorTable, ctx: &'a CallContext) -> Self {
        Self {
            store,
            table,
            ctx,
            options: BatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    fn reconciler(&self) -> Reconciler<'a> {
        Reconciler::new(self.store).with_options(self.options.reconcile)
    }

    /// Reconcile every instance of `plan`
    ///
    /// `known` supplies remote IDs from previous passes and imports.
    pub fn apply<P: ProgressCallback>(
        &self,
        plan: &ExecutionPlan,
        known: &KnownResources,
        progress: &mut P,
    ) -> BatchReport {
        let pool = self.pool();
        let groups = match &pool {
            Some(_) => plan.levels(),
            None => (0..plan.len()).map(|i| vec![i]).collect(),
        };

        let mut state = RunState::new(known);
        progress.on_batch_start(plan.len());

        for group in groups {
            let mut runnable: Vec<(&PlannedInstance, Attributes)> = Vec::new();

            for &index in &group {
                let planned = &plan.instances()[index];
                let known_id = known.get(planned.key()).map(|k| k.remote_id.clone());
                let depends_on: Vec<&str> = planned.depends_on().collect();

                if let Some(diagnostic) = state.blocked(&depends_on, Diagnostic::dependency_failed) {
                    let result = InstanceResult::new(
                        planned.key(),
                        planned.kind(),
                        Reconciliation::failed(diagnostic, known_id),
                    );
                    state.record(result, progress);
                    continue;
                }

                match planned.resolve(|key| state.ids.get(key).cloned()) {
                    Ok(desired) => runnable.push((planned, desired)),
                    Err(missing) => {
                        let diagnostic = Diagnostic::new(
                            DiagnosticKind::DependencyFailed,
                            format!("dependency '{missing}' has no remote ID"),
                        );
                        let result = InstanceResult::new(
                            planned.key(),
                            planned.kind(),
                            Reconciliation::failed(diagnostic, known_id),
                        );
                        state.record(result, progress);
                    }
                }
            }

            let results: Vec<InstanceResult> = match &pool {
                Some(pool) if runnable.len() > 1 => {
                    // Set by the first fatal failure; siblings not yet started are skipped
                    let halt: OnceLock<Diagnostic> = OnceLock::new();
                    pool.install(|| {
                        runnable
                            .par_iter()
                            .map(|(planned, desired)| {
                                if let Some(diagnostic) = halt.get() {
                                    let known_id =
                                        known.get(planned.key()).map(|k| k.remote_id.clone());
                                    return InstanceResult::new(
                                        planned.key(),
                                        planned.kind(),
                                        Reconciliation::failed(diagnostic.clone(), known_id),
                                    );
                                }
                                let result = self.reconcile_one(planned, desired, known);
                                if let Some(diagnostic) = halt_diagnostic(&result) {
                                    let _ = halt.set(diagnostic);
                                }
                                result
                            })
                            .collect()
                    })
                }
                _ => runnable
                    .iter()
                    .map(|(planned, desired)| {
                        progress.on_instance_start(planned.key(), planned.kind());
                        self.reconcile_one(planned, desired, known)
                    })
                    .collect(),
            };

            for result in results {
                state.record(result, progress);
            }
        }

        progress.on_batch_complete();
        state.report
    }

    fn reconcile_one(
        &self,
        planned: &PlannedInstance,
        desired: &Attributes,
        known: &KnownResources,
    ) -> InstanceResult {
        let Some(descriptor) = self.table.get(planned.kind()) else {
            return unsupported(planned.key(), planned.kind());
        };

        let reconciler = self.reconciler();
        let mut current = known.get(planned.key()).map(|k| k.remote_id.clone());
        let reconciliation = with_retry(
            &self.options.retry,
            self.ctx,
            || {
                let result = reconciler.reconcile(self.ctx, descriptor, desired, current.as_deref());
                current.clone_from(&result.remote_id);
                result
            },
            |r| self.options.should_retry(&r.outcome),
        );

        InstanceResult::new(planned.key(), planned.kind(), reconciliation)
    }

    /// What [`apply`](Self::apply) would do, issuing reads only
    pub fn preview(&self, plan: &ExecutionPlan, known: &KnownResources) -> Vec<PlannedChange> {
        let reconciler = self.reconciler();

        plan.instances()
            .iter()
            .map(|planned| {
                let action = match self.table.get(planned.kind()) {
                    Some(descriptor) => {
                        let desired = planned
                            .resolve(|key| {
                                Some(
                                    known
                                        .get(key)
                                        .map_or_else(|| PENDING_ID.to_string(), |k| k.remote_id.clone()),
                                )
                            })
                            .unwrap_or_else(|_| planned.instance.desired.clone());
                        let parent_pending =
                            planned.depends_on().any(|key| !known.contains_key(key));
                        match known.get(planned.key()) {
                            // A read would need an ID that does not exist yet
                            Some(snapshot) if parent_pending => {
                                planned_from_snapshot(descriptor, &desired, &snapshot.attributes)
                            }
                            snapshot => reconciler.preview(
                                self.ctx,
                                descriptor,
                                &desired,
                                snapshot.map(|k| k.remote_id.as_str()),
                            ),
                        }
                    }
                    None => PlannedAction::Failed {
                        diagnostic: unsupported_diagnostic(planned.kind()),
                    },
                };

                PlannedChange {
                    key: planned.key().to_string(),
                    kind: planned.kind(),
                    action,
                }
            })
            .collect()
    }

    /// Delete known resources, dependents first
    ///
    /// With `targets`, only the named keys and every known resource that
    /// depends on them are deleted. When a delete fails, the resources it
    /// depends on are kept.
    pub fn destroy<P: ProgressCallback>(
        &self,
        known: &KnownResources,
        targets: Option<&[String]>,
        progress: &mut P,
    ) -> Result<BatchReport, BatchError> {
        let nodes = known_graph(self.table, known);
        let selected = match targets {
            None => known.keys().cloned().collect::<BTreeSet<_>>(),
            Some(targets) => with_dependents(&nodes, targets)?,
        };

        let nodes: Vec<Node> = nodes
            .into_iter()
            .filter(|n| selected.contains(&n.key))
            .collect();
        let order = orderer::order_reversed(&nodes)?;

        // Reverse edges: who depends on each node
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in &nodes {
            for dep in &node.depends_on {
                dependents.entry(dep.as_str()).or_default().push(node.key.as_str());
            }
        }

        let reconciler = self.reconciler();
        let mut state = RunState::new(known);
        progress.on_batch_start(order.len());

        for index in order {
            let key = nodes[index].key.as_str();
            let Some(resource) = known.get(key) else {
                continue;
            };
            let blockers = dependents.get(key).cloned().unwrap_or_default();

            let reconciliation = if let Some(diagnostic) = state.blocked(&blockers, |dependent| {
                Diagnostic::new(
                    DiagnosticKind::DependencyFailed,
                    format!("dependent '{dependent}' was not deleted"),
                )
            }) {
                Reconciliation::failed(diagnostic, Some(resource.remote_id.clone()))
            } else if let Some(descriptor) = self.table.get(resource.kind) {
                progress.on_instance_start(key, resource.kind);
                let parents = descriptor.parent_ids(&resource.attributes);
                with_retry(
                    &self.options.retry,
                    self.ctx,
                    || reconciler.retire(self.ctx, descriptor, &parents, &resource.remote_id),
                    |r| self.options.should_retry(&r.outcome),
                )
            } else {
                Reconciliation::failed(
                    unsupported_diagnostic(resource.kind),
                    Some(resource.remote_id.clone()),
                )
            };

            state.record(InstanceResult::new(key, resource.kind, reconciliation), progress);
        }

        progress.on_batch_complete();
        Ok(state.report)
    }

    fn pool(&self) -> Option<ThreadPool> {
        if self.options.jobs <= 1 {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                log::warn!("Failed to create thread pool, running sequentially: {e}");
                None
            }
        }
    }
}

/// Known resources that the plan neither declares nor references
pub fn orphans(plan: &ExecutionPlan, known: &KnownResources) -> Vec<String> {
    let referenced = plan.referenced_keys();
    known
        .keys()
        .filter(|key| !plan.contains(key) && !referenced.contains(key.as_str()))
        .cloned()
        .collect()
}

/// Dependency graph between known resources, derived from the remote IDs
/// held in their reference attributes
fn known_graph(table: &DescriptorTable, known: &KnownResources) -> Vec<Node> {
    let by_id: HashMap<&str, &str> = known
        .iter()
        .map(|(key, k)| (k.remote_id.as_str(), key.as_str()))
        .collect();

    known
        .iter()
        .map(|(key, resource)| {
            let depends_on: Vec<&str> = table
                .get(resource.kind)
                .map(|d| d.dependency_references())
                .unwrap_or_default()
                .iter()
                .filter_map(|r| resource.attributes.get(&r.attribute).and_then(Value::as_str))
                .filter_map(|id| by_id.get(id).copied())
                .filter(|dep| *dep != key.as_str())
                .collect();
            Node::new(key, depends_on)
        })
        .collect()
}

/// `targets` plus every node that transitively depends on one of them
fn with_dependents(nodes: &[Node], targets: &[String]) -> Result<BTreeSet<String>, BatchError> {
    let mut selected = BTreeSet::new();
    for target in targets {
        if !nodes.iter().any(|n| &n.key == target) {
            return Err(BatchError::UnknownTarget(target.clone()));
        }
        selected.insert(target.clone());
    }

    loop {
        let before = selected.len();
        for node in nodes {
            if node.depends_on.iter().any(|d| selected.contains(d)) {
                selected.insert(node.key.clone());
            }
        }
        if selected.len() == before {
            return Ok(selected);
        }
    }
}

/// Plan a known instance against its recorded snapshot instead of a read
fn planned_from_snapshot(
    descriptor: &Descriptor,
    desired: &Attributes,
    snapshot: &Attributes,
) -> PlannedAction {
    let effective = descriptor.schema().effective(desired);
    let diff = AttributeDiff::compute(descriptor.schema(), &effective, snapshot);
    if diff.is_empty() {
        PlannedAction::NoChange
    } else if descriptor.mutability() == Mutability::InPlace {
        PlannedAction::Update { diff }
    } else {
        PlannedAction::Replace { diff }
    }
}

/// What the rest of the run reports after `result`, if `result` ends it
fn halt_diagnostic(result: &InstanceResult) -> Option<Diagnostic> {
    let diagnostic = result.outcome.diagnostic()?;
    if !diagnostic.kind.is_fatal() {
        return None;
    }
    Some(match diagnostic.kind {
        DiagnosticKind::Cancelled => Diagnostic::cancelled(),
        kind => Diagnostic::new(
            DiagnosticKind::Aborted,
            format!("not attempted after {kind} on '{}'", result.key),
        ),
    })
}

fn unsupported_diagnostic(kind: ResourceKind) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::Unsupported,
        format!("no descriptor registered for {kind}"),
    )
}

fn unsupported(key: &str, kind: ResourceKind) -> InstanceResult {
    InstanceResult::new(key, kind, Reconciliation::failed(unsupported_diagnostic(kind), None))
}
