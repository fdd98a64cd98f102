//! Reconciler
//!
//! Drives one instance through its lifecycle: validates the desired
//! state, reads the remote entity when one is known, diffs, and issues
//! the single operation that closes the gap.
//!
//! Desired state passed in here must already have its reference
//! attributes resolved to remote IDs.

use crate::context::CallContext;
use crate::descriptor::{Descriptor, Mutability};
use crate::diagnostic::{Diagnostic, DiagnosticKind, translate};
use crate::diff::AttributeDiff;
use crate::schema::SchemaViolation;
use crate::store::{ParentIds, RemoteStore};
use crate::types::{PlannedAction, ReconcileOptions, ReconcileOutcome, Reconciliation};
use crate::value::Attributes;

pub struct Reconciler<'a> {
    store: &'a dyn RemoteStore,
    options: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn RemoteStore) -> Self {
        Self {
            store,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Bring the remote entity in line with `desired`
    ///
    /// `known_id` is the entity's remote ID from a previous pass, if any.
    pub fn reconcile(
        &self,
        ctx: &CallContext,
        descriptor: &Descriptor,
        desired: &Attributes,
        known_id: Option<&str>,
    ) -> Reconciliation {
        let known = known_id.map(str::to_string);

        if let Err(violation) = validate(descriptor, desired) {
            return Reconciliation::failed(schema_diagnostic(&violation), known);
        }

        let effective = descriptor.schema().effective(desired);
        let parents = descriptor.parent_ids(&effective);

        let Some(id) = known_id else {
            return self.create(ctx, descriptor, &parents, &effective);
        };

        let observed = match descriptor.read(self.store, ctx, &parents, id) {
            Ok(observed) => observed,
            Err(e) if e.is_not_found() => {
                if self.options.recreate_vanished {
                    log::info!("{} {} vanished, creating it again", descriptor.kind(), id);
                    return self.create(ctx, descriptor, &parents, &effective);
                }
                return Reconciliation::failed(Diagnostic::vanished(id), known);
            }
            Err(e) => return Reconciliation::failed(translate(&e), known),
        };

        let diff = AttributeDiff::compute(descriptor.schema(), &effective, &observed);
        if diff.is_empty() {
            return Reconciliation {
                outcome: ReconcileOutcome::NoChange,
                remote_id: known,
                observed: Some(observed),
            };
        }

        log::debug!(
            "{} {} drifted: {}",
            descriptor.kind(),
            id,
            diff.names().join(", ")
        );

        match descriptor.mutability() {
            Mutability::InPlace => {
                match descriptor.update(self.store, ctx, &parents, id, &effective) {
                    Ok(updated) => Reconciliation {
                        outcome: ReconcileOutcome::Updated { diff },
                        remote_id: known,
                        observed: Some(updated),
                    },
                    Err(e) => Reconciliation {
                        outcome: ReconcileOutcome::failed(translate(&e)),
                        remote_id: known,
                        observed: Some(observed),
                    },
                }
            }
            Mutability::Replace => self.replace(ctx, descriptor, &parents, id, &effective, diff),
        }
    }

    /// Delete the remote entity; an entity that is already gone counts as
    /// deleted
    pub fn retire(
        &self,
        ctx: &CallContext,
        descriptor: &Descriptor,
        parents: &ParentIds,
        id: &str,
    ) -> Reconciliation {
        match descriptor.delete(self.store, ctx, parents, id) {
            Ok(()) => deleted(),
            Err(e) if e.is_not_found() => {
                log::debug!("{} {} already gone", descriptor.kind(), id);
                deleted()
            }
            Err(e) => Reconciliation::failed(translate(&e), Some(id.to_string())),
        }
    }

    /// Determine what [`reconcile`](Self::reconcile) would do, issuing
    /// reads only
    pub fn preview(
        &self,
        ctx: &CallContext,
        descriptor: &Descriptor,
        desired: &Attributes,
        known_id: Option<&str>,
    ) -> PlannedAction {
        if let Err(violation) = validate(descriptor, desired) {
            return PlannedAction::Failed {
                diagnostic: schema_diagnostic(&violation),
            };
        }

        let Some(id) = known_id else {
            return PlannedAction::Create;
        };

        let effective = descriptor.schema().effective(desired);
        let parents = descriptor.parent_ids(&effective);

        match descriptor.read(self.store, ctx, &parents, id) {
            Ok(observed) => {
                let diff = AttributeDiff::compute(descriptor.schema(), &effective, &observed);
                if diff.is_empty() {
                    PlannedAction::NoChange
                } else if descriptor.mutability() == Mutability::InPlace {
                    PlannedAction::Update { diff }
                } else {
                    PlannedAction::Replace { diff }
                }
            }
            Err(e) if e.is_not_found() => {
                if self.options.recreate_vanished {
                    PlannedAction::Recreate
                } else {
                    PlannedAction::Vanished
                }
            }
            Err(e) => PlannedAction::Failed {
                diagnostic: translate(&e),
            },
        }
    }

    fn create(
        &self,
        ctx: &CallContext,
        descriptor: &Descriptor,
        parents: &ParentIds,
        effective: &Attributes,
    ) -> Reconciliation {
        match descriptor.create(self.store, ctx, parents, effective) {
            Ok((id, observed)) => {
                let diff = AttributeDiff::compute(descriptor.schema(), effective, &observed);
                Reconciliation {
                    outcome: ReconcileOutcome::Created {
                        id: id.clone(),
                        diff,
                    },
                    remote_id: Some(id),
                    observed: Some(observed),
                }
            }
            Err(e) => Reconciliation::failed(translate(&e), None),
        }
    }

    fn replace(
        &self,
        ctx: &CallContext,
        descriptor: &Descriptor,
        parents: &ParentIds,
        id: &str,
        effective: &Attributes,
        diff: AttributeDiff,
    ) -> Reconciliation {
        match descriptor.delete(self.store, ctx, parents, id) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Reconciliation::failed(translate(&e), Some(id.to_string())),
        }

        let created = self.create(ctx, descriptor, parents, effective);
        match created.outcome {
            ReconcileOutcome::Created { id: new_id, .. } => Reconciliation {
                outcome: ReconcileOutcome::Replaced { id: new_id, diff },
                ..created
            },
            _ => created,
        }
    }
}

fn validate(descriptor: &Descriptor, desired: &Attributes) -> Result<(), SchemaViolation> {
    let violations = descriptor.schema().check(desired);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaViolation {
            kind: descriptor.kind(),
            violations,
        })
    }
}

fn schema_diagnostic(violation: &SchemaViolation) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::SchemaViolation, violation.to_string())
}

fn deleted() -> Reconciliation {
    Reconciliation {
        outcome: ReconcileOutcome::Deleted,
        remote_id: None,
        observed: None,
    }
}
