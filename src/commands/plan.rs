//! `cpsync plan` - preview what apply would change

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{
    BatchOptions, DiffSummary, ExecutionPlan, Executor, PlannedAction, PlannedChange,
    ReconcileOptions, orphans,
};

use crate::Context;
use crate::cli::PlanArgs;
use crate::render;
use crate::state::State;
use crate::ui;

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let (_, manifest) = super::load_manifest(&args.manifest)?;
    let (_, state) = super::load_state(ctx)?;
    let table = super::table()?;
    let known = super::known_resources(&state, &manifest);
    let plan = super::build_plan(&table, &manifest, &known, args.target.as_deref())?;

    let store = super::connect(&args.connection, &manifest.provider)?;
    let call = super::call_context(ctx, &args.connection);
    let options = BatchOptions {
        reconcile: ReconcileOptions {
            recreate_vanished: args.recreate_vanished,
        },
        ..BatchOptions::default()
    };
    let executor = Executor::new(&store, &table, &call).with_options(options);

    let changes = executor.preview(&plan, &known);
    let undeclared = if args.target.is_none() {
        orphan_changes(&plan, &state)
    } else {
        Vec::new()
    };
    let summary = DiffSummary::from_changes(&changes);

    if args.json {
        let output = serde_json::json!({
            "changes": changes,
            "undeclared": undeclared,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text(ctx, &changes, &undeclared, &summary);
    }

    if summary.failures > 0 {
        bail!(
            "{} could not be planned",
            ui::plural(summary.failures, "resource")
        );
    }
    Ok(())
}

fn print_text(
    ctx: &Context,
    changes: &[PlannedChange],
    undeclared: &[PlannedChange],
    summary: &DiffSummary,
) {
    render::print_plan(changes, ctx.verbose > 0);

    if !undeclared.is_empty() {
        ui::section("Recorded but no longer declared");
        for change in undeclared {
            println!("  {} {}.{}", "?".dimmed(), change.kind, change.key.bold());
        }
        ui::dim("apply --prune deletes these");
    }

    println!();
    if !summary.has_changes() && summary.failures == 0 {
        ui::success("No changes. The control plane matches the manifest.");
    } else {
        println!("{}", render::plan_summary(summary));
    }
}

/// Delete actions for recorded resources the plan neither declares nor
/// references
///
/// Only state entries are candidates; imports are never deleted.
pub fn orphan_changes(plan: &ExecutionPlan, state: &State) -> Vec<PlannedChange> {
    orphans(plan, &state.known())
        .into_iter()
        .filter_map(|key| {
            state.get(&key).map(|recorded| PlannedChange {
                kind: recorded.kind,
                key,
                action: PlannedAction::Delete,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Manifest, ManifestFormat};
    use declarative::{
        AttributeDiff, InstanceResult, KnownResources, ReconcileOutcome, Reconciliation,
        ResourceKind, standard_table,
    };

    fn record(state: &mut State, key: &str, kind: ResourceKind, id: &str) {
        state.record(&InstanceResult::new(
            key,
            kind,
            Reconciliation {
                outcome: ReconcileOutcome::Created {
                    id: id.to_string(),
                    diff: AttributeDiff::default(),
                },
                remote_id: Some(id.to_string()),
                observed: None,
            },
        ));
    }

    #[test]
    fn test_orphan_changes_skip_declared_and_referenced() {
        let manifest = Manifest::parse(
            r#"
[[resource]]
key = "acme"
kind = "organization"
name = "acme"

[[resource]]
key = "web"
kind = "project"
name = "web"
organization_id = "acme"
"#,
            ManifestFormat::Toml,
        )
        .unwrap();

        let mut state = State::default();
        record(&mut state, "acme", ResourceKind::Organization, "org_1");
        record(&mut state, "old", ResourceKind::Project, "prj_9");

        let table = standard_table().unwrap();
        let plan =
            ExecutionPlan::build(&table, manifest.instances(), &KnownResources::new()).unwrap();

        let orphaned = orphan_changes(&plan, &state);
        assert_eq!(orphaned.len(), 1);
        assert_eq!(orphaned[0].key, "old");
        assert_eq!(orphaned[0].kind, ResourceKind::Project);
        assert_eq!(orphaned[0].action, PlannedAction::Delete);
    }
}
