//! `cpsync apply` - make the control plane match the manifest

use anyhow::{Result, bail};
use declarative::{DiffSummary, ExecuteSummary, Executor};

use crate::Context;
use crate::cli::ApplyArgs;
use crate::commands::Recorder;
use crate::commands::plan::orphan_changes;
use crate::render;
use crate::ui;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let (_, manifest) = super::load_manifest(&args.manifest)?;
    let (state_path, mut state) = super::load_state(ctx)?;
    let table = super::table()?;
    let known = super::known_resources(&state, &manifest);
    let plan = super::build_plan(&table, &manifest, &known, args.target.as_deref())?;

    let store = super::connect(&args.connection, &manifest.provider)?;
    let call = super::call_context(ctx, &args.connection);
    let options = super::batch_options(&args.retry, args.recreate_vanished, args.jobs);
    let executor = Executor::new(&store, &table, &call).with_options(options);

    let prune = if args.prune && args.target.is_some() {
        ui::warn("--prune is ignored together with --target");
        Vec::new()
    } else if args.prune {
        orphan_changes(&plan, &state)
    } else {
        Vec::new()
    };

    let mut changes = executor.preview(&plan, &known);
    changes.extend(prune.iter().cloned());
    let planned = DiffSummary::from_changes(&changes);

    if !ctx.quiet {
        render::print_plan(&changes, ctx.verbose > 0);
        println!();
        println!("{}", render::plan_summary(&planned));
    }

    if !planned.has_changes() {
        if planned.failures > 0 {
            bail!(
                "{} could not be planned",
                ui::plural(planned.failures, "resource")
            );
        }
        ui::success("No changes. The control plane matches the manifest.");
        return Ok(());
    }

    let mut confirm = super::confirmer(args.yes);
    if !confirm.confirm("Apply these changes?")? {
        ui::warn("Apply cancelled");
        return Ok(());
    }

    let mut summary = ExecuteSummary::default();

    let mut recorder = Recorder::new(&mut state, &state_path, ctx.quiet);
    let report = executor.apply(&plan, &known, &mut recorder);
    recorder.finish()?;
    summary.merge(&report.summary);
    render::print_failures(&report);

    if !prune.is_empty() {
        if report.is_success() {
            // Re-read what is recorded now; apply may have replaced entities
            let recorded = state.known();
            let targets: Vec<String> = prune
                .iter()
                .filter(|c| recorded.contains_key(&c.key))
                .map(|c| c.key.clone())
                .collect();

            let mut recorder = Recorder::new(&mut state, &state_path, ctx.quiet);
            let pruned = executor
                .destroy(&recorded, Some(targets.as_slice()), &mut recorder)
                .map_err(super::batch_error)?;
            recorder.finish()?;
            summary.merge(&pruned.summary);
            render::print_failures(&pruned);
        } else {
            ui::warn("Skipped pruning because apply had failures");
        }
    }

    render::print_summary(&summary);

    if !summary.is_success() {
        bail!("{} failed", ui::plural(summary.failed, "resource"));
    }
    Ok(())
}
