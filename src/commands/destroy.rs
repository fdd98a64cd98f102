//! `cpsync destroy` - delete recorded resources

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{Executor, ResourceKind};
use std::collections::BTreeSet;

use crate::Context;
use crate::cli::DestroyArgs;
use crate::commands::Recorder;
use crate::render;
use crate::state::State;
use crate::ui;

pub fn run(ctx: &Context, args: DestroyArgs) -> Result<()> {
    let manifest = super::load_manifest_or_default(&args.manifest)?;
    let (state_path, mut state) = super::load_state(ctx)?;

    if state.is_empty() {
        ui::info("Nothing is recorded in state; nothing to destroy.");
        return Ok(());
    }

    let targets = resolve_targets(&state, &args.target)?;

    if !ctx.quiet {
        ui::section("Will be deleted");
        let keys: Vec<&String> = match &targets {
            Some(targets) => targets.iter().collect(),
            None => state.resources.keys().collect(),
        };
        for key in keys {
            if let Some(recorded) = state.get(key) {
                println!(
                    "  {} {}.{} {}",
                    "-".red(),
                    recorded.kind,
                    key.bold(),
                    recorded.remote_id.dimmed()
                );
            }
        }
        if targets.is_some() {
            ui::dim("Recorded resources that depend on these are deleted too");
        }
        println!();
    }

    let mut confirm = super::confirmer(args.yes);
    if !confirm.confirm("Delete these resources from the control plane?")? {
        ui::warn("Destroy cancelled");
        return Ok(());
    }

    let table = super::table()?;
    let store = super::connect(&args.connection, &manifest.provider)?;
    let call = super::call_context(ctx, &args.connection);
    let options = super::batch_options(&args.retry, false, 1);
    let executor = Executor::new(&store, &table, &call).with_options(options);

    let known = state.known();
    let mut recorder = Recorder::new(&mut state, &state_path, ctx.quiet);
    let report = executor
        .destroy(&known, targets.as_deref(), &mut recorder)
        .map_err(super::batch_error)?;
    recorder.finish()?;

    render::print_failures(&report);
    render::print_summary(&report.summary);

    if !report.is_success() {
        bail!("{} could not be deleted", ui::plural(report.summary.failed, "resource"));
    }
    Ok(())
}

/// Expand `--target` values into recorded keys
///
/// Each value is a key, a kind (every recorded resource of it) or
/// "kind.key". No values means everything.
pub fn resolve_targets(state: &State, targets: &[String]) -> Result<Option<Vec<String>>> {
    if targets.is_empty() {
        return Ok(None);
    }

    let mut keys = BTreeSet::new();
    for target in targets {
        let matched = matching_keys(state, target);
        if matched.is_empty() {
            bail!("no recorded resource matches target '{target}'");
        }
        keys.extend(matched);
    }
    Ok(Some(keys.into_iter().collect()))
}

fn matching_keys(state: &State, target: &str) -> Vec<String> {
    if state.get(target).is_some() {
        return vec![target.to_string()];
    }

    if let Some((kind, key)) = target.split_once('.')
        && let Ok(kind) = kind.parse::<ResourceKind>()
    {
        return state
            .get(key)
            .filter(|recorded| recorded.kind == kind)
            .map(|_| vec![key.to_string()])
            .unwrap_or_default();
    }

    match target.parse::<ResourceKind>() {
        Ok(kind) => state
            .resources
            .iter()
            .filter(|(_, recorded)| recorded.kind == kind)
            .map(|(key, _)| key.clone())
            .collect(),
        Err(_) => Vec::new(),
    }
}
