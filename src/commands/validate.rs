//! `cpsync validate` - check a manifest offline

use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::cli::ManifestArgs;
use crate::commands::plan::orphan_changes;
use crate::ui;

pub fn run(ctx: &Context, args: ManifestArgs) -> Result<()> {
    let (path, manifest) = super::load_manifest(&args)?;
    let (_, state) = super::load_state(ctx)?;
    let table = super::table()?;
    let known = super::known_resources(&state, &manifest);
    let plan = super::build_plan(&table, &manifest, &known, None)?;

    if ctx.quiet {
        return Ok(());
    }

    ui::success(&format!(
        "{} is valid: {}, {}",
        path.display(),
        ui::plural(plan.len(), "resource"),
        ui::plural(manifest.imports.len(), "import")
    ));

    if ctx.verbose > 0 {
        ui::section("Apply order");
        for (level, indices) in plan.levels().iter().enumerate() {
            let names: Vec<String> = indices
                .iter()
                .map(|&i| {
                    let instance = &plan.instances()[i];
                    format!("{}.{}", instance.kind(), instance.key())
                })
                .collect();
            println!("  {} {}", format!("{}.", level + 1).dimmed(), names.join(", "));
        }
    }

    let undeclared = orphan_changes(&plan, &state);
    if !undeclared.is_empty() {
        ui::info(&format!(
            "{} recorded in state but no longer declared (apply --prune deletes them)",
            ui::plural(undeclared.len(), "resource")
        ));
    }
    Ok(())
}
