//! `cpsync state` - inspect or edit recorded state

use anyhow::{Result, bail};
use colored::Colorize;

use crate::Context;
use crate::cli::StateCommand;
use crate::ui;

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    match cmd {
        StateCommand::List { json } => list(ctx, json),
        StateCommand::Show { key } => show(ctx, &key),
        StateCommand::Forget { keys } => forget(ctx, &keys),
    }
}

fn list(ctx: &Context, json: bool) -> Result<()> {
    let (path, state) = super::load_state(ctx)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state.resources)?);
        return Ok(());
    }

    if state.is_empty() {
        ui::info(&format!("No resources recorded in {}", path.display()));
        return Ok(());
    }

    ui::header(&format!("State ({})", ui::plural(state.len(), "resource")));
    let width = state.resources.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    for (key, recorded) in &state.resources {
        println!(
            "  {}  {:<16} {}",
            format!("{key:<width$}").bold(),
            recorded.kind.as_str(),
            recorded.remote_id.dimmed(),
        );
    }
    if ctx.verbose > 0 {
        println!();
        ui::dim(&path.display().to_string());
    }
    Ok(())
}

fn show(ctx: &Context, key: &str) -> Result<()> {
    let (_, state) = super::load_state(ctx)?;
    let Some(recorded) = state.get(key) else {
        bail!("'{key}' is not recorded in state");
    };

    ui::header(key);
    ui::kv("kind", recorded.kind.as_str());
    ui::kv("remote id", &recorded.remote_id);
    ui::kv("updated", &recorded.updated_at.to_rfc3339());

    if !recorded.attributes.is_empty() {
        ui::section("Attributes");
        for (name, value) in &recorded.attributes {
            ui::kv(name, &ui::truncate(&value.to_string(), 80));
        }
    }
    Ok(())
}

fn forget(ctx: &Context, keys: &[String]) -> Result<()> {
    let (path, mut state) = super::load_state(ctx)?;

    let missing: Vec<&str> = keys
        .iter()
        .filter(|k| state.get(k).is_none())
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        bail!("not recorded in state: {}", missing.join(", "));
    }

    for key in keys {
        if let Some(recorded) = state.forget(key) {
            log::info!("Forgot {}.{key} ({})", recorded.kind, recorded.remote_id);
        }
    }
    state.save(&path)?;

    ui::success(&format!(
        "Forgot {}; remote entities were left in place",
        ui::plural(keys.len(), "resource")
    ));
    Ok(())
}
