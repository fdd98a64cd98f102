//! Plan and report rendering

use crate::ui;
use colored::{ColoredString, Colorize};
use declarative::{
    BatchReport, DiffSummary, ExecuteSummary, PlannedAction, PlannedChange, group_by_kind,
};

/// Print planned changes grouped by kind; unchanged resources only when
/// `verbose`
pub fn print_plan(changes: &[PlannedChange], verbose: bool) {
    for (kind, group) in group_by_kind(changes) {
        let visible: Vec<_> = group
            .into_iter()
            .filter(|c| verbose || c.action != PlannedAction::NoChange)
            .collect();
        if visible.is_empty() {
            continue;
        }

        ui::section(kind.as_str());
        for change in visible {
            println!("{}", plan_line(change));
            for detail in plan_details(&change.action) {
                println!("        {}", detail.dimmed());
            }
        }
    }
}

fn symbol(action: &PlannedAction) -> ColoredString {
    let symbol = format!("{:>3}", action.symbol());
    let symbol = symbol.as_str();
    match action {
        PlannedAction::NoChange => symbol.normal(),
        PlannedAction::Create | PlannedAction::Recreate => symbol.green(),
        PlannedAction::Update { .. } | PlannedAction::Replace { .. } => symbol.yellow(),
        PlannedAction::Delete | PlannedAction::Vanished | PlannedAction::Failed { .. } => {
            symbol.red()
        }
    }
}

/// Headline for one planned change
pub fn plan_line(change: &PlannedChange) -> String {
    let what = match &change.action {
        PlannedAction::NoChange => "unchanged".to_string(),
        PlannedAction::Create => "will be created".to_string(),
        PlannedAction::Recreate => "vanished remotely, will be created again".to_string(),
        PlannedAction::Update { diff } => format!("will be updated in place ({})", diff.len()),
        PlannedAction::Replace { diff } => format!("must be replaced ({})", diff.len()),
        PlannedAction::Vanished => "vanished remotely (use --recreate-vanished)".to_string(),
        PlannedAction::Delete => "will be deleted".to_string(),
        PlannedAction::Failed { diagnostic } => format!("cannot be planned: {diagnostic}"),
    };
    format!("  {} {} {}", symbol(&change.action), change.key.bold(), what)
}

/// Attribute changes and advice lines under a headline
pub fn plan_details(action: &PlannedAction) -> Vec<String> {
    match action {
        PlannedAction::Update { diff } | PlannedAction::Replace { diff } => {
            diff.changes.iter().map(ToString::to_string).collect()
        }
        PlannedAction::Failed { diagnostic } => vec![diagnostic.kind.advice().to_string()],
        _ => Vec::new(),
    }
}

/// "Plan: 1 to create, ..." footer
pub fn plan_summary(summary: &DiffSummary) -> String {
    let mut line = format!(
        "Plan: {} to create, {} to update, {} to replace, {} to delete",
        summary.creations, summary.updates, summary.replacements, summary.deletions
    );
    if summary.failures > 0 {
        line.push_str(&format!(", {} with problems", summary.failures));
    }
    line
}

/// Print the totals of an apply or destroy run
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Control plane is in sync", "✓".green().bold());
    } else {
        println!("  {} Finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} created", ui::plural(summary.created, "resource"));
    }
    if summary.updated > 0 {
        println!("    • {} updated", ui::plural(summary.updated, "resource"));
    }
    if summary.replaced > 0 {
        println!("    • {} replaced", ui::plural(summary.replaced, "resource"));
    }
    if summary.deleted > 0 {
        println!("    • {} deleted", ui::plural(summary.deleted, "resource"));
    }
    if summary.no_change > 0 {
        println!("    • {} unchanged", ui::plural(summary.no_change, "resource"));
    }
    if summary.failed > 0 {
        println!(
            "    • {} {}",
            ui::plural(summary.failed, "resource"),
            "failed".red()
        );
    }
}

/// Print each failure with its advice
pub fn print_failures(report: &BatchReport) {
    let failures: Vec<_> = report.failures().collect();
    if failures.is_empty() {
        return;
    }

    ui::section("Failures");
    for result in failures {
        if let Some(diagnostic) = result.outcome.diagnostic() {
            println!(
                "  {} {}.{}: {}",
                "✗".red(),
                result.kind,
                result.key,
                diagnostic
            );
            ui::dim(&format!("  {}", diagnostic.kind.advice()));
        }
    }
}
