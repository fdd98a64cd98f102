//! Progress reporting for batch runs

use colored::Colorize;
use declarative::{InstanceResult, ProgressCallback, ReconcileOutcome, ResourceKind};
use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar for a batch, printing one line per changed or failed
/// instance
pub struct BatchProgress {
    bar: ProgressBar,
    quiet: bool,
}

impl BatchProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template(TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            bar
        };
        Self { bar, quiet }
    }

    fn print(&self, line: String) {
        if !self.quiet {
            self.bar.suspend(|| println!("{line}"));
        }
    }
}

impl ProgressCallback for BatchProgress {
    fn on_batch_start(&mut self, count: usize) {
        self.bar.set_length(count as u64);
        self.bar.set_position(0);
    }

    fn on_instance_start(&mut self, key: &str, kind: ResourceKind) {
        self.bar.set_message(format!("{kind}.{key}"));
    }

    fn on_instance_complete(&mut self, result: &InstanceResult) {
        self.bar.inc(1);
        if let Some(line) = outcome_line(result) {
            self.print(line);
        }
    }

    fn on_batch_complete(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// One line describing what happened, or `None` for an unchanged instance
pub fn outcome_line(result: &InstanceResult) -> Option<String> {
    let name = format!("{}.{}", result.kind, result.key);
    let line = match &result.outcome {
        ReconcileOutcome::NoChange => return None,
        ReconcileOutcome::Created { id, .. } => {
            format!("  {} {} created ({})", "+".green(), name, id.dimmed())
        }
        ReconcileOutcome::Updated { diff } => format!(
            "  {} {} updated ({})",
            "~".yellow(),
            name,
            diff.names().join(", ").dimmed()
        ),
        ReconcileOutcome::Replaced { id, .. } => {
            format!("  {} {} replaced ({})", "±".yellow(), name, id.dimmed())
        }
        ReconcileOutcome::Deleted => format!("  {} {} deleted", "-".red(), name),
        ReconcileOutcome::Failed { diagnostic } => format!(
            "  {} {} {}: {}",
            "✗".red(),
            name,
            diagnostic.kind.as_str().red(),
            diagnostic.message
        ),
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{AttributeDiff, Diagnostic, DiagnosticKind, Reconciliation};

    fn result(outcome: ReconcileOutcome) -> InstanceResult {
        InstanceResult::new(
            "prod",
            ResourceKind::Cluster,
            Reconciliation {
                outcome,
                remote_id: None,
                observed: None,
            },
        )
    }

    #[test]
    fn test_unchanged_prints_nothing() {
        assert!(outcome_line(&result(ReconcileOutcome::NoChange)).is_none());
    }

    #[test]
    fn test_outcome_lines() {
        colored::control::set_override(false);

        let created = outcome_line(&result(ReconcileOutcome::Created {
            id: "c1".to_string(),
            diff: AttributeDiff::default(),
        }))
        .unwrap();
        assert_eq!(created, "  + cluster.prod created (c1)");

        let failed = outcome_line(&result(ReconcileOutcome::failed(Diagnostic::new(
            DiagnosticKind::AuthFailure,
            "HTTP 401: bad token",
        ))))
        .unwrap();
        assert!(failed.contains("cluster.prod"));
        assert!(failed.contains("HTTP 401: bad token"));
    }

    #[test]
    fn test_quiet_progress_accepts_events() {
        let mut progress = BatchProgress::new(true);
        progress.on_batch_start(1);
        progress.on_instance_start("prod", ResourceKind::Cluster);
        progress.on_instance_complete(&result(ReconcileOutcome::Deleted));
        progress.on_batch_complete();
    }
}
