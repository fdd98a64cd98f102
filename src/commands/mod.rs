//! Command implementations
//!
//! Helpers shared by the manifest-driven commands live here: loading the
//! manifest and state, building the plan, connecting to the control plane
//! and recording outcomes as they arrive.

pub mod apply;
pub mod destroy;
pub mod lookup;
pub mod plan;
pub mod schema;
pub mod state;
pub mod validate;

use anyhow::{Context as _, Result, anyhow};
use controlplane::{DEFAULT_ENDPOINT, HttpStore};
use declarative::{
    BatchError, BatchOptions, CallContext, ConfirmCallback, DescriptorTable, ExecutionPlan,
    InstanceResult, KnownResources, ProgressCallback, ReconcileOptions, ResourceKind,
    RetryConfig, standard_table,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Context;
use crate::cli::{ConnectionArgs, ManifestArgs, RetryArgs};
use crate::config::{Manifest, ProviderConfig};
use crate::paths;
use crate::progress::BatchProgress;
use crate::state::{Recorded, State};

/// The descriptor table for every supported kind
pub fn table() -> Result<DescriptorTable> {
    standard_table().context("Built-in resource schemas are inconsistent")
}

/// Load the manifest named on the command line (or the default one)
pub fn load_manifest(args: &ManifestArgs) -> Result<(PathBuf, Manifest)> {
    let path = paths::manifest_file(args.file.as_deref());
    let manifest = Manifest::load(&path)?;
    Ok((path, manifest))
}

/// Like [`load_manifest`], but an absent default manifest is empty
///
/// Used by commands that only need provider settings or imports.
pub fn load_manifest_or_default(args: &ManifestArgs) -> Result<Manifest> {
    if args.file.is_none() && !Path::new(paths::DEFAULT_MANIFEST).exists() {
        log::debug!("No {} found, using an empty manifest", paths::DEFAULT_MANIFEST);
        return Ok(Manifest::default());
    }
    load_manifest(args).map(|(_, manifest)| manifest)
}

pub fn load_state(ctx: &Context) -> Result<(PathBuf, State)> {
    let path = paths::state_file(ctx.state.as_deref())?;
    let state = State::load(&path)?;
    Ok((path, state))
}

/// Recorded resources plus the manifest's imports
///
/// An import wins over a recorded entry with the same key.
pub fn known_resources(state: &State, manifest: &Manifest) -> KnownResources {
    let mut known = state.known();
    known.extend(manifest.imported());
    known
}

/// Validate and order the manifest, optionally narrowed to `target`
pub fn build_plan(
    table: &DescriptorTable,
    manifest: &Manifest,
    known: &KnownResources,
    target: Option<&str>,
) -> Result<ExecutionPlan> {
    ExecutionPlan::build(table, manifest.instances(), known)
        .and_then(|plan| plan.filter_by_target(target))
        .map_err(batch_error)
}

/// Turn a batch-level failure into a CLI error carrying its advice
pub fn batch_error(err: BatchError) -> anyhow::Error {
    let diagnostic = err.diagnostic();
    anyhow!("{}\n  {}", diagnostic, diagnostic.kind.advice())
}

/// Connect to the control plane
///
/// Flags and environment win over the manifest's `[provider]` table.
pub fn connect(args: &ConnectionArgs, provider: &ProviderConfig) -> Result<HttpStore> {
    let endpoint = args
        .endpoint
        .as_deref()
        .or(provider.endpoint.as_deref())
        .unwrap_or(DEFAULT_ENDPOINT);
    let token = args
        .token
        .as_deref()
        .or(provider.token.as_deref())
        .unwrap_or_default();

    log::debug!("Using control plane at {endpoint}");
    let store = HttpStore::new(endpoint, token)
        .context("Could not configure the control-plane client (set --token or SYNADIA_API_TOKEN)")?;
    Ok(match args.timeout {
        Some(secs) => store.with_timeout(Duration::from_secs(secs)),
        None => store,
    })
}

/// Call context wired to Ctrl-C and bounded by `--timeout`, if given
pub fn call_context(ctx: &Context, args: &ConnectionArgs) -> CallContext {
    let call = CallContext::new().with_cancel_token(ctx.cancel.clone());
    match args.timeout {
        Some(secs) => call.with_timeout(Duration::from_secs(secs)),
        None => call,
    }
}

pub fn batch_options(retry: &RetryArgs, recreate_vanished: bool, jobs: usize) -> BatchOptions {
    BatchOptions {
        reconcile: ReconcileOptions { recreate_vanished },
        retry: RetryConfig {
            max_attempts: retry.retries.saturating_add(1),
            ..RetryConfig::default()
        },
        retry_conflicts: retry.retry_conflicts,
        jobs: jobs.max(1),
    }
}

/// Prompt before mutating anything, unless `--yes` was given
pub fn confirmer(yes: bool) -> Box<dyn ConfirmCallback> {
    if yes {
        Box::new(declarative::AutoConfirm)
    } else {
        Box::new(TerminalConfirm)
    }
}

struct TerminalConfirm;

impl ConfirmCallback for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation (use --yes when not running in a terminal)")
    }
}

/// Progress reporter that folds every outcome into the state file
///
/// The state is saved after each change, so an interrupted run keeps what
/// already happened. The first save failure is kept and returned by
/// [`Recorder::finish`]; later outcomes are still recorded in memory.
pub struct Recorder<'a> {
    progress: BatchProgress,
    state: &'a mut State,
    path: &'a Path,
    error: Option<anyhow::Error>,
}

impl<'a> Recorder<'a> {
    pub fn new(state: &'a mut State, path: &'a Path, quiet: bool) -> Self {
        Self {
            progress: BatchProgress::new(quiet),
            state,
            path,
            error: None,
        }
    }

    pub fn finish(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err.context("Remote changes were made but state could not be saved")),
            None => Ok(()),
        }
    }
}

impl ProgressCallback for Recorder<'_> {
    fn on_batch_start(&mut self, count: usize) {
        self.progress.on_batch_start(count);
    }

    fn on_instance_start(&mut self, key: &str, kind: ResourceKind) {
        self.progress.on_instance_start(key, kind);
    }

    fn on_instance_complete(&mut self, result: &InstanceResult) {
        self.progress.on_instance_complete(result);
        if self.state.record(result) == Recorded::Unchanged {
            return;
        }
        if let Err(err) = self.state.save(self.path) {
            log::error!("Failed to save state after {}: {err:#}", result.key);
            self.error.get_or_insert(err);
        }
    }

    fn on_batch_complete(&mut self) {
        self.progress.on_batch_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManifestFormat;
    use declarative::{AttributeDiff, CancelToken, ReconcileOutcome, Reconciliation};
    use tempfile::TempDir;

    fn created(key: &str, id: &str) -> InstanceResult {
        InstanceResult::new(
            key,
            ResourceKind::Organization,
            Reconciliation {
                outcome: ReconcileOutcome::Created {
                    id: id.to_string(),
                    diff: AttributeDiff::default(),
                },
                remote_id: Some(id.to_string()),
                observed: None,
            },
        )
    }

    #[test]
    fn test_recorder_saves_each_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.toml");
        let mut state = State::default();

        let mut recorder = Recorder::new(&mut state, &path, true);
        recorder.on_batch_start(1);
        recorder.on_instance_complete(&created("acme", "org_1"));
        recorder.on_batch_complete();
        recorder.finish().unwrap();

        let saved = State::load(&path).unwrap();
        assert_eq!(saved.get("acme").unwrap().remote_id, "org_1");
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_recorder_keeps_save_error() {
        let dir = TempDir::new().unwrap();
        // A directory where the state file should be makes the rename fail
        let path = dir.path().join("state.toml");
        std::fs::create_dir_all(path.join("blocker")).unwrap();
        let mut state = State::default();

        let mut recorder = Recorder::new(&mut state, &path, true);
        recorder.on_instance_complete(&created("acme", "org_1"));
        assert!(recorder.finish().is_err());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_imports_override_state() {
        let mut state = State::default();
        state.record(&created("acme", "org_old"));

        let manifest = Manifest::parse(
            r#"
[[import]]
key = "acme"
kind = "organization"
id = "org_new"
"#,
            ManifestFormat::Toml,
        )
        .unwrap();

        let known = known_resources(&state, &manifest);
        assert_eq!(known["acme"].remote_id, "org_new");
    }

    #[test]
    fn test_connect_precedence() {
        let provider = ProviderConfig {
            endpoint: Some("https://manifest.example.com".to_string()),
            token: Some("manifest-token".to_string()),
        };

        let store = connect(&ConnectionArgs::default(), &provider).unwrap();
        assert_eq!(store.endpoint(), "https://manifest.example.com");

        let args = ConnectionArgs {
            endpoint: Some("https://flag.example.com/".to_string()),
            ..ConnectionArgs::default()
        };
        let store = connect(&args, &provider).unwrap();
        assert_eq!(store.endpoint(), "https://flag.example.com");

        let store = connect(&ConnectionArgs::default(), &ProviderConfig {
            endpoint: None,
            token: Some("t".to_string()),
        })
        .unwrap();
        assert_eq!(store.endpoint(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_connect_requires_token() {
        assert!(connect(&ConnectionArgs::default(), &ProviderConfig::default()).is_err());
    }

    #[test]
    fn test_call_context_follows_interrupt() {
        let ctx = Context {
            verbose: 0,
            quiet: true,
            state: None,
            cancel: CancelToken::new(),
        };
        let call = call_context(&ctx, &ConnectionArgs::default());
        assert!(!call.is_cancelled());
        assert!(call.remaining().is_none());

        ctx.cancel.cancel();
        assert!(call.is_cancelled());
        assert!(call.check().is_err());
    }

    #[test]
    fn test_call_context_timeout() {
        let ctx = Context {
            verbose: 0,
            quiet: true,
            state: None,
            cancel: CancelToken::new(),
        };
        let args = ConnectionArgs {
            timeout: Some(60),
            ..ConnectionArgs::default()
        };
        let remaining = call_context(&ctx, &args).remaining().unwrap();
        assert!(remaining <= Duration::from_secs(60));
    }

    #[test]
    fn test_batch_options_from_flags() {
        let retry = RetryArgs {
            retries: 2,
            retry_conflicts: true,
        };
        let options = batch_options(&retry, true, 0);
        assert_eq!(options.retry.max_attempts, 3);
        assert!(options.retry_conflicts);
        assert!(options.reconcile.recreate_vanished);
        assert_eq!(options.jobs, 1);
    }

    #[test]
    fn test_batch_error_carries_advice() {
        let err = batch_error(BatchError::DuplicateKey("prod".to_string()));
        let message = err.to_string();
        assert!(message.contains("duplicate resource key 'prod'"));
        assert!(message.lines().count() >= 2);
    }
}
