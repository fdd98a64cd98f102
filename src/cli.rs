use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cpsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Declarative control-plane sync - plan and apply clusters, streams, users and more",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// State file (default: $CPSYNC_STATE_DIR/state.toml or ~/.local/state/cpsync/state.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check a manifest without contacting the control plane
    Validate(ManifestArgs),

    /// Show what apply would change
    Plan(PlanArgs),

    /// Make the control plane match the manifest
    Apply(ApplyArgs),

    /// Delete resources recorded in state
    Destroy(DestroyArgs),

    /// Inspect or edit recorded state
    #[command(subcommand)]
    State(StateCommand),

    /// Read-only queries against the control plane
    #[command(subcommand)]
    Lookup(LookupCommand),

    /// Show the attributes each resource kind accepts
    Schema {
        /// Only show this kind
        kind: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared arguments
// ============================================================================

#[derive(Args, Clone)]
pub struct ManifestArgs {
    /// Manifest file (TOML, or JSON by extension)
    #[arg(short = 'f', long = "file", env = "CPSYNC_MANIFEST", value_name = "PATH")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Clone, Default)]
pub struct ConnectionArgs {
    /// Control-plane API endpoint
    #[arg(long, env = "SYNADIA_API_ENDPOINT", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Control-plane API token
    #[arg(long, env = "SYNADIA_API_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Overall time limit in seconds; no remote call starts after it
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Args, Clone)]
pub struct RetryArgs {
    /// Retry transient failures up to this many extra times
    #[arg(long, default_value = "2")]
    pub retries: u32,

    /// Also retry conflicts (the retry re-reads first)
    #[arg(long)]
    pub retry_conflicts: bool,
}

// ============================================================================
// Plan / Apply / Destroy
// ============================================================================

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Only plan matching resources and what they depend on ("kind", "kind.key" or "key")
    #[arg(short, long)]
    pub target: Option<String>,

    /// Plan recreation of resources that vanished remotely
    #[arg(long)]
    pub recreate_vanished: bool,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub retry: RetryArgs,

    /// Only apply matching resources and what they depend on ("kind", "kind.key" or "key")
    #[arg(short, long)]
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Delete recorded resources that the manifest no longer declares
    #[arg(long)]
    pub prune: bool,

    /// Create resources again when they vanished remotely
    #[arg(long)]
    pub recreate_vanished: bool,

    /// Resources at the same dependency level to reconcile in parallel
    #[arg(short, long, default_value = "1")]
    pub jobs: usize,
}

#[derive(Args)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub retry: RetryArgs,

    /// Only destroy these resources ("kind", "kind.key" or "key") and their dependents
    #[arg(short, long)]
    pub target: Vec<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

// ============================================================================
// State
// ============================================================================

#[derive(Subcommand)]
pub enum StateCommand {
    /// List recorded resources
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one recorded resource
    Show {
        /// Resource key
        key: String,
    },

    /// Stop tracking a resource without deleting it remotely
    Forget {
        /// Resource keys
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

// ============================================================================
// Lookup
// ============================================================================

#[derive(Subcommand)]
pub enum LookupCommand {
    /// List the IDs of all visible clusters
    Clusters(LookupArgs),

    /// Show a cluster by ID
    Cluster {
        /// Cluster ID
        id: String,

        #[command(flatten)]
        args: LookupArgs,
    },

    /// Show the organization the token belongs to
    Organization(LookupArgs),

    /// Find a user by email address
    User {
        /// Email address
        email: String,

        #[command(flatten)]
        args: LookupArgs,
    },
}

#[derive(Args, Clone)]
pub struct LookupArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}
