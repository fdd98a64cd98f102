//! Persisted resource state
//!
//! Maps each correlation key to the remote entity created for it. The file
//! is read at the start of a run and written after every outcome, so an
//! interrupted run loses at most the instance in flight.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::{
    Attributes, InstanceResult, KnownResource, KnownResources, RemoteId, ResourceKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const STATE_VERSION: u32 = 1;

fn state_version() -> u32 {
    STATE_VERSION
}

/// One managed resource as last observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    pub kind: ResourceKind,
    pub remote_id: RemoteId,
    /// Last observed attributes; references hold remote IDs
    #[serde(default)]
    pub attributes: Attributes,
    pub updated_at: DateTime<Utc>,
}

/// Contents of the state file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default = "state_version")]
    pub version: u32,

    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: BTreeMap::new(),
        }
    }
}

/// What recording an instance result did to the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Stored,
    Removed,
    Unchanged,
}

impl State {
    /// Load state from disk, or return an empty state if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, using empty state", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        if state.version > STATE_VERSION {
            anyhow::bail!(
                "State file {} has version {}, newer than supported version {}",
                path.display(),
                state.version,
                STATE_VERSION
            );
        }

        log::debug!(
            "Loaded {} resources from {}",
            state.resources.len(),
            path.display()
        );
        Ok(state)
    }

    /// Save state to disk, replacing the file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize state to TOML")?;
        let tmp = temp_path(path);
        fs::write(&tmp, &content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ResourceState> {
        self.resources.get(key)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Drop a resource from state without touching the remote side
    pub fn forget(&mut self, key: &str) -> Option<ResourceState> {
        self.resources.remove(key)
    }

    /// State as the engine's view of known resources
    pub fn known(&self) -> KnownResources {
        self.resources
            .iter()
            .map(|(key, r)| {
                (
                    key.clone(),
                    KnownResource {
                        kind: r.kind,
                        remote_id: r.remote_id.clone(),
                        attributes: r.attributes.clone(),
                    },
                )
            })
            .collect()
    }

    /// Fold one instance result into the state
    ///
    /// An instance with a remote ID is stored (keeping the previous snapshot
    /// when nothing was observed); one without is removed.
    pub fn record(&mut self, result: &InstanceResult) -> Recorded {
        let Some(remote_id) = &result.remote_id else {
            return match self.resources.remove(&result.key) {
                Some(_) => Recorded::Removed,
                None => Recorded::Unchanged,
            };
        };

        let previous = self.resources.get(&result.key);
        let attributes = match (&result.observed, previous) {
            (Some(observed), _) => observed.clone(),
            (None, Some(prev)) if prev.remote_id == *remote_id => prev.attributes.clone(),
            (None, _) => Attributes::new(),
        };

        if let Some(prev) = previous
            && prev.kind == result.kind
            && prev.remote_id == *remote_id
            && prev.attributes == attributes
        {
            return Recorded::Unchanged;
        }

        self.resources.insert(
            result.key.clone(),
            ResourceState {
                kind: result.kind,
                remote_id: remote_id.clone(),
                attributes,
                updated_at: Utc::now(),
            },
        );
        Recorded::Stored
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{
        AttributeDiff, Diagnostic, DiagnosticKind, ReconcileOutcome, Reconciliation, Value,
        attributes,
    };
    use tempfile::TempDir;

    fn created(key: &str, id: &str, attrs: Attributes) -> InstanceResult {
        InstanceResult::new(
            key,
            ResourceKind::Cluster,
            Reconciliation {
                outcome: ReconcileOutcome::Created {
                    id: id.to_string(),
                    diff: AttributeDiff::default(),
                },
                remote_id: Some(id.to_string()),
                observed: Some(attrs),
            },
        )
    }

    fn cluster_attrs(region: &str) -> Attributes {
        attributes([("name", "prod"), ("region", region)])
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let state = State::load(&dir.path().join("state.toml")).unwrap();
        assert!(state.is_empty());
        assert_eq!(state.version, STATE_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let mut state = State::default();
        state.record(&created("prod", "c1", cluster_attrs("us-east")));
        state.save(&path).unwrap();

        let loaded = State::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.get("prod").unwrap().remote_id, "c1");
        assert!(!dir.path().join("nested").join("state.toml.tmp").exists());
    }

    #[test]
    fn test_state_file_shape() {
        let mut state = State::default();
        state.record(&created("prod", "c1", cluster_attrs("us-east")));
        let content = toml::to_string_pretty(&state).unwrap();

        assert!(content.contains("version = 1"));
        assert!(content.contains("[resources.prod]"));
        assert!(content.contains("remote_id = \"c1\""));
        assert!(content.contains("region = \"us-east\""));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "version = 99\n").unwrap();
        assert!(State::load(&path).is_err());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "resources = [").unwrap();
        let err = State::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse state file"));
    }

    #[test]
    fn test_record_stores_and_updates() {
        let mut state = State::default();
        assert_eq!(
            state.record(&created("prod", "c1", cluster_attrs("us-east"))),
            Recorded::Stored
        );
        assert_eq!(
            state.record(&created("prod", "c1", cluster_attrs("us-east"))),
            Recorded::Unchanged
        );
        assert_eq!(
            state.record(&created("prod", "c2", cluster_attrs("eu-west"))),
            Recorded::Stored
        );
        assert_eq!(state.get("prod").unwrap().remote_id, "c2");
    }

    #[test]
    fn test_record_removes_deleted() {
        let mut state = State::default();
        state.record(&created("prod", "c1", cluster_attrs("us-east")));

        let deleted = InstanceResult::new(
            "prod",
            ResourceKind::Cluster,
            Reconciliation {
                outcome: ReconcileOutcome::Deleted,
                remote_id: None,
                observed: None,
            },
        );
        assert_eq!(state.record(&deleted), Recorded::Removed);
        assert!(state.get("prod").is_none());
        assert_eq!(state.record(&deleted), Recorded::Unchanged);
    }

    #[test]
    fn test_failure_with_id_keeps_snapshot() {
        let mut state = State::default();
        state.record(&created("prod", "c1", cluster_attrs("us-east")));

        let failed = InstanceResult::new(
            "prod",
            ResourceKind::Cluster,
            Reconciliation::failed(
                Diagnostic::new(DiagnosticKind::Transient, "HTTP 503"),
                Some("c1".to_string()),
            ),
        );
        assert_eq!(state.record(&failed), Recorded::Unchanged);
        assert_eq!(
            state.get("prod").unwrap().attributes.get("region"),
            Some(&Value::from("us-east"))
        );
    }

    #[test]
    fn test_known_and_forget() {
        let mut state = State::default();
        state.record(&created("prod", "c1", cluster_attrs("us-east")));

        let known = state.known();
        assert_eq!(known["prod"].remote_id, "c1");
        assert_eq!(known["prod"].kind, ResourceKind::Cluster);

        assert!(state.forget("prod").is_some());
        assert!(state.forget("prod").is_none());
        assert!(state.known().is_empty());
    }
}
