//! Manifest loading
//!
//! A manifest declares the desired resources, the externally managed ones
//! they may reference, and optional provider settings:
//!
//! ```toml
//! [provider]
//! endpoint = "https://api.synadia.cloud"
//!
//! [[import]]
//! key = "acme"
//! kind = "organization"
//! id = "org_2x9"
//!
//! [[resource]]
//! key = "prod"
//! kind = "cluster"
//! name = "prod"
//! region = "us-east"
//! organization_id = "acme"
//! ```
//!
//! Reference attributes (`organization_id` above) name the key of another
//! resource or import, not a remote ID.

use anyhow::{Context, Result, bail};
use declarative::{Attributes, Instance, KnownResource, KnownResources, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Manifest file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Toml,
    Json,
}

impl ManifestFormat {
    /// Pick the format from the file extension; TOML unless `.json`
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default, alias = "api_endpoint")]
    pub endpoint: Option<String>,
    #[serde(default, alias = "api_token")]
    pub token: Option<String>,
}

/// A desired resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub key: String,
    pub kind: ResourceKind,
    #[serde(flatten)]
    pub attributes: Attributes,
}

/// An externally managed resource that desired resources may reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportEntry {
    pub key: String,
    pub kind: ResourceKind,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default, rename = "import")]
    pub imports: Vec<ImportEntry>,
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceEntry>,
}

impl Manifest {
    /// Load a manifest, picking the format from the extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;
        let manifest = Self::parse(&content, ManifestFormat::from_path(path))
            .with_context(|| format!("Invalid manifest {}", path.display()))?;
        log::debug!(
            "Loaded {} resources and {} imports from {}",
            manifest.resources.len(),
            manifest.imports.len(),
            path.display()
        );
        Ok(manifest)
    }

    pub fn parse(content: &str, format: ManifestFormat) -> Result<Self> {
        let manifest: Self = match format {
            ManifestFormat::Toml => toml::from_str(content)?,
            ManifestFormat::Json => serde_json::from_str(content)?,
        };
        manifest.check_keys()?;
        Ok(manifest)
    }

    /// Imports share the key space with resources
    fn check_keys(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for import in &self.imports {
            if import.key.trim().is_empty() {
                bail!("import of kind {} has an empty key", import.kind);
            }
            if !seen.insert(import.key.as_str()) {
                bail!("import '{}' is declared twice", import.key);
            }
        }
        for resource in &self.resources {
            if resource.key.trim().is_empty() {
                bail!("resource of kind {} has an empty key", resource.kind);
            }
            if self.imports.iter().any(|i| i.key == resource.key) {
                bail!(
                    "'{}' is declared both as a resource and as an import",
                    resource.key
                );
            }
        }
        Ok(())
    }

    /// Desired resources as a batch, in manifest order
    ///
    /// Duplicate resource keys are left to the planner to report.
    pub fn instances(&self) -> Vec<Instance> {
        self.resources
            .iter()
            .map(|r| Instance::new(&r.key, r.kind, r.attributes.clone()))
            .collect()
    }

    /// Imports as known resources, without attributes
    pub fn imported(&self) -> KnownResources {
        self.imports
            .iter()
            .map(|i| {
                (
                    i.key.clone(),
                    KnownResource {
                        kind: i.kind,
                        remote_id: i.id.clone(),
                        attributes: Attributes::new(),
                    },
                )
            })
            .collect()
    }
}
