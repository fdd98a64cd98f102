//! Execution planner - validates a batch and orders it for execution
//!
//! Everything that can be checked without talking to the control plane is
//! checked here, so a malformed batch fails before any remote call.

use crate::descriptor::DescriptorTable;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::kind::ResourceKind;
use crate::orderer::{self, CyclicDependency, Node};
use crate::schema::SchemaViolation;
use crate::store::RemoteId;
use crate::value::{Attributes, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// One desired-state record of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Caller-chosen correlation key, unique within the batch
    pub key: String,
    pub kind: ResourceKind,
    /// Reference attributes hold the correlation keys of their targets
    pub desired: Attributes,
}

impl Instance {
    pub fn new(key: &str, kind: ResourceKind, desired: Attributes) -> Self {
        Self {
            key: key.to_string(),
            kind,
            desired,
        }
    }
}

/// A resource that exists remotely, as recorded by a previous pass or
/// imported by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownResource {
    pub kind: ResourceKind,
    pub remote_id: RemoteId,
    /// Last observed attributes; references hold remote IDs
    #[serde(default)]
    pub attributes: Attributes,
}

/// Known resources keyed by correlation key
pub type KnownResources = BTreeMap<String, KnownResource>;

/// A batch-level failure found before any remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("duplicate resource key '{0}'")]
    DuplicateKey(String),

    #[error("'{key}': no descriptor registered for kind {kind}")]
    UnsupportedKind { key: String, kind: ResourceKind },

    #[error("'{key}': {source}")]
    Schema {
        key: String,
        #[source]
        source: SchemaViolation,
    },

    #[error("'{key}': {attribute} references '{target}', which is neither declared nor known")]
    UnresolvedDependency {
        key: String,
        attribute: String,
        target: String,
    },

    #[error("'{key}': {attribute} must reference a {expected}, but '{target}' is a {found}")]
    KindMismatch {
        key: String,
        attribute: String,
        target: String,
        expected: ResourceKind,
        found: ResourceKind,
    },

    #[error("'{key}' is recorded as a {known} but declared as a {declared}")]
    KindChanged {
        key: String,
        known: ResourceKind,
        declared: ResourceKind,
    },

    #[error(transparent)]
    Cyclic(#[from] CyclicDependency),

    #[error("no resource matches target '{0}'")]
    UnknownTarget(String),
}

impl BatchError {
    pub fn diagnostic(&self) -> Diagnostic {
        let kind = match self {
            Self::DuplicateKey(_) | Self::Schema { .. } | Self::KindChanged { .. } => {
                DiagnosticKind::SchemaViolation
            }
            Self::UnsupportedKind { .. } => DiagnosticKind::Unsupported,
            Self::UnresolvedDependency { .. } | Self::KindMismatch { .. } => {
                DiagnosticKind::DependencyUnresolved
            }
            Self::Cyclic(_) => DiagnosticKind::CyclicDependency,
            Self::UnknownTarget(_) => DiagnosticKind::NotFound,
        };
        Diagnostic::new(kind, self.to_string())
    }
}

/// A reference attribute and the correlation key it names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub attribute: String,
    pub target: String,
    /// The target is part of this batch, not only known
    pub in_batch: bool,
}

/// An instance that passed validation, with its references resolved to
/// correlation keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedInstance {
    pub instance: Instance,
    pub references: Vec<Reference>,
}

impl PlannedInstance {
    pub fn key(&self) -> &str {
        &self.instance.key
    }

    pub fn kind(&self) -> ResourceKind {
        self.instance.kind
    }

    /// Keys of in-batch instances this one depends on
    pub fn depends_on(&self) -> impl Iterator<Item = &str> {
        self.references
            .iter()
            .filter(|r| r.in_batch)
            .map(|r| r.target.as_str())
    }

    /// Desired state with reference attributes replaced by remote IDs
    ///
    /// Fails with the first target key `lookup` cannot resolve.
    pub fn resolve<F>(&self, lookup: F) -> Result<Attributes, &str>
    where
        F: Fn(&str) -> Option<RemoteId>,
    {
        let mut resolved = self.instance.desired.clone();
        for reference in &self.references {
            let id = lookup(&reference.target).ok_or(reference.target.as_str())?;
            resolved.insert(reference.attribute.clone(), Value::String(id));
        }
        Ok(resolved)
    }
}

/// A validated batch in execution order
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    instances: Vec<PlannedInstance>,
}

impl ExecutionPlan {
    /// Validate `instances` and order them by their references
    ///
    /// References may target other instances of the batch or entries of
    /// `known`.
    pub fn build(
        table: &DescriptorTable,
        instances: Vec<Instance>,
        known: &KnownResources,
    ) -> Result<Self, BatchError> {
        let mut kinds: HashMap<&str, ResourceKind> = HashMap::new();
        for instance in &instances {
            if kinds.insert(&instance.key, instance.kind).is_some() {
                return Err(BatchError::DuplicateKey(instance.key.clone()));
            }
        }

        let mut planned = Vec::with_capacity(instances.len());
        for instance in &instances {
            let descriptor = table
                .get(instance.kind)
                .ok_or_else(|| BatchError::UnsupportedKind {
                    key: instance.key.clone(),
                    kind: instance.kind,
                })?;

            table
                .registry()
                .validate(instance.kind, &instance.desired)
                .map_err(|source| BatchError::Schema {
                    key: instance.key.clone(),
                    source,
                })?;

            if let Some(existing) = known.get(&instance.key)
                && existing.kind != instance.kind
            {
                return Err(BatchError::KindChanged {
                    key: instance.key.clone(),
                    known: existing.kind,
                    declared: instance.kind,
                });
            }

            let mut references = Vec::new();
            for dependency in descriptor.dependency_references() {
                let Some(target) = instance
                    .desired
                    .get(&dependency.attribute)
                    .and_then(Value::as_str)
                else {
                    continue;
                };

                let (found, in_batch) = match kinds.get(target) {
                    Some(kind) => (*kind, true),
                    None => match known.get(target) {
                        Some(resource) => (resource.kind, false),
                        None => {
                            return Err(BatchError::UnresolvedDependency {
                                key: instance.key.clone(),
                                attribute: dependency.attribute,
                                target: target.to_string(),
                            });
                        }
                    },
                };

                if found != dependency.kind {
                    return Err(BatchError::KindMismatch {
                        key: instance.key.clone(),
                        attribute: dependency.attribute,
                        target: target.to_string(),
                        expected: dependency.kind,
                        found,
                    });
                }

                references.push(Reference {
                    attribute: dependency.attribute,
                    target: target.to_string(),
                    in_batch,
                });
            }

            planned.push(PlannedInstance {
                instance: instance.clone(),
                references,
            });
        }

        let nodes = nodes(&planned);
        let order = orderer::order(&nodes)?;

        let mut slots: Vec<Option<PlannedInstance>> = planned.into_iter().map(Some).collect();
        let instances = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();

        Ok(Self { instances })
    }

    /// Instances in execution order
    pub fn instances(&self) -> &[PlannedInstance] {
        &self.instances
    }

    pub fn get(&self, key: &str) -> Option<&PlannedInstance> {
        self.instances.iter().find(|p| p.key() == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Keys referenced by any instance of the plan
    pub fn referenced_keys(&self) -> HashSet<&str> {
        self.instances
            .iter()
            .flat_map(|p| p.references.iter().map(|r| r.target.as_str()))
            .collect()
    }

    /// Positions in [`instances`](Self::instances) grouped by dependency
    /// depth
    pub fn levels(&self) -> Vec<Vec<usize>> {
        // Already topologically sorted, so this cannot find a cycle
        orderer::levels(&nodes(&self.instances))
            .unwrap_or_else(|_| (0..self.instances.len()).map(|i| vec![i]).collect())
    }

    /// Narrow the plan to instances matching `target` and the in-batch
    /// instances they depend on
    ///
    /// Target format: "kind" or "kind.key"
    pub fn filter_by_target(self, target: Option<&str>) -> Result<Self, BatchError> {
        let Some(target) = target else {
            return Ok(self);
        };

        let (kind, key) = parse_target(target);
        let mut wanted: HashSet<String> = self
            .instances
            .iter()
            .filter(|p| matches_filter(p, kind.as_deref(), key.as_deref()))
            .map(|p| p.key().to_string())
            .collect();

        if wanted.is_empty() {
            return Err(BatchError::UnknownTarget(target.to_string()));
        }

        // Dependents come after their dependencies, so one backwards pass
        // collects the full closure
        for planned in self.instances.iter().rev() {
            if wanted.contains(planned.key()) {
                let deps: Vec<String> = planned.depends_on().map(str::to_string).collect();
                wanted.extend(deps);
            }
        }

        Ok(Self {
            instances: self
                .instances
                .into_iter()
                .filter(|p| wanted.contains(p.key()))
                .collect(),
        })
    }
}

fn nodes(planned: &[PlannedInstance]) -> Vec<Node> {
    planned
        .iter()
        .map(|p| Node::new(p.key(), p.depends_on()))
        .collect()
}

/// Parse a target string like "kind.key" into (kind, key)
pub(crate) fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        Some((kind, key)) => (Some(kind.to_string()), Some(key.to_string())),
        None if target.parse::<ResourceKind>().is_ok() => (Some(target.to_string()), None),
        None => (None, Some(target.to_string())),
    }
}

fn matches_filter(planned: &PlannedInstance, kind: Option<&str>, key: Option<&str>) -> bool {
    if let Some(k) = kind
        && k.parse::<ResourceKind>().ok() != Some(planned.kind())
    {
        return false;
    }

    if let Some(key) = key
        && planned.key() != key
    {
        return false;
    }

    true
}
