//! Schema registry
//!
//! Declares, for each resource kind, the attributes a desired-state record
//! may carry and validates records against those declarations.

use crate::kind::ResourceKind;
use crate::value::{Attributes, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Declared type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Int,
    Bool,
    StringList,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::StringList => "list<string>",
        })
    }
}

/// Whether the caller must, may, or must not supply an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Required,
    Optional,
    /// Set by the remote side only
    Computed,
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Computed => "computed",
        })
    }
}

/// Declaration of a single attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    pub value_type: ValueType,
    pub presence: Presence,
    /// Value used when an optional attribute is absent
    pub default: Option<Value>,
    /// The attribute holds the remote ID of another resource of this kind
    pub references: Option<ResourceKind>,
    /// Inclusive bounds for integer attributes
    pub range: Option<(i64, i64)>,
}

impl AttributeSpec {
    fn new(name: &str, value_type: ValueType, presence: Presence) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            presence,
            default: None,
            references: None,
            range: None,
        }
    }

    pub fn required(name: &str, value_type: ValueType) -> Self {
        Self::new(name, value_type, Presence::Required)
    }

    pub fn optional(name: &str, value_type: ValueType) -> Self {
        Self::new(name, value_type, Presence::Optional)
    }

    pub fn computed(name: &str, value_type: ValueType) -> Self {
        Self::new(name, value_type, Presence::Computed)
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn references(mut self, kind: ResourceKind) -> Self {
        self.references = Some(kind);
        self
    }

    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn is_computed(&self) -> bool {
        self.presence == Presence::Computed
    }
}

/// A `(kind, attribute)` pair: the attribute's value must be the remote ID
/// of an instance of `kind`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyReference {
    pub kind: ResourceKind,
    pub attribute: String,
}

/// The attribute set of one resource kind
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    attributes: Vec<AttributeSpec>,
}

impl Schema {
    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Attributes the caller manages (everything except computed ones)
    pub fn mutable_attributes(&self) -> impl Iterator<Item = &AttributeSpec> {
        self.attributes.iter().filter(|a| !a.is_computed())
    }

    pub fn dependency_references(&self) -> Vec<DependencyReference> {
        self.attributes
            .iter()
            .filter_map(|a| {
                a.references.map(|kind| DependencyReference {
                    kind,
                    attribute: a.name.clone(),
                })
            })
            .collect()
    }

    /// Check a desired-state record, collecting every violation
    pub fn check(&self, desired: &Attributes) -> Vec<Violation> {
        let mut violations = Vec::new();

        for name in desired.keys() {
            if self.attribute(name).is_none() {
                violations.push(Violation::Unknown {
                    attribute: name.clone(),
                });
            }
        }

        for spec in &self.attributes {
            let Some(value) = desired.get(&spec.name) else {
                if spec.presence == Presence::Required {
                    violations.push(Violation::MissingRequired {
                        attribute: spec.name.clone(),
                    });
                }
                continue;
            };

            if spec.is_computed() {
                violations.push(Violation::ComputedSupplied {
                    attribute: spec.name.clone(),
                });
                continue;
            }

            if value.value_type() != spec.value_type {
                violations.push(Violation::TypeMismatch {
                    attribute: spec.name.clone(),
                    expected: spec.value_type,
                    found: value.value_type(),
                });
                continue;
            }

            if let (Some((min, max)), Some(n)) = (spec.range, value.as_int())
                && !(min..=max).contains(&n)
            {
                violations.push(Violation::OutOfRange {
                    attribute: spec.name.clone(),
                    value: n,
                    min,
                    max,
                });
            }
        }

        violations
    }

    /// Desired state with defaults filled in for absent optional attributes
    pub fn effective(&self, desired: &Attributes) -> Attributes {
        let mut effective = desired.clone();
        for spec in &self.attributes {
            if let Some(default) = &spec.default {
                effective
                    .entry(spec.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        effective
    }
}

/// A single reason a desired-state record is invalid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MissingRequired {
        attribute: String,
    },
    TypeMismatch {
        attribute: String,
        expected: ValueType,
        found: ValueType,
    },
    Unknown {
        attribute: String,
    },
    ComputedSupplied {
        attribute: String,
    },
    OutOfRange {
        attribute: String,
        value: i64,
        min: i64,
        max: i64,
    },
    UnregisteredKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequired { attribute } => {
                write!(f, "missing required attribute '{attribute}'")
            }
            Self::TypeMismatch {
                attribute,
                expected,
                found,
            } => write!(f, "'{attribute}' must be {expected}, got {found}"),
            Self::Unknown { attribute } => write!(f, "unknown attribute '{attribute}'"),
            Self::ComputedSupplied { attribute } => {
                write!(f, "'{attribute}' is computed and cannot be set")
            }
            Self::OutOfRange {
                attribute,
                value,
                min,
                max,
            } => write!(f, "'{attribute}' = {value} is outside {min}..={max}"),
            Self::UnregisteredKind => write!(f, "no schema registered"),
        }
    }
}

/// A desired-state record failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {}", join_violations(.violations))]
pub struct SchemaViolation {
    pub kind: ResourceKind,
    pub violations: Vec<Violation>,
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while registering a schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("kind '{0}' is already registered")]
    DuplicateKind(ResourceKind),

    #[error("{kind}: attribute '{attribute}' is declared twice")]
    DuplicateAttribute {
        kind: ResourceKind,
        attribute: String,
    },

    #[error("{kind}: default for '{attribute}' must be {expected}, got {found}")]
    DefaultTypeMismatch {
        kind: ResourceKind,
        attribute: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("{kind}: only optional attributes may have a default ('{attribute}')")]
    DefaultNotAllowed {
        kind: ResourceKind,
        attribute: String,
    },

    #[error("{kind}: reference attribute '{attribute}' must be a string")]
    ReferenceNotString {
        kind: ResourceKind,
        attribute: String,
    },
}

/// Per-kind attribute declarations
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<ResourceKind, Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the attribute set for a kind
    pub fn register(
        &mut self,
        kind: ResourceKind,
        attributes: Vec<AttributeSpec>,
    ) -> Result<Arc<Schema>, RegistryError> {
        if self.schemas.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }

        let mut seen = HashSet::new();
        for spec in &attributes {
            if !seen.insert(spec.name.as_str()) {
                return Err(RegistryError::DuplicateAttribute {
                    kind,
                    attribute: spec.name.clone(),
                });
            }

            if let Some(default) = &spec.default {
                if spec.presence != Presence::Optional {
                    return Err(RegistryError::DefaultNotAllowed {
                        kind,
                        attribute: spec.name.clone(),
                    });
                }
                if default.value_type() != spec.value_type {
                    return Err(RegistryError::DefaultTypeMismatch {
                        kind,
                        attribute: spec.name.clone(),
                        expected: spec.value_type,
                        found: default.value_type(),
                    });
                }
            }

            if spec.references.is_some() && spec.value_type != ValueType::String {
                return Err(RegistryError::ReferenceNotString {
                    kind,
                    attribute: spec.name.clone(),
                });
            }
        }

        let schema = Arc::new(Schema { attributes });
        self.schemas.insert(kind, Arc::clone(&schema));
        Ok(schema)
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&Arc<Schema>> {
        self.schemas.get(&kind)
    }

    /// Validate a desired-state record against the kind's schema
    pub fn validate(&self, kind: ResourceKind, desired: &Attributes) -> Result<(), SchemaViolation> {
        let violations = match self.schemas.get(&kind) {
            Some(schema) => schema.check(desired),
            None => vec![Violation::UnregisteredKind],
        };

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolation { kind, violations })
        }
    }

    /// Desired state with declared defaults applied
    pub fn effective(&self, kind: ResourceKind, desired: &Attributes) -> Attributes {
        self.schemas
            .get(&kind)
            .map(|schema| schema.effective(desired))
            .unwrap_or_else(|| desired.clone())
    }
}
