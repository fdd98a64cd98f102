//! Attribute diffs between desired and observed state

use crate::kind::ResourceKind;
use crate::schema::Schema;
use crate::types::{PlannedAction, PlannedChange};
use crate::value::{Attributes, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One attribute that differs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub name: String,
    /// Observed value, `None` if the remote side does not report it
    pub before: Option<Value>,
    /// Desired value
    pub after: Option<Value>,
}

impl fmt::Display for AttributeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| {
            v.as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "(unset)".to_string())
        };
        write!(f, "{}: {} → {}", self.name, show(&self.before), show(&self.after))
    }
}

/// The set of attributes that differ between desired and observed state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDiff {
    pub changes: Vec<AttributeChange>,
}

impl AttributeDiff {
    /// Shallow field-by-field comparison
    ///
    /// Only declared, non-computed attributes present in `desired` are
    /// compared. Lists compare as ordered sequences, so a reordering is a
    /// change.
    pub fn compute(schema: &Schema, desired: &Attributes, observed: &Attributes) -> Self {
        let changes = schema
            .mutable_attributes()
            .filter_map(|spec| {
                let want = desired.get(&spec.name)?;
                let have = observed.get(&spec.name);
                (have != Some(want)).then(|| AttributeChange {
                    name: spec.name.clone(),
                    before: have.cloned(),
                    after: Some(want.clone()),
                })
            })
            .collect();
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Planned change summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub creations: usize,
    pub updates: usize,
    pub replacements: usize,
    pub deletions: usize,
    pub unchanged: usize,
    pub failures: usize,
}

impl DiffSummary {
    /// Create a summary from a list of planned changes
    pub fn from_changes(changes: &[PlannedChange]) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match &change.action {
                PlannedAction::Create | PlannedAction::Recreate => summary.creations += 1,
                PlannedAction::Update { .. } => summary.updates += 1,
                PlannedAction::Replace { .. } => summary.replacements += 1,
                PlannedAction::Delete => summary.deletions += 1,
                PlannedAction::NoChange => summary.unchanged += 1,
                PlannedAction::Vanished | PlannedAction::Failed { .. } => summary.failures += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.creations + self.updates + self.replacements + self.deletions
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group planned changes by resource kind
pub fn group_by_kind(changes: &[PlannedChange]) -> BTreeMap<ResourceKind, Vec<&PlannedChange>> {
    let mut groups: BTreeMap<ResourceKind, Vec<&PlannedChange>> = BTreeMap::new();
    for change in changes {
        groups.entry(change.kind).or_default().push(change);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSpec, SchemaRegistry, ValueType};
    use crate::value::attributes;
    use std::sync::Arc;

    fn stream_schema() -> Arc<Schema> {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                ResourceKind::Stream,
                vec![
                    AttributeSpec::required("name", ValueType::String),
                    AttributeSpec::required("subjects", ValueType::StringList),
                    AttributeSpec::optional("max_msgs", ValueType::Int),
                    AttributeSpec::computed("created_at", ValueType::String),
                ],
            )
            .unwrap()
    }

    #[test]
    fn test_equal_state_has_empty_diff() {
        let schema = stream_schema();
        let desired = attributes([
            ("name", Value::from("orders")),
            ("subjects", Value::from(vec!["orders.>"])),
        ]);
        let mut observed = desired.clone();
        observed.insert("created_at".into(), Value::from("2024-01-01"));

        assert!(AttributeDiff::compute(&schema, &desired, &observed).is_empty());
    }

    #[test]
    fn test_list_order_is_significant() {
        let schema = stream_schema();
        let desired = attributes([
            ("name", Value::from("orders")),
            ("subjects", Value::from(vec!["a", "b"])),
        ]);
        let observed = attributes([
            ("name", Value::from("orders")),
            ("subjects", Value::from(vec!["b", "a"])),
        ]);

        let diff = AttributeDiff::compute(&schema, &desired, &observed);
        assert_eq!(diff.names(), vec!["subjects"]);
    }

    #[test]
    fn test_unmanaged_optional_is_ignored() {
        let schema = stream_schema();
        let desired = attributes([
            ("name", Value::from("orders")),
            ("subjects", Value::from(vec!["a"])),
        ]);
        let observed = attributes([
            ("name", Value::from("orders")),
            ("subjects", Value::from(vec!["a"])),
            ("max_msgs", Value::from(0)),
        ]);
        assert!(AttributeDiff::compute(&schema, &desired, &observed).is_empty());
    }

    #[test]
    fn test_explicit_zero_is_compared() {
        let schema = stream_schema();
        let desired = attributes([
            ("name", Value::from("orders")),
            ("subjects", Value::from(vec!["a"])),
            ("max_msgs", Value::from(0)),
        ]);
        let observed = attributes([
            ("name", Value::from("orders")),
            ("subjects", Value::from(vec!["a"])),
        ]);

        let diff = AttributeDiff::compute(&schema, &desired, &observed);
        assert_eq!(diff.changes[0].before, None);
        assert_eq!(diff.changes[0].after, Some(Value::from(0)));
        assert_eq!(diff.changes[0].to_string(), "max_msgs: (unset) → 0");
    }

    #[test]
    fn test_summary_counts() {
        let changes = vec![
            PlannedChange {
                key: "a".into(),
                kind: ResourceKind::Cluster,
                action: PlannedAction::Create,
            },
            PlannedChange {
                key: "b".into(),
                kind: ResourceKind::Stream,
                action: PlannedAction::Update {
                    diff: AttributeDiff::default(),
                },
            },
            PlannedChange {
                key: "c".into(),
                kind: ResourceKind::Stream,
                action: PlannedAction::NoChange,
            },
        ];

        let summary = DiffSummary::from_changes(&changes);
        assert_eq!(summary.creations, 1);
        assert_eq!(summary.updates, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.total(), 2);
        assert!(summary.has_changes());

        let groups = group_by_kind(&changes);
        assert_eq!(groups[&ResourceKind::Stream].len(), 2);
    }
}
