//! `cpsync schema` - describe what each resource kind accepts

use anyhow::{Context as _, Result};
use colored::Colorize;
use declarative::{AttributeSpec, Descriptor, Mutability, Presence, ResourceKind};

pub fn run(kind: Option<&str>) -> Result<()> {
    let table = super::table()?;

    let kinds: Vec<ResourceKind> = match kind {
        Some(name) => vec![name.parse::<ResourceKind>()?],
        None => ResourceKind::ALL.to_vec(),
    };

    for kind in kinds {
        let descriptor = table
            .get(kind)
            .with_context(|| format!("No schema registered for {kind}"))?;
        print_descriptor(descriptor);
    }
    Ok(())
}

fn print_descriptor(descriptor: &Descriptor) {
    let changes = match descriptor.mutability() {
        Mutability::InPlace => "updated in place",
        Mutability::Replace => "replaced on change",
    };
    println!();
    println!(
        "{} {}",
        descriptor.kind().as_str().cyan().bold(),
        format!("({changes})").dimmed()
    );

    for spec in descriptor.schema().attributes() {
        println!("  {}", attribute_line(spec));
    }
}

/// One line per attribute: name, type, presence and constraints
pub fn attribute_line(spec: &AttributeSpec) -> String {
    let mut line = format!(
        "{:<20} {:<13} {}",
        spec.name,
        spec.value_type.to_string(),
        spec.presence
    );
    if spec.presence == Presence::Optional
        && let Some(default) = &spec.default
    {
        line.push_str(&format!(", default {default}"));
    }
    if let Some(kind) = spec.references {
        line.push_str(&format!(", references {kind}"));
    }
    if let Some((min, max)) = spec.range {
        line.push_str(&format!(", {min}..={max}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::ValueType;

    #[test]
    fn test_attribute_line() {
        let spec = AttributeSpec::required("organization_id", ValueType::String)
            .references(ResourceKind::Organization);
        let line = attribute_line(&spec);
        assert!(line.starts_with("organization_id"));
        assert!(line.contains("required"));
        assert!(line.ends_with(", references organization"));

        let spec = AttributeSpec::optional("replicas", ValueType::Int)
            .with_default(1_i64)
            .with_range(1, 5);
        let line = attribute_line(&spec);
        assert!(line.contains("int"));
        assert!(line.contains("default 1"));
        assert!(line.ends_with("1..=5"));
    }

    #[test]
    fn test_every_kind_has_a_schema() {
        let table = super::super::table().unwrap();
        for kind in ResourceKind::ALL {
            assert!(table.get(kind).is_some(), "{kind} has no schema");
        }
    }
}
