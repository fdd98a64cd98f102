//! Attribute values carried by desired and observed state

use crate::schema::ValueType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single attribute value
///
/// Serialized untagged, so manifests and state files hold plain scalars
/// (`name = "prod"`, `max_msgs = 100`, `subjects = ["a.>"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<String>),
}

/// Attribute name to value
pub type Attributes = BTreeMap<String, Value>;

impl Value {
    /// The runtime type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::String(_) => ValueType::String,
            Self::List(_) => ValueType::StringList,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{item}\"")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl<'a> From<Vec<&'a str>> for Value {
    fn from(value: Vec<&'a str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Build an attribute map from name/value pairs
pub fn attributes<I, K, V>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert_eq!(Value::from("a").value_type(), ValueType::String);
        assert_eq!(Value::from(3).value_type(), ValueType::Int);
        assert_eq!(Value::from(true).value_type(), ValueType::Bool);
        assert_eq!(Value::from(vec!["a"]).value_type(), ValueType::StringList);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("prod").to_string(), "\"prod\"");
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(
            Value::from(vec!["orders.>", "audit.*"]).to_string(),
            "[\"orders.>\", \"audit.*\"]"
        );
    }

    #[test]
    fn test_parse_from_toml() {
        let attrs: Attributes = toml::from_str(
            r#"
name = "orders"
max_msgs = 1000
allow = false
subjects = ["orders.>", "returns.>"]
"#,
        )
        .unwrap();

        assert_eq!(attrs["name"], Value::from("orders"));
        assert_eq!(attrs["max_msgs"], Value::Int(1000));
        assert_eq!(attrs["allow"], Value::Bool(false));
        assert_eq!(attrs["subjects"].as_list().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_from_json() {
        let attrs: Attributes =
            serde_json::from_str(r#"{"tier": "standard", "roles": [], "max_value_size": 1024}"#)
                .unwrap();
        assert_eq!(attrs["tier"].as_str(), Some("standard"));
        assert_eq!(attrs["roles"], Value::List(Vec::new()));
        assert_eq!(attrs["max_value_size"].as_int(), Some(1024));
    }

    #[test]
    fn test_attributes_helper() {
        let attrs = attributes([("name", Value::from("prod")), ("tier", "standard".into())]);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["tier"].as_str(), Some("standard"));
    }
}
