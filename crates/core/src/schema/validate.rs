#![forbid(unsafe_code)]

use super::{SchemaKind, SchemaNode};
use crate::path::DataPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One validation failure, qualified by the data path it was found at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl SchemaNode {
    /// Validates `value` as the document rooted at this node.
    pub fn validate(&self, value: &Value) -> Vec<ValidationIssue> {
        self.validate_at(value, &DataPath::root())
    }

    /// Validates `value` reporting issues relative to `base` (used when a
    /// subtree is replaced by a patch).
    pub fn validate_at(&self, value: &Value, base: &DataPath) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        validate_node(self, value, base, &mut issues);
        issues
    }
}

fn validate_node(node: &SchemaNode, value: &Value, at: &DataPath, issues: &mut Vec<ValidationIssue>) {
    match (&node.kind, value) {
        (
            SchemaKind::Object {
                properties,
                required,
                additional_properties,
            },
            Value::Object(map),
        ) => {
            for name in required {
                if !map.contains_key(name) {
                    issues.push(issue(at, format!("must have required property '{name}'")));
                }
            }
            for (key, child) in map {
                match properties.get(key) {
                    Some(child_node) => validate_node(child_node, child, &at.key(key.clone()), issues),
                    None if *additional_properties => {}
                    None => issues.push(issue(
                        at,
                        format!("must NOT have additional property '{key}'"),
                    )),
                }
            }
        }
        (SchemaKind::Array { items, .. }, Value::Array(values)) => {
            for (index, item) in values.iter().enumerate() {
                validate_node(items, item, &at.index(index), issues);
            }
        }
        (SchemaKind::String { .. }, Value::String(_)) => {}
        (SchemaKind::Number { integer: false, .. }, Value::Number(_)) => {}
        (SchemaKind::Number { integer: true, .. }, Value::Number(number))
            if number.is_i64() || number.is_u64() => {}
        (SchemaKind::Boolean { .. }, Value::Bool(_)) => {}
        (kind, _) => issues.push(issue(at, format!("must be {}", kind.type_name()))),
    }
}

fn issue(at: &DataPath, message: String) -> ValidationIssue {
    ValidationIssue {
        path: at.to_string(),
        message,
    }
}
