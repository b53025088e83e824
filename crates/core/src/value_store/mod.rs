#![forbid(unsafe_code)]

//! Row documents mirrored onto their compiled schema.
//!
//! A [`ValueStore`] pairs a [`SchemaNode`] tree with a [`ValueNode`] tree of
//! the same shape. Patches are resolved and type-checked against both trees,
//! then the store is turned back into a plain JSON value.

mod patch;

pub use patch::*;

use crate::path::{DataPath, PathSegment};
use crate::schema::{SchemaKind, SchemaNode, ValidationIssue};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub enum ValueNode {
    Object {
        path: DataPath,
        fields: BTreeMap<String, ValueNode>,
        /// Undeclared properties kept verbatim when the schema allows them.
        extra: Map<String, Value>,
    },
    Array {
        path: DataPath,
        items: Vec<ValueNode>,
    },
    String {
        path: DataPath,
        value: String,
    },
    Number {
        path: DataPath,
        value: Number,
    },
    Boolean {
        path: DataPath,
        value: bool,
    },
}

impl ValueNode {
    /// Builds a node for `value`, which must already validate against `schema`.
    fn build(schema: &SchemaNode, value: &Value, path: DataPath) -> ValueNode {
        match (&schema.kind, value) {
            (SchemaKind::Object { properties, .. }, Value::Object(map)) => {
                let mut fields = BTreeMap::new();
                let mut extra = Map::new();
                for (key, child) in map {
                    match properties.get(key) {
                        Some(child_schema) => {
                            fields.insert(
                                key.clone(),
                                ValueNode::build(child_schema, child, path.key(key.clone())),
                            );
                        }
                        None => {
                            extra.insert(key.clone(), child.clone());
                        }
                    }
                }
                ValueNode::Object {
                    path,
                    fields,
                    extra,
                }
            }
            (SchemaKind::Array { items, .. }, Value::Array(values)) => ValueNode::Array {
                items: values
                    .iter()
                    .enumerate()
                    .map(|(index, item)| ValueNode::build(items, item, path.index(index)))
                    .collect(),
                path,
            },
            (_, Value::String(text)) => ValueNode::String {
                path,
                value: text.clone(),
            },
            (_, Value::Number(number)) => ValueNode::Number {
                path,
                value: number.clone(),
            },
            (_, Value::Bool(flag)) => ValueNode::Boolean { path, value: *flag },
            // Unreachable for validated input; fall back to the schema default.
            _ => ValueNode::build(schema, &schema.default_value(), path),
        }
    }

    pub fn path(&self) -> &DataPath {
        match self {
            Self::Object { path, .. }
            | Self::Array { path, .. }
            | Self::String { path, .. }
            | Self::Number { path, .. }
            | Self::Boolean { path, .. } => path,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Object { fields, extra, .. } => {
                let mut map = extra.clone();
                for (key, node) in fields {
                    map.insert(key.clone(), node.to_value());
                }
                Value::Object(map)
            }
            Self::Array { items, .. } => Value::Array(items.iter().map(ValueNode::to_value).collect()),
            Self::String { value, .. } => Value::String(value.clone()),
            Self::Number { value, .. } => Value::Number(value.clone()),
            Self::Boolean { value, .. } => Value::Bool(*value),
        }
    }

    fn child_mut(&mut self, segment: &PathSegment) -> Option<&mut ValueNode> {
        match (self, segment) {
            (Self::Object { fields, .. }, PathSegment::Key(key)) => fields.get_mut(key),
            (Self::Array { items, .. }, PathSegment::Index(index)) => items.get_mut(*index),
            _ => None,
        }
    }

    fn resolve_mut(&mut self, path: &DataPath) -> Option<&mut ValueNode> {
        let mut node = self;
        for segment in path.segments() {
            node = node.child_mut(segment)?;
        }
        Some(node)
    }

    /// Rewrites stored paths after array elements shifted.
    fn rebase(&mut self, path: DataPath) {
        match self {
            Self::Object {
                path: own, fields, ..
            } => {
                for (key, child) in fields.iter_mut() {
                    child.rebase(path.key(key.clone()));
                }
                *own = path;
            }
            Self::Array { path: own, items } => {
                for (index, child) in items.iter_mut().enumerate() {
                    child.rebase(path.index(index));
                }
                *own = path;
            }
            Self::String { path: own, .. }
            | Self::Number { path: own, .. }
            | Self::Boolean { path: own, .. } => *own = path,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ValueStore<'s> {
    schema: &'s SchemaNode,
    root: ValueNode,
}

impl<'s> ValueStore<'s> {
    pub fn schema(&self) -> &'s SchemaNode {
        self.schema
    }

    pub fn root(&self) -> &ValueNode {
        &self.root
    }

    pub fn to_value(&self) -> Value {
        self.root.to_value()
    }

    /// Serializes the store and re-validates the whole document.
    pub fn into_validated_value(self) -> Result<Value, PatchError> {
        let value = self.root.to_value();
        let issues = self.schema.validate(&value);
        if issues.is_empty() {
            Ok(value)
        } else {
            Err(PatchError::DataNotValid { issues })
        }
    }
}

/// Mirrors `data` onto `schema`. Fails when `data` does not validate.
pub fn create_value_store<'s>(
    schema: &'s SchemaNode,
    data: &Value,
) -> Result<ValueStore<'s>, PatchError> {
    let issues = schema.validate(data);
    if !issues.is_empty() {
        return Err(PatchError::DataNotValid { issues });
    }
    Ok(ValueStore {
        schema,
        root: ValueNode::build(schema, data, DataPath::root()),
    })
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("path '{path}' not found")]
    PathNotFound { path: String },
    #[error("{path}: must be {expected}")]
    TypeMismatch { path: String, expected: &'static str },
    #[error("value at '{path}' is not valid")]
    InvalidValue {
        path: String,
        issues: Vec<ValidationIssue>,
    },
    #[error("{}", format_issues(.issues))]
    DataNotValid { issues: Vec<ValidationIssue> },
    #[error("cannot {op} at '{path}'")]
    UnsupportedOperation { op: &'static str, path: String },
}

impl PatchError {
    /// Path-qualified details for user-facing error payloads.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        match self {
            Self::InvalidValue { issues, .. } | Self::DataNotValid { issues } => issues.clone(),
            Self::TypeMismatch { path, expected } => vec![ValidationIssue {
                path: path.clone(),
                message: format!("must be {expected}"),
            }],
            Self::InvalidPath { path, reason } => vec![ValidationIssue {
                path: path.clone(),
                message: reason.clone(),
            }],
            Self::PathNotFound { path } => vec![ValidationIssue {
                path: path.clone(),
                message: "path not found".to_string(),
            }],
            Self::UnsupportedOperation { op, path } => vec![ValidationIssue {
                path: path.clone(),
                message: format!("cannot {op}"),
            }],
        }
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    let parts = issues.iter().map(ToString::to_string).collect::<Vec<_>>();
    format!("data is not valid: {}", parts.join("; "))
}
