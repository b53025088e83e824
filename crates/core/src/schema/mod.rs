#![forbid(unsafe_code)]

//! Compiled JSON Schema trees.
//!
//! A table schema is a JSON Schema document restricted to the `object`,
//! `array`, `string`, `number`, `integer` and `boolean` types, plus two
//! extensions: `foreignKey` on string fields (names the referenced table) and
//! `$ref` (names a shared schema). [`compile_schema`] turns the document into
//! a [`SchemaNode`] tree where every node knows its data path and the JSON
//! Pointer of its definition.

mod compile;
mod conform;
mod validate;

pub use compile::*;
pub use validate::ValidationIssue;

use crate::path::{DataPath, PathSegment};
use serde_json::{Number, Value};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq)]
pub struct SchemaNode {
    pub path: DataPath,
    pub pointer: String,
    pub kind: SchemaKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SchemaKind {
    Object {
        properties: BTreeMap<String, SchemaNode>,
        required: BTreeSet<String>,
        additional_properties: bool,
    },
    Array {
        items: Box<SchemaNode>,
        default: Vec<Value>,
    },
    String {
        default: String,
        foreign_key: Option<String>,
    },
    Number {
        default: Number,
        integer: bool,
    },
    Boolean {
        default: bool,
    },
}

impl SchemaKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Object { .. } => "object",
            Self::Array { .. } => "array",
            Self::String { .. } => "string",
            Self::Number { integer: true, .. } => "integer",
            Self::Number { .. } => "number",
            Self::Boolean { .. } => "boolean",
        }
    }
}

/// A string field declared with `foreignKey`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKeyField {
    pub path: DataPath,
    pub pointer: String,
    pub table_id: String,
}

impl SchemaNode {
    pub fn is_scalar(&self) -> bool {
        matches!(
            self.kind,
            SchemaKind::String { .. } | SchemaKind::Number { .. } | SchemaKind::Boolean { .. }
        )
    }

    /// Value synthesized from `default` annotations (or the type's zero value).
    pub fn default_value(&self) -> Value {
        match &self.kind {
            SchemaKind::Object { properties, .. } => Value::Object(
                properties
                    .iter()
                    .map(|(name, node)| (name.clone(), node.default_value()))
                    .collect(),
            ),
            SchemaKind::Array { default, .. } => Value::Array(default.clone()),
            SchemaKind::String { default, .. } => Value::String(default.clone()),
            SchemaKind::Number { default, .. } => Value::Number(default.clone()),
            SchemaKind::Boolean { default } => Value::Bool(*default),
        }
    }

    /// Schema node governing `path`. Array indices and `[*]` both descend into
    /// `items`.
    pub fn resolve(&self, path: &DataPath) -> Option<&SchemaNode> {
        let mut node = self;
        for segment in path.segments() {
            node = match (segment, &node.kind) {
                (PathSegment::Key(key), SchemaKind::Object { properties, .. }) => {
                    properties.get(key)?
                }
                (
                    PathSegment::Index(_) | PathSegment::Wildcard,
                    SchemaKind::Array { items, .. },
                ) => items,
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn foreign_keys(&self) -> Vec<ForeignKeyField> {
        let mut out = Vec::new();
        collect_foreign_keys(self, &mut out);
        out
    }

    pub fn references_table(&self, table_id: &str) -> bool {
        self.foreign_keys()
            .iter()
            .any(|field| field.table_id == table_id)
    }
}

fn collect_foreign_keys(node: &SchemaNode, out: &mut Vec<ForeignKeyField>) {
    match &node.kind {
        SchemaKind::Object { properties, .. } => {
            for child in properties.values() {
                collect_foreign_keys(child, out);
            }
        }
        SchemaKind::Array { items, .. } => collect_foreign_keys(items, out),
        SchemaKind::String {
            foreign_key: Some(table_id),
            ..
        } => out.push(ForeignKeyField {
            path: node.path.clone(),
            pointer: node.pointer.clone(),
            table_id: table_id.clone(),
        }),
        SchemaKind::String { .. } | SchemaKind::Number { .. } | SchemaKind::Boolean { .. } => {}
    }
}

/// Translates a schema pointer such as `/properties/items/items/properties/x`
/// into the data path it governs (`items[*].x`).
pub fn pointer_to_data_path(pointer: &str) -> Option<DataPath> {
    let mut path = DataPath::root();
    let mut tokens = crate::json_patch::parse_pointer(pointer).ok()?.into_iter();
    while let Some(token) = tokens.next() {
        match token.as_str() {
            "properties" => path = path.key(tokens.next()?),
            "items" => path = path.wildcard(),
            _ => return None,
        }
    }
    Some(path)
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema at '{pointer}' must be a JSON object")]
    NotAnObject { pointer: String },
    #[error("schema at '{pointer}' has unsupported type '{found}'")]
    UnsupportedType { pointer: String, found: String },
    #[error("array schema at '{pointer}' must declare items")]
    MissingItems { pointer: String },
    #[error("invalid property name '{name}' at '{pointer}'")]
    InvalidPropertyName { pointer: String, name: String },
    #[error("required property '{name}' at '{pointer}' is not declared")]
    UnknownRequired { pointer: String, name: String },
    #[error("default at '{pointer}' does not match the declared type")]
    InvalidDefault { pointer: String },
    #[error("unresolved $ref '{name}' at '{pointer}'")]
    UnresolvedRef { pointer: String, name: String },
    #[error("$ref nesting too deep at '{pointer}'")]
    RefDepthExceeded { pointer: String },
    #[error("foreignKey at '{pointer}' is invalid")]
    InvalidForeignKey { pointer: String },
    #[error("foreignKey is not allowed inside shared schema (at '{pointer}')")]
    ForeignKeyInSharedSchema { pointer: String },
}
