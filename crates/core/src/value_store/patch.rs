#![forbid(unsafe_code)]

use super::{PatchError, ValueNode, ValueStore};
use crate::path::{DataPath, PathSegment};
use crate::schema::{SchemaKind, SchemaNode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Patch against a row document. Paths use `a.b[0]` syntax; `""` is the root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum RowPatch {
    Replace { path: String, value: Value },
    Add { path: String, value: Value },
    Remove { path: String },
}

impl RowPatch {
    pub fn path(&self) -> &str {
        match self {
            Self::Replace { path, .. } | Self::Add { path, .. } | Self::Remove { path } => path,
        }
    }
}

impl ValueStore<'_> {
    pub fn apply_patches(&mut self, patches: &[RowPatch]) -> Result<(), PatchError> {
        for patch in patches {
            self.apply_patch(patch)?;
        }
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: &RowPatch) -> Result<(), PatchError> {
        let path = DataPath::parse(patch.path()).map_err(|err| PatchError::InvalidPath {
            path: patch.path().to_string(),
            reason: err.to_string(),
        })?;
        if path.has_wildcard() {
            return Err(PatchError::InvalidPath {
                path: patch.path().to_string(),
                reason: "wildcards are not allowed in patches".to_string(),
            });
        }

        match patch {
            RowPatch::Replace { value, .. } => self.replace(&path, value),
            RowPatch::Add { value, .. } => self.add(&path, value),
            RowPatch::Remove { .. } => self.remove(&path),
        }
    }

    fn replace(&mut self, path: &DataPath, value: &Value) -> Result<(), PatchError> {
        if let Some(slot) = self.extra_value_mut(path) {
            *slot = value.clone();
            return Ok(());
        }
        let schema = self.schema.resolve(path).ok_or_else(|| not_found(path))?;
        let node = self.root.resolve_mut(path).ok_or_else(|| not_found(path))?;
        *node = checked_node(schema, value, path)?;
        Ok(())
    }

    fn add(&mut self, path: &DataPath, value: &Value) -> Result<(), PatchError> {
        let Some((parent_path, last)) = path.parent() else {
            return self.replace(path, value);
        };
        let parent = self
            .root
            .resolve_mut(&parent_path)
            .ok_or_else(|| not_found(path))?;

        match (parent, last) {
            (ValueNode::Array { items, .. }, PathSegment::Index(index)) => {
                if *index > items.len() {
                    return Err(not_found(path));
                }
                let schema = self.schema.resolve(path).ok_or_else(|| not_found(path))?;
                let node = checked_node(schema, value, path)?;
                items.insert(*index, node);
                self.root.rebase(DataPath::root());
                Ok(())
            }
            (ValueNode::Array { items, .. }, PathSegment::Key(key)) if key == "-" => {
                let element_path = parent_path.index(items.len());
                let schema = self
                    .schema
                    .resolve(&element_path)
                    .ok_or_else(|| not_found(path))?;
                items.push(checked_node(schema, value, &element_path)?);
                Ok(())
            }
            (ValueNode::Object { fields, extra, .. }, PathSegment::Key(key)) => {
                match self.schema.resolve(path) {
                    Some(schema) => {
                        let node = checked_node(schema, value, path)?;
                        fields.insert(key.clone(), node);
                    }
                    None if allows_additional(self.schema.resolve(&parent_path)) => {
                        extra.insert(key.clone(), value.clone());
                    }
                    None => return Err(not_found(path)),
                }
                Ok(())
            }
            _ => Err(not_found(path)),
        }
    }

    fn remove(&mut self, path: &DataPath) -> Result<(), PatchError> {
        let Some((parent_path, last)) = path.parent() else {
            return Err(PatchError::UnsupportedOperation {
                op: "remove",
                path: path.to_string(),
            });
        };
        let parent = self
            .root
            .resolve_mut(&parent_path)
            .ok_or_else(|| not_found(path))?;

        match (parent, last) {
            (ValueNode::Array { items, .. }, PathSegment::Index(index)) if *index < items.len() => {
                items.remove(*index);
                self.root.rebase(DataPath::root());
                Ok(())
            }
            (ValueNode::Object { fields, extra, .. }, PathSegment::Key(key)) => {
                if fields.remove(key).is_some() || extra.remove(key).is_some() {
                    Ok(())
                } else {
                    Err(not_found(path))
                }
            }
            _ => Err(not_found(path)),
        }
    }

    /// Raw JSON at `path` when it lies under an undeclared property of an
    /// object whose schema allows additional properties.
    fn extra_value_mut(&mut self, path: &DataPath) -> Option<&mut Value> {
        let depth = self.extra_depth(path)?;
        let (owner_path, rest) = path.split_at(depth);
        let (_, key_path) = rest.split_at(1);
        let Some(PathSegment::Key(key)) = rest.segments().first() else {
            return None;
        };
        match self.root.resolve_mut(&owner_path)? {
            ValueNode::Object { extra, .. } => {
                key_path.select_mut(extra.get_mut(key)?).into_iter().next()
            }
            _ => None,
        }
    }

    /// Depth of the object owning the undeclared property `path` runs through.
    fn extra_depth(&self, path: &DataPath) -> Option<usize> {
        let mut schema = self.schema;
        let mut node = &self.root;
        for (depth, segment) in path.segments().iter().enumerate() {
            match (node, segment, &schema.kind) {
                (
                    ValueNode::Object { fields, extra, .. },
                    PathSegment::Key(key),
                    SchemaKind::Object {
                        properties,
                        additional_properties,
                        ..
                    },
                ) => match (properties.get(key), fields.get(key)) {
                    (Some(child_schema), Some(child)) => {
                        schema = child_schema;
                        node = child;
                    }
                    (None, _) if *additional_properties && extra.contains_key(key) => {
                        return Some(depth);
                    }
                    _ => return None,
                },
                (
                    ValueNode::Array { items, .. },
                    PathSegment::Index(index),
                    SchemaKind::Array {
                        items: item_schema, ..
                    },
                ) => {
                    node = items.get(*index)?;
                    schema = item_schema.as_ref();
                }
                _ => return None,
            }
        }
        None
    }
}

fn allows_additional(schema: Option<&SchemaNode>) -> bool {
    matches!(
        schema.map(|schema| &schema.kind),
        Some(SchemaKind::Object {
            additional_properties: true,
            ..
        })
    )
}

fn not_found(path: &DataPath) -> PatchError {
    PatchError::PathNotFound {
        path: path.to_string(),
    }
}

/// Type-checks `value` against `schema` and builds the replacement node.
///
/// Scalars get a plain type check; objects and arrays must validate as a
/// whole subtree.
fn checked_node(schema: &SchemaNode, value: &Value, path: &DataPath) -> Result<ValueNode, PatchError> {
    let path_text = path.to_string();
    let node = match (&schema.kind, value) {
        (SchemaKind::String { .. }, Value::String(text)) => ValueNode::String {
            path: path.clone(),
            value: text.clone(),
        },
        (SchemaKind::Number { integer, .. }, Value::Number(number))
            if !*integer || number.is_i64() || number.is_u64() =>
        {
            ValueNode::Number {
                path: path.clone(),
                value: number.clone(),
            }
        }
        (SchemaKind::Boolean { .. }, Value::Bool(flag)) => ValueNode::Boolean {
            path: path.clone(),
            value: *flag,
        },
        (SchemaKind::Object { .. } | SchemaKind::Array { .. }, _) => {
            let issues = schema.validate_at(value, path);
            if !issues.is_empty() {
                return Err(PatchError::InvalidValue {
                    path: path_text,
                    issues,
                });
            }
            ValueNode::build(schema, value, path.clone())
        }
        (kind, _) => {
            return Err(PatchError::TypeMismatch {
                path: path_text,
                expected: kind.type_name(),
            });
        }
    };
    Ok(node)
}

/// Minimal list of `replace` patches turning `from` into `to`.
pub fn to_patches(from: &Value, to: &Value) -> Vec<RowPatch> {
    let mut out = Vec::new();
    diff_into(from, to, &DataPath::root(), &mut out);
    out
}

fn diff_into(from: &Value, to: &Value, at: &DataPath, out: &mut Vec<RowPatch>) {
    if from == to {
        return;
    }
    match (from, to) {
        (Value::Object(a), Value::Object(b))
            if a.len() == b.len() && a.keys().all(|key| b.contains_key(key)) =>
        {
            for (key, left) in a {
                if let Some(right) = b.get(key) {
                    diff_into(left, right, &at.key(key.clone()), out);
                }
            }
        }
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => {
            for (index, (left, right)) in a.iter().zip(b).enumerate() {
                diff_into(left, right, &at.index(index), out);
            }
        }
        _ => out.push(RowPatch::Replace {
            path: at.to_string(),
            value: to.clone(),
        }),
    }
}
