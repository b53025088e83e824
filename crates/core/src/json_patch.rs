#![forbid(unsafe_code)]

//! RFC 6902 JSON Patch over JSON Pointers, used for schema documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum JsonPatch {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
}

impl JsonPatch {
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. } => path,
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum JsonPatchError {
    #[error("invalid JSON pointer '{0}'")]
    InvalidPointer(String),
    #[error("path '{0}' does not exist")]
    PathNotFound(String),
    #[error("cannot {op} the document root")]
    RootOperation { op: &'static str },
    #[error("cannot move '{from}' into its own child '{path}'")]
    MoveIntoChild { from: String, path: String },
}

pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

pub fn parse_pointer(pointer: &str) -> Result<Vec<String>, JsonPatchError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(JsonPatchError::InvalidPointer(pointer.to_string()));
    };
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Applies `patches` in order to a copy of `doc`. Either every patch applies
/// or the original document is left untouched.
pub fn apply_json_patches(doc: &Value, patches: &[JsonPatch]) -> Result<Value, JsonPatchError> {
    let mut out = doc.clone();
    for patch in patches {
        apply_one(&mut out, patch)?;
    }
    Ok(out)
}

fn apply_one(doc: &mut Value, patch: &JsonPatch) -> Result<(), JsonPatchError> {
    match patch {
        JsonPatch::Add { path, value } => add(doc, path, value.clone()),
        JsonPatch::Remove { path } => remove(doc, path).map(|_| ()),
        JsonPatch::Replace { path, value } => {
            let target = lookup_mut(doc, path)?;
            *target = value.clone();
            Ok(())
        }
        JsonPatch::Move { from, path } => {
            if from == path {
                return Ok(());
            }
            if path.starts_with(&format!("{from}/")) {
                return Err(JsonPatchError::MoveIntoChild {
                    from: from.clone(),
                    path: path.clone(),
                });
            }
            let value = remove(doc, from)?;
            add(doc, path, value)
        }
    }
}

fn lookup_mut<'a>(doc: &'a mut Value, pointer: &str) -> Result<&'a mut Value, JsonPatchError> {
    let tokens = parse_pointer(pointer)?;
    let mut current = doc;
    for token in &tokens {
        current = match current {
            Value::Object(map) => map.get_mut(token),
            Value::Array(items) => token
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get_mut(index)),
            _ => None,
        }
        .ok_or_else(|| JsonPatchError::PathNotFound(pointer.to_string()))?;
    }
    Ok(current)
}

fn split_parent(pointer: &str) -> Result<(String, String), JsonPatchError> {
    let tokens = parse_pointer(pointer)?;
    let Some((last, _)) = tokens.split_last() else {
        return Err(JsonPatchError::RootOperation { op: "modify" });
    };
    let parent_len = pointer.len() - escape_pointer_token(last).len() - 1;
    Ok((pointer[..parent_len].to_string(), last.clone()))
}

fn add(doc: &mut Value, pointer: &str, value: Value) -> Result<(), JsonPatchError> {
    if pointer.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, token) = split_parent(pointer)?;
    match lookup_mut(doc, &parent)? {
        Value::Object(map) => {
            map.insert(token, value);
            Ok(())
        }
        Value::Array(items) => {
            if token == "-" {
                items.push(value);
                return Ok(());
            }
            match token.parse::<usize>() {
                Ok(index) if index <= items.len() => {
                    items.insert(index, value);
                    Ok(())
                }
                _ => Err(JsonPatchError::PathNotFound(pointer.to_string())),
            }
        }
        _ => Err(JsonPatchError::PathNotFound(pointer.to_string())),
    }
}

fn remove(doc: &mut Value, pointer: &str) -> Result<Value, JsonPatchError> {
    if pointer.is_empty() {
        return Err(JsonPatchError::RootOperation { op: "remove" });
    }
    let (parent, token) = split_parent(pointer)?;
    let removed = match lookup_mut(doc, &parent)? {
        Value::Object(map) => map.remove(&token),
        Value::Array(items) => match token.parse::<usize>() {
            Ok(index) if index < items.len() => Some(items.remove(index)),
            _ => None,
        },
        _ => None,
    };
    removed.ok_or_else(|| JsonPatchError::PathNotFound(pointer.to_string()))
}
