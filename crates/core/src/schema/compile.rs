#![forbid(unsafe_code)]

use super::{SchemaError, SchemaKind, SchemaNode};
use crate::json_patch::escape_pointer_token;
use crate::path::DataPath;
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, BTreeSet};

const MAX_REF_DEPTH: usize = 16;

/// Source of `$ref` targets (shared schemas).
pub trait SchemaResolver {
    fn resolve(&self, name: &str) -> Option<Value>;
}

/// Resolver for documents that must not contain `$ref`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRefs;

impl SchemaResolver for NoRefs {
    fn resolve(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl SchemaResolver for BTreeMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

pub fn compile_schema(
    schema: &Value,
    resolver: &dyn SchemaResolver,
) -> Result<SchemaNode, SchemaError> {
    let mut compiler = Compiler {
        resolver,
        ref_depth: 0,
    };
    compiler.compile(schema, DataPath::root(), String::new())
}

struct Compiler<'r> {
    resolver: &'r dyn SchemaResolver,
    ref_depth: usize,
}

impl Compiler<'_> {
    fn compile(
        &mut self,
        schema: &Value,
        path: DataPath,
        pointer: String,
    ) -> Result<SchemaNode, SchemaError> {
        let Value::Object(obj) = schema else {
            return Err(SchemaError::NotAnObject { pointer });
        };

        if let Some(reference) = obj.get("$ref") {
            return self.compile_ref(reference, path, pointer);
        }

        let type_name = obj.get("type").and_then(Value::as_str).unwrap_or_default();
        let kind = match type_name {
            "object" => self.compile_object(obj, &path, &pointer)?,
            "array" => self.compile_array(obj, &path, &pointer)?,
            "string" => compile_string(obj, &pointer, self.ref_depth > 0)?,
            "number" | "integer" => compile_number(obj, &pointer, type_name == "integer")?,
            "boolean" => SchemaKind::Boolean {
                default: match obj.get("default") {
                    None => false,
                    Some(Value::Bool(value)) => *value,
                    Some(_) => return Err(SchemaError::InvalidDefault { pointer }),
                },
            },
            other => {
                return Err(SchemaError::UnsupportedType {
                    pointer,
                    found: other.to_string(),
                });
            }
        };

        Ok(SchemaNode {
            path,
            pointer,
            kind,
        })
    }

    fn compile_ref(
        &mut self,
        reference: &Value,
        path: DataPath,
        pointer: String,
    ) -> Result<SchemaNode, SchemaError> {
        let Some(name) = reference.as_str() else {
            return Err(SchemaError::UnresolvedRef {
                pointer,
                name: reference.to_string(),
            });
        };
        if self.ref_depth >= MAX_REF_DEPTH {
            return Err(SchemaError::RefDepthExceeded { pointer });
        }
        let Some(target) = self.resolver.resolve(name) else {
            return Err(SchemaError::UnresolvedRef {
                pointer,
                name: name.to_string(),
            });
        };

        self.ref_depth += 1;
        let compiled = self.compile(&target, path, pointer);
        self.ref_depth -= 1;
        compiled
    }

    fn compile_object(
        &mut self,
        obj: &Map<String, Value>,
        path: &DataPath,
        pointer: &str,
    ) -> Result<SchemaKind, SchemaError> {
        let mut properties = BTreeMap::new();
        match obj.get("properties") {
            None => {}
            Some(Value::Object(props)) => {
                for (name, child) in props {
                    if !is_valid_property_name(name) {
                        return Err(SchemaError::InvalidPropertyName {
                            pointer: pointer.to_string(),
                            name: name.clone(),
                        });
                    }
                    let child_pointer =
                        format!("{pointer}/properties/{}", escape_pointer_token(name));
                    let node = self.compile(child, path.key(name.clone()), child_pointer)?;
                    properties.insert(name.clone(), node);
                }
            }
            Some(_) => {
                return Err(SchemaError::NotAnObject {
                    pointer: format!("{pointer}/properties"),
                });
            }
        }

        let required = match obj.get("required") {
            None => properties.keys().cloned().collect::<BTreeSet<_>>(),
            Some(Value::Array(items)) => {
                let mut required = BTreeSet::new();
                for item in items {
                    let Some(name) = item.as_str() else {
                        return Err(SchemaError::UnknownRequired {
                            pointer: pointer.to_string(),
                            name: item.to_string(),
                        });
                    };
                    if !properties.contains_key(name) {
                        return Err(SchemaError::UnknownRequired {
                            pointer: pointer.to_string(),
                            name: name.to_string(),
                        });
                    }
                    required.insert(name.to_string());
                }
                required
            }
            Some(other) => {
                return Err(SchemaError::UnknownRequired {
                    pointer: pointer.to_string(),
                    name: other.to_string(),
                });
            }
        };

        let additional_properties = obj
            .get("additionalProperties")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(SchemaKind::Object {
            properties,
            required,
            additional_properties,
        })
    }

    fn compile_array(
        &mut self,
        obj: &Map<String, Value>,
        path: &DataPath,
        pointer: &str,
    ) -> Result<SchemaKind, SchemaError> {
        let Some(items) = obj.get("items") else {
            return Err(SchemaError::MissingItems {
                pointer: pointer.to_string(),
            });
        };
        let items = self.compile(items, path.wildcard(), format!("{pointer}/items"))?;

        let default = match obj.get("default") {
            None => Vec::new(),
            Some(Value::Array(values)) => {
                if values.iter().any(|value| !items.validate(value).is_empty()) {
                    return Err(SchemaError::InvalidDefault {
                        pointer: pointer.to_string(),
                    });
                }
                values.clone()
            }
            Some(_) => {
                return Err(SchemaError::InvalidDefault {
                    pointer: pointer.to_string(),
                });
            }
        };

        Ok(SchemaKind::Array {
            items: Box::new(items),
            default,
        })
    }
}

fn compile_string(
    obj: &Map<String, Value>,
    pointer: &str,
    inside_shared: bool,
) -> Result<SchemaKind, SchemaError> {
    let default = match obj.get("default") {
        None => String::new(),
        Some(Value::String(value)) => value.clone(),
        Some(_) => {
            return Err(SchemaError::InvalidDefault {
                pointer: pointer.to_string(),
            });
        }
    };

    let foreign_key = match obj.get("foreignKey") {
        None => None,
        Some(_) if inside_shared => {
            return Err(SchemaError::ForeignKeyInSharedSchema {
                pointer: pointer.to_string(),
            });
        }
        Some(Value::String(table_id)) if !table_id.trim().is_empty() => Some(table_id.clone()),
        Some(_) => {
            return Err(SchemaError::InvalidForeignKey {
                pointer: pointer.to_string(),
            });
        }
    };

    Ok(SchemaKind::String {
        default,
        foreign_key,
    })
}

fn compile_number(
    obj: &Map<String, Value>,
    pointer: &str,
    integer: bool,
) -> Result<SchemaKind, SchemaError> {
    let default = match obj.get("default") {
        None => Number::from(0),
        Some(Value::Number(value)) if !integer || value.is_i64() || value.is_u64() => {
            value.clone()
        }
        Some(_) => {
            return Err(SchemaError::InvalidDefault {
                pointer: pointer.to_string(),
            });
        }
    };
    Ok(SchemaKind::Number { default, integer })
}

fn is_valid_property_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-'))
}
