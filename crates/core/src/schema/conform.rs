#![forbid(unsafe_code)]

use super::{SchemaKind, SchemaNode};
use serde_json::{Map, Number, Value};

impl SchemaNode {
    /// Reshapes `value` to fit this schema after a structural change.
    ///
    /// Matching values are kept, missing fields take their defaults, unknown
    /// fields are dropped (unless additional properties are allowed), and
    /// scalars are converted between string, number and boolean when the
    /// conversion is lossless. Anything else falls back to the default.
    pub fn conform(&self, value: &Value) -> Value {
        match (&self.kind, value) {
            (
                SchemaKind::Object {
                    properties,
                    additional_properties,
                    ..
                },
                Value::Object(map),
            ) => {
                let mut out = Map::new();
                for (name, child) in properties {
                    let next = match map.get(name) {
                        Some(existing) => child.conform(existing),
                        None => child.default_value(),
                    };
                    out.insert(name.clone(), next);
                }
                if *additional_properties {
                    for (key, extra) in map {
                        if !properties.contains_key(key) {
                            out.insert(key.clone(), extra.clone());
                        }
                    }
                }
                Value::Object(out)
            }
            (SchemaKind::Array { items, .. }, Value::Array(values)) => {
                Value::Array(values.iter().map(|item| items.conform(item)).collect())
            }
            (SchemaKind::String { .. }, Value::String(_)) => value.clone(),
            (SchemaKind::String { .. }, Value::Number(number)) => Value::String(number.to_string()),
            (SchemaKind::String { .. }, Value::Bool(flag)) => Value::String(flag.to_string()),
            (SchemaKind::Number { integer, .. }, _) => match number_from(value, *integer) {
                Some(number) => Value::Number(number),
                None => self.default_value(),
            },
            (SchemaKind::Boolean { .. }, Value::Bool(_)) => value.clone(),
            (SchemaKind::Boolean { .. }, Value::String(text)) => match text.trim() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => self.default_value(),
            },
            (SchemaKind::Boolean { .. }, Value::Number(number)) => match number.as_f64() {
                Some(v) if v == 0.0 => Value::Bool(false),
                Some(v) if v == 1.0 => Value::Bool(true),
                _ => self.default_value(),
            },
            _ => self.default_value(),
        }
    }
}

fn number_from(value: &Value, integer: bool) -> Option<Number> {
    let number = match value {
        Value::Number(number) => number.clone(),
        Value::String(text) => {
            let text = text.trim();
            if let Ok(v) = text.parse::<i64>() {
                Number::from(v)
            } else {
                Number::from_f64(text.parse::<f64>().ok()?)?
            }
        }
        Value::Bool(flag) => Number::from(u8::from(*flag)),
        _ => return None,
    };

    if !integer || number.is_i64() || number.is_u64() {
        return Some(number);
    }
    let float = number.as_f64()?;
    if float.fract() == 0.0 && float.abs() < 9.0e15 {
        Some(Number::from(float as i64))
    } else {
        None
    }
}
