//! Value conversion to declared types, and bean assembly from rows or flat dotted request keys.

use crate::case::lookup_field;
use crate::config::{TypeRegistry, ValueType};
use crate::error::ScriptError;
use crate::path::{is_index, parse_index};
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn conversion_error(value: &Value, target: &ValueType) -> ScriptError {
    ScriptError::Conversion {
        value: text_of(value),
        target: target.to_string(),
    }
}

fn integral(value: &Value, target: &ValueType) -> Result<Value, ScriptError> {
    let n = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| conversion_error(value, target))?;
    let in_range = match target {
        ValueType::Byte => i8::try_from(n).is_ok(),
        ValueType::Short => i16::try_from(n).is_ok(),
        ValueType::Int => i32::try_from(n).is_ok(),
        _ => true,
    };
    if !in_range {
        return Err(conversion_error(value, target));
    }
    Ok(Value::Number(n.into()))
}

fn floating(value: &Value, target: &ValueType) -> Result<Value, ScriptError> {
    let f = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
    .and_then(Number::from_f64)
    .ok_or_else(|| conversion_error(value, target))?;
    Ok(Value::Number(f))
}

/// Convert `value` to `target`. Null stays null except for primitives, which take their zero value.
pub fn convert_value(value: &Value, target: &ValueType, types: &TypeRegistry) -> Result<Value, ScriptError> {
    if value.is_null() {
        return Ok(if target.is_primitive() { target.default_value() } else { Value::Null });
    }
    match target {
        ValueType::String => Ok(Value::String(text_of(value))),
        ValueType::Char => text_of(value)
            .chars()
            .next()
            .map(|c| Value::String(c.to_string()))
            .ok_or_else(|| conversion_error(value, target)),
        ValueType::Bool => Ok(Value::Bool(match value {
            Value::Bool(b) => *b,
            other => text_of(other).eq_ignore_ascii_case("true"),
        })),
        t if t.is_integral() => integral(value, t),
        ValueType::Float | ValueType::Double => floating(value, target),
        ValueType::Bean(name) => match value {
            Value::Object(map) => convert_bean(map, name, types),
            other => Ok(other.clone()),
        },
        ValueType::Array(element) => match value {
            Value::Array(items) => items
                .iter()
                .map(|v| convert_value(v, element, types))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        },
        _ => Ok(value.clone()),
    }
}

/// Map a name -> value structure (e.g. a result row) onto bean `name`, field by field.
/// Fields are matched by exact name, then by their snake_case column form.
pub fn convert_bean(map: &Map<String, Value>, name: &str, types: &TypeRegistry) -> Result<Value, ScriptError> {
    let schema = types
        .schema(name)
        .ok_or_else(|| ScriptError::UnknownType(name.to_string()))?;
    let mut bean = Map::new();
    for f in &schema.fields {
        let v = match lookup_field(map, &f.name) {
            Some(v) => convert_value(v, &f.type_, types)?,
            None => f.type_.default_value(),
        };
        bean.insert(f.name.clone(), v);
    }
    Ok(Value::Object(bean))
}

/// Assembles beans from flat request keys such as `user.name` and `user.address.city`.
pub struct BeanBuilder<'a> {
    types: &'a TypeRegistry,
    flat: &'a Map<String, Value>,
}

impl<'a> BeanBuilder<'a> {
    pub fn new(types: &'a TypeRegistry, flat: &'a Map<String, Value>) -> Self {
        BeanBuilder { types, flat }
    }

    fn has_prefix(&self, prefix: &str) -> bool {
        self.flat.keys().any(|k| k.starts_with(prefix))
    }

    /// Build bean `name` from every flat key under `prefix.`.
    pub fn build(&self, name: &str, prefix: &str) -> Result<Value, ScriptError> {
        let schema = self
            .types
            .schema(name)
            .ok_or_else(|| ScriptError::UnknownType(name.to_string()))?;
        let mut bean = Map::new();
        for f in &schema.fields {
            let key = format!("{}.{}", prefix, f.name);
            let v = self.field(&key, &f.type_)?;
            bean.insert(f.name.clone(), v);
        }
        Ok(Value::Object(bean))
    }

    fn field(&self, key: &str, ty: &ValueType) -> Result<Value, ScriptError> {
        let direct = self.flat.get(key).filter(|v| !v.is_null());
        match ty {
            ValueType::Bean(name) => match direct {
                Some(v @ Value::Object(_)) => convert_value(v, ty, self.types),
                _ if self.has_prefix(&format!("{}.", key)) => self.build(name, key),
                _ => Ok(Value::Null),
            },
            ValueType::Array(element) => match direct {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|v| convert_value(v, element, self.types))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                Some(single) => Ok(Value::Array(vec![convert_value(single, element, self.types)?])),
                None => self.indexed(key, element),
            },
            _ => match direct {
                Some(v) => convert_value(v, ty, self.types),
                None => Ok(ty.default_value()),
            },
        }
    }

    /// `key.0.x`, `key.1.x` ... assembled into an array; null when no such keys exist.
    fn indexed(&self, key: &str, element: &ValueType) -> Result<Value, ScriptError> {
        let prefix = format!("{}.", key);
        let mut indexes = BTreeSet::new();
        for (k, rest) in self.flat.keys().filter_map(|k| k.strip_prefix(&prefix).map(|rest| (k, rest))) {
            let segment = rest.split('.').next().unwrap_or_default();
            if is_index(segment) {
                indexes.insert(parse_index(segment, k)?);
            }
        }
        let Some(&max) = indexes.iter().next_back() else {
            return Ok(Value::Null);
        };
        let len = max
            .checked_add(1)
            .ok_or_else(|| ScriptError::InvalidPath(prefix.clone()))?;
        let mut items = vec![element.default_value(); len];
        for i in indexes {
            items[i] = self.field(&format!("{}{}", prefix, i), element)?;
        }
        Ok(Value::Array(items))
    }
}
