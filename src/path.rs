//! Dotted property paths over JSON object graphs: `user.name`, `lines.0.qty`.
//! Reads yield `None` on any missing segment; writes create missing objects and arrays on the way.

use crate::error::ScriptError;
use serde_json::{Map, Value};

/// Largest array index a path may name. Paths come from request keys, so array growth is capped.
pub const MAX_INDEX: usize = 9_999;

pub(crate) fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Parse an index segment of `path`, rejecting values above `MAX_INDEX`.
pub(crate) fn parse_index(segment: &str, path: &str) -> Result<usize, ScriptError> {
    segment
        .parse::<usize>()
        .ok()
        .filter(|i| *i <= MAX_INDEX)
        .ok_or_else(|| ScriptError::InvalidPath(path.to_string()))
}

fn segments(path: &str) -> Result<Vec<&str>, ScriptError> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ScriptError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

/// Read `path` from the variable map. A flat key equal to the whole path wins over nested lookup.
pub fn get_property<'a>(vars: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(v) = vars.get(path).filter(|v| !v.is_null()) {
        return Some(v);
    }
    let (root, rest) = path.split_once('.')?;
    get_nested(vars.get(root)?, rest)
}

/// Read `path` relative to `value`. Null leaves count as absent.
pub fn get_nested<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) if is_index(segment) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Write `value` at `path` in the variable map, creating intermediate containers.
pub fn set_property(vars: &mut Map<String, Value>, path: &str, value: Value) -> Result<(), ScriptError> {
    match path.split_once('.') {
        None if path.is_empty() => Err(ScriptError::InvalidPath(path.to_string())),
        None => {
            vars.insert(path.to_string(), value);
            Ok(())
        }
        Some((root, rest)) => {
            if root.is_empty() {
                return Err(ScriptError::InvalidPath(path.to_string()));
            }
            let slot = vars.entry(root.to_string()).or_insert(Value::Null);
            set_nested(slot, rest, value).map_err(|_| ScriptError::InvalidPath(path.to_string()))
        }
    }
}

/// Write `value` at `path` relative to `target`. Null slots become an array when the next
/// segment is an index, otherwise an object; arrays grow to fit the index.
pub fn set_nested(target: &mut Value, path: &str, value: Value) -> Result<(), ScriptError> {
    let parts = segments(path)?;
    let mut current = target;
    for (i, segment) in parts.iter().enumerate() {
        if current.is_null() {
            *current = if is_index(segment) {
                Value::Array(Vec::new())
            } else {
                Value::Object(Map::new())
            };
        }
        let last = i + 1 == parts.len();
        let slot = match current {
            Value::Array(items) if is_index(segment) => {
                let idx = parse_index(segment, path)?;
                if idx >= items.len() {
                    let len = idx
                        .checked_add(1)
                        .ok_or_else(|| ScriptError::InvalidPath(path.to_string()))?;
                    items.resize(len, Value::Null);
                }
                &mut items[idx]
            }
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            _ => return Err(ScriptError::InvalidPath(path.to_string())),
        };
        if last {
            *slot = value;
            return Ok(());
        }
        current = slot;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn reads_nested_objects_and_arrays() {
        let m = vars(json!({"user": {"name": "ann", "tags": ["a", "b"]}}));
        assert_eq!(get_property(&m, "user.name"), Some(&json!("ann")));
        assert_eq!(get_property(&m, "user.tags.1"), Some(&json!("b")));
        assert_eq!(get_property(&m, "user.tags.5"), None);
        assert_eq!(get_property(&m, "user.missing.deep"), None);
        assert_eq!(get_property(&m, "nobody.name"), None);
    }

    #[test]
    fn flat_dotted_key_wins() {
        let m = vars(json!({"user.name": "flat", "user": {"name": "nested"}}));
        assert_eq!(get_property(&m, "user.name"), Some(&json!("flat")));
    }

    #[test]
    fn null_leaf_reads_as_absent() {
        let m = vars(json!({"user": {"name": null}}));
        assert_eq!(get_property(&m, "user.name"), None);
    }

    #[test]
    fn writes_autovivify_intermediates() {
        let mut m = Map::new();
        set_property(&mut m, "order.lines.1.qty", json!(3)).unwrap();
        assert_eq!(Value::Object(m), json!({"order": {"lines": [null, {"qty": 3}]}}));
    }

    #[test]
    fn writes_into_existing_bean_and_grow_arrays() {
        let mut m = vars(json!({"user": {"id": 1, "name": null}, "ids": [1]}));
        set_property(&mut m, "user.name", json!("bob")).unwrap();
        set_property(&mut m, "ids.2", json!(9)).unwrap();
        assert_eq!(get_property(&m, "user.name"), Some(&json!("bob")));
        assert_eq!(m["ids"], json!([1, null, 9]));
    }

    #[test]
    fn writing_through_a_scalar_fails() {
        let mut m = vars(json!({"name": "x"}));
        assert!(matches!(
            set_property(&mut m, "name.first", json!("y")),
            Err(ScriptError::InvalidPath(_))
        ));
        assert!(set_property(&mut m, "a..b", json!(1)).is_err());
    }

    #[test]
    fn oversized_indexes_are_rejected() {
        let mut m = Map::new();
        for path in ["lines.18446744073709551615", "lines.99999999999999999999999", "lines.4000000000"] {
            assert!(
                matches!(set_property(&mut m, path, json!(1)), Err(ScriptError::InvalidPath(_))),
                "{} should be rejected",
                path
            );
        }
        set_property(&mut m, &format!("lines.{}", MAX_INDEX), json!(1)).unwrap();
        assert_eq!(m["lines"].as_array().map(Vec::len), Some(MAX_INDEX + 1));
    }
}
