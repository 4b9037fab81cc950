//! SQL-backed model handle: one per entity, methods backed by the entity's templates.

use crate::bean::convert_value;
use crate::config::{TypeRegistry, ValueType};
use crate::error::{ConfigError, ScriptError};
use crate::model::{cache_key, LruCache, MethodSignature, ModelDescriptor, ModelHandle};
use crate::sql::{bind_template, ResultRow, SqlExecutor};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

pub struct SqlModel {
    descriptor: ModelDescriptor,
    executor: Arc<dyn SqlExecutor>,
    types: Arc<TypeRegistry>,
    caches: DashMap<String, Arc<LruCache>>,
    default_capacity: usize,
}

impl SqlModel {
    pub fn new(
        descriptor: ModelDescriptor,
        executor: Arc<dyn SqlExecutor>,
        types: Arc<TypeRegistry>,
        default_capacity: usize,
    ) -> Self {
        SqlModel {
            descriptor,
            executor,
            types,
            caches: DashMap::new(),
            default_capacity,
        }
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    /// Result cache by name, created on first use with its configured capacity.
    pub fn cache(&self, name: &str) -> Arc<LruCache> {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(LruCache::new(
                    self.descriptor.caches.capacity(name, self.default_capacity),
                ))
            })
            .value()
            .clone()
    }

    /// Run the method's statement. Execution and result mapping failures are logged and
    /// degrade to the return type's default value.
    async fn run(&self, sig: &MethodSignature, arg: Option<&Value>) -> Result<Value, ScriptError> {
        let template = self.descriptor.template(&sig.name).ok_or_else(|| {
            ScriptError::Config(ConfigError::MissingReference {
                kind: "sql template",
                id: format!("{}.{}", self.descriptor.entity, sig.name),
            })
        })?;
        let bound = bind_template(template, arg);
        let outcome = if bound.is_query() {
            match self.executor.fetch(&bound.sql, &bound.params).await {
                Ok(rows) => map_rows(rows, &sig.returns, &self.types).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            }
        } else {
            self.executor
                .execute(&bound.sql, &bound.params)
                .await
                .map(|count| map_update(count, &sig.returns))
                .map_err(|e| e.to_string())
        };
        match outcome {
            Ok(v) => Ok(v),
            Err(e) => {
                tracing::error!(
                    entity = %self.descriptor.entity,
                    method = %sig.name,
                    sql = %bound.sql,
                    params = ?bound.params,
                    error = %e,
                    "data access failed, returning default"
                );
                Ok(sig.returns.default_value())
            }
        }
    }
}

#[async_trait]
impl ModelHandle for SqlModel {
    fn name(&self) -> &str {
        &self.descriptor.entity
    }

    fn method(&self, name: &str) -> Option<MethodSignature> {
        self.descriptor.method(name).cloned()
    }

    async fn invoke(&self, method: &str, arg: Option<Value>) -> Result<Value, ScriptError> {
        let sig = self.descriptor.method(method).ok_or_else(|| ScriptError::NoSuchMethod {
            model: self.descriptor.entity.clone(),
            method: method.to_string(),
        })?;
        let key = cache_key(arg.as_ref());
        let result_cache = self.descriptor.caches.result.get(method).map(|name| self.cache(name));
        if let Some(cache) = &result_cache {
            if let Some(hit) = cache.get(&key) {
                tracing::debug!(entity = %self.descriptor.entity, method, key = %key, "cache hit");
                return Ok(hit);
            }
        }
        let result = self.run(sig, arg.as_ref()).await?;
        if let Some(cache) = &result_cache {
            if !result.is_null() {
                cache.put(key.clone(), result.clone());
            }
        }
        if let Some(names) = self.descriptor.caches.invalidate.get(method) {
            for name in names {
                self.cache(name).remove(&key);
            }
        }
        Ok(result)
    }
}

/// Map query rows to the declared return type. One-column rows flatten to their cell value,
/// wider rows become name -> value objects in column order. No rows is null.
pub fn map_rows(rows: Vec<ResultRow>, returns: &ValueType, types: &TypeRegistry) -> Result<Value, ScriptError> {
    let Some(first) = rows.first() else {
        return Ok(Value::Null);
    };
    let single_column = first.columns.len() == 1;
    let mut values: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            if single_column {
                row.columns.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null)
            } else {
                Value::Object(row.into_map())
            }
        })
        .collect();
    match returns {
        ValueType::Void => Ok(Value::Null),
        ValueType::List | ValueType::Any => Ok(Value::Array(values)),
        ValueType::Array(element) => values
            .iter()
            .map(|v| convert_value(v, element, types))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => convert_value(&values.swap_remove(0), other, types),
    }
}

/// Map an affected-row count: `bool` is `rows > 0`, integral types get the count, anything else null.
pub fn map_update(count: u64, returns: &ValueType) -> Value {
    match returns {
        ValueType::Bool => Value::Bool(count > 0),
        t if t.is_integral() => Value::from(count),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldDef, TypeSchema};
    use serde_json::json;

    fn row(cols: &[(&str, Value)]) -> ResultRow {
        ResultRow::new(cols.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    fn types() -> TypeRegistry {
        TypeRegistry::from_schemas(
            "app",
            vec![TypeSchema {
                name: "app.User".into(),
                fields: vec![
                    FieldDef { name: "id".into(), type_: ValueType::Long },
                    FieldDef { name: "fullName".into(), type_: ValueType::String },
                ],
            }],
        )
    }

    #[test]
    fn multi_column_rows_keep_label_order() {
        let rows = vec![row(&[("b", json!(1)), ("a", json!(2))])];
        let v = map_rows(rows, &ValueType::Any, &types()).unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"[{"b":1,"a":2}]"#);
    }

    #[test]
    fn single_column_rows_flatten() {
        let rows = vec![row(&[("id", json!(1))]), row(&[("id", json!(2))])];
        assert_eq!(map_rows(rows.clone(), &ValueType::List, &types()).unwrap(), json!([1, 2]));
        assert_eq!(map_rows(rows, &ValueType::Int, &types()).unwrap(), json!(1));
    }

    #[test]
    fn empty_result_is_null() {
        assert_eq!(map_rows(vec![], &ValueType::List, &types()).unwrap(), Value::Null);
        assert_eq!(map_rows(vec![], &ValueType::Int, &types()).unwrap(), Value::Null);
    }

    #[test]
    fn rows_convert_to_beans() {
        let rows = vec![
            row(&[("id", json!(1)), ("full_name", json!("Ann"))]),
            row(&[("id", json!(2)), ("full_name", json!("Bo"))]),
        ];
        let bean = ValueType::Bean("User".into());
        assert_eq!(
            map_rows(rows.clone(), &bean, &types()).unwrap(),
            json!({"id": 1, "fullName": "Ann"})
        );
        let all = map_rows(rows, &ValueType::Array(Box::new(bean)), &types()).unwrap();
        assert_eq!(all[1], json!({"id": 2, "fullName": "Bo"}));
    }

    #[test]
    fn update_counts_map_by_return_type() {
        assert_eq!(map_update(1, &ValueType::Bool), json!(true));
        assert_eq!(map_update(0, &ValueType::Bool), json!(false));
        assert_eq!(map_update(3, &ValueType::Int), json!(3));
        assert_eq!(map_update(3, &ValueType::Any), Value::Null);
    }
}
