//! Bind serde_json::Value parameters onto sqlx PostgreSQL queries.

use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

pub type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Bind one value with its natural PostgreSQL type. Objects and arrays go over as JSON.
pub fn bind_value<'q>(query: PgQuery<'q>, value: &Value) -> PgQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(sqlx::types::Json(value.clone())),
    }
}

/// Bind all params positionally.
pub fn bind_all<'q>(sql: &'q str, params: &[Value]) -> PgQuery<'q> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, p| bind_value(query, p))
}
