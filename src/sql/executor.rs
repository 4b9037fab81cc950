//! Statement execution seam. `PgExecutor` runs against a sqlx pool; the pool owns connection
//! checkout limits, wait timeouts and idle eviction, and returns connections on drop.

use crate::sql::bind_all;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Column, Row, TypeInfo};

/// One result row, columns in label order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultRow {
    pub columns: Vec<(String, Value)>,
}

impl ResultRow {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        ResultRow { columns }
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.columns.into_iter().collect()
    }
}

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a query and return all rows.
    async fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<ResultRow>, sqlx::Error>;

    /// Run an update and return the affected row count.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        PgExecutor { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<ResultRow>, sqlx::Error> {
        tracing::debug!(sql = %sql, params = ?params, "query");
        let rows = bind_all(sql, params).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, sqlx::Error> {
        tracing::debug!(sql = %sql, params = ?params, "update");
        let done = bind_all(sql, params).execute(&self.pool).await?;
        Ok(done.rows_affected())
    }
}

fn decode_row(row: &PgRow) -> ResultRow {
    let columns = row
        .columns()
        .iter()
        .map(|col| (col.name().to_string(), decode_cell(row, col.ordinal(), col.type_info().name())))
        .collect();
    ResultRow { columns }
}

fn number(f: Option<f64>) -> Value {
    f.and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn decode_cell(row: &PgRow, i: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "INT2" => row.try_get::<Option<i16>, _>(i).map(|v| v.map(Value::from)),
        "INT4" => row.try_get::<Option<i32>, _>(i).map(|v| v.map(Value::from)),
        "INT8" => row.try_get::<Option<i64>, _>(i).map(|v| v.map(Value::from)),
        "FLOAT4" => row.try_get::<Option<f32>, _>(i).map(|v| Some(number(v.map(f64::from)))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(i).map(|v| Some(number(v))),
        "BOOL" => row.try_get::<Option<bool>, _>(i).map(|v| v.map(Value::Bool)),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(i)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i)
            .map(|v| v.map(|d| Value::String(d.to_rfc3339()))),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(i)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(i)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(i),
        _ => row.try_get::<Option<String>, _>(i).map(|v| v.map(Value::String)),
    };
    match decoded {
        Ok(v) => v.unwrap_or(Value::Null),
        Err(e) => {
            tracing::warn!(column = i, type_name, error = %e, "undecodable column, using null");
            Value::Null
        }
    }
}
