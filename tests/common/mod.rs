#![allow(dead_code)]

use async_trait::async_trait;
use convention_mvc::sql::{ResultRow, SqlExecutor};
use parking_lot::Mutex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fresh directory under the system temp dir.
pub fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("convention-mvc-{}-{}", label, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn write(base: &Path, relative: &str, contents: &str) {
    let path = base.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

pub fn row(cols: &[(&str, Value)]) -> ResultRow {
    ResultRow::new(cols.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

/// In-memory executor: returns canned rows and counts, records every statement.
#[derive(Default)]
pub struct FakeExecutor {
    pub rows: Mutex<Vec<ResultRow>>,
    pub affected: u64,
    pub fail: bool,
    pub fetches: AtomicUsize,
    pub executes: AtomicUsize,
    pub statements: Mutex<Vec<(String, Vec<Value>)>>,
}

impl FakeExecutor {
    pub fn with_rows(rows: Vec<ResultRow>) -> Self {
        FakeExecutor {
            rows: Mutex::new(rows),
            affected: 1,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        FakeExecutor {
            fail: true,
            ..Default::default()
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn execute_count(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    fn record(&self, sql: &str, params: &[Value]) -> Result<(), sqlx::Error> {
        self.statements.lock().push((sql.to_string(), params.to_vec()));
        if self.fail {
            return Err(sqlx::Error::Protocol("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SqlExecutor for FakeExecutor {
    async fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<ResultRow>, sqlx::Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.record(sql, params)?;
        Ok(self.rows.lock().clone())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, sqlx::Error> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        self.record(sql, params)?;
        Ok(self.affected)
    }
}
