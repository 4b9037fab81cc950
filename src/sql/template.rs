//! `${path}` placeholder substitution: each placeholder becomes `$n` and its value is taken from the call argument.

use crate::path::get_nested;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([_.0-9A-Za-z]+)\}").expect("static placeholder pattern"))
}

/// Statement text with positional markers and the values bound to them, in appearance order.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundSql {
    pub sql: String,
    pub params: Vec<Value>,
}

impl BoundSql {
    /// Only statements starting with a lowercase `select` are run as queries.
    pub fn is_query(&self) -> bool {
        self.sql.starts_with("select")
    }
}

/// Substitute placeholders. A scalar argument fills every placeholder; an object or array
/// argument is navigated with each placeholder's path. Missing values bind as null.
pub fn bind_template(template: &str, arg: Option<&Value>) -> BoundSql {
    let mut params = Vec::new();
    let sql = placeholder().replace_all(template, |caps: &Captures| {
        let value = match arg {
            None | Some(Value::Null) => Value::Null,
            Some(v @ (Value::Object(_) | Value::Array(_))) => get_nested(v, &caps[1]).cloned().unwrap_or(Value::Null),
            Some(scalar) => scalar.clone(),
        };
        params.push(value);
        format!("${}", params.len())
    });
    BoundSql {
        sql: sql.trim().to_string(),
        params,
    }
}
