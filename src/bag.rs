//! Request-scoped variable bag: named values plus model handles bound for this request only.

use crate::error::ScriptError;
use crate::model::ModelHandle;
use crate::path;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const REDIRECT_KEY: &str = "redirect";
pub const SUCCESS_KEY: &str = "success";
pub const MESSAGE_KEY: &str = "message";

#[derive(Clone, Default)]
pub struct VariableBag {
    vars: Map<String, Value>,
    models: HashMap<String, Arc<dyn ModelHandle>>,
}

impl VariableBag {
    pub fn new() -> Self {
        VariableBag::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    /// True when `name` holds a value or a bound model.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name) || self.models.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.vars.keys()
    }

    pub fn vars(&self) -> &Map<String, Value> {
        &self.vars
    }

    pub fn into_vars(self) -> Map<String, Value> {
        self.vars
    }

    /// Value at a dotted path, `None` when any segment is missing.
    pub fn property(&self, path: &str) -> Option<&Value> {
        path::get_property(&self.vars, path)
    }

    pub fn set_property(&mut self, path: &str, value: Value) -> Result<(), ScriptError> {
        path::set_property(&mut self.vars, path, value)
    }

    /// Bind a model handle under `name`; scripts calling `name.method(..)` use it before the provider.
    pub fn bind_model(&mut self, name: impl Into<String>, handle: Arc<dyn ModelHandle>) {
        self.models.insert(name.into(), handle);
    }

    pub fn model(&self, name: &str) -> Option<Arc<dyn ModelHandle>> {
        self.models.get(name).cloned()
    }

    /// Non-empty `redirect` value.
    pub fn redirect(&self) -> Option<&str> {
        self.vars
            .get(REDIRECT_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn success(&self) -> Option<bool> {
        self.vars.get(SUCCESS_KEY).and_then(Value::as_bool)
    }

    pub fn message(&self) -> Option<&str> {
        self.vars.get(MESSAGE_KEY).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for VariableBag {
    fn from(vars: Map<String, Value>) -> Self {
        VariableBag {
            vars,
            models: HashMap::new(),
        }
    }
}

impl fmt::Debug for VariableBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableBag")
            .field("vars", &self.vars)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}
