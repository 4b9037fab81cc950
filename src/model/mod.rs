//! Model handles: named entities whose methods scripts call as `model.method(arg)`.

mod cache;
mod descriptor;
mod proxy;
mod registry;

pub use cache::*;
pub use descriptor::*;
pub use proxy::*;
pub use registry::*;

use crate::config::ValueType;
use crate::error::ScriptError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Declared shape of a model method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<ValueType>,
    pub returns: ValueType,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, params: Vec<ValueType>, returns: ValueType) -> Self {
        MethodSignature {
            name: name.into(),
            params,
            returns,
        }
    }
}

/// The object through which one entity's methods are invoked.
#[async_trait]
pub trait ModelHandle: Send + Sync {
    fn name(&self) -> &str;

    /// First declared method named `name`.
    fn method(&self, name: &str) -> Option<MethodSignature>;

    /// Invoke `method` with at most one argument, already converted to the declared parameter type.
    async fn invoke(&self, method: &str, arg: Option<Value>) -> Result<Value, ScriptError>;
}

/// Source of model handles by name, used when a script's call target is not bound in the bag.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn get_model(&self, name: &str) -> Result<Arc<dyn ModelHandle>, ScriptError>;
}

/// Fixed set of handles registered in code.
#[derive(Clone, Default)]
pub struct ModelSet {
    handles: HashMap<String, Arc<dyn ModelHandle>>,
}

impl ModelSet {
    pub fn new() -> Self {
        ModelSet::default()
    }

    pub fn with(mut self, name: impl Into<String>, handle: Arc<dyn ModelHandle>) -> Self {
        self.handles.insert(name.into(), handle);
        self
    }
}

#[async_trait]
impl ModelProvider for ModelSet {
    async fn get_model(&self, name: &str) -> Result<Arc<dyn ModelHandle>, ScriptError> {
        self.handles
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::NoSuchModel(name.to_string()))
    }
}
