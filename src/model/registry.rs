//! Loads entity sources from the model directory on first use and memoizes one proxy per entity.

use crate::case::capitalize;
use crate::config::{load_optional_properties, Properties, Settings, TypeRegistry};
use crate::error::{ConfigError, ScriptError};
use crate::model::{ModelDescriptor, ModelHandle, ModelProvider, SqlModel};
use crate::sql::SqlExecutor;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub struct SqlModelRegistry {
    directory: PathBuf,
    model_extension: String,
    cache_extension: String,
    contract_extension: String,
    default_capacity: usize,
    executor: Arc<dyn SqlExecutor>,
    types: Arc<TypeRegistry>,
    models: DashMap<String, Arc<SqlModel>>,
}

impl SqlModelRegistry {
    pub fn new(settings: &Settings, executor: Arc<dyn SqlExecutor>, types: Arc<TypeRegistry>) -> Self {
        SqlModelRegistry {
            directory: settings.model_directory.clone(),
            model_extension: settings.model_extension.clone(),
            cache_extension: settings.cache_extension.clone(),
            contract_extension: settings.contract_extension.clone(),
            default_capacity: settings.cache_capacity,
            executor,
            types,
            models: DashMap::new(),
        }
    }

    fn source(&self, entity: &str, extension: &str) -> PathBuf {
        self.directory.join(format!("{}{}", entity, extension))
    }

    /// Register a descriptor built in code, replacing nothing already loaded.
    pub fn insert(&self, descriptor: ModelDescriptor) -> Arc<SqlModel> {
        let entity = descriptor.entity.clone();
        let model = Arc::new(SqlModel::new(
            descriptor,
            self.executor.clone(),
            self.types.clone(),
            self.default_capacity,
        ));
        self.models.entry(entity).or_insert(model).value().clone()
    }

    /// Proxy for `name` (capitalized), loading its sources on first use.
    pub async fn model(&self, name: &str) -> Result<Arc<SqlModel>, ScriptError> {
        let entity = capitalize(name);
        if let Some(model) = self.models.get(&entity) {
            return Ok(model.value().clone());
        }
        let descriptor = self.load(&entity).await?;
        tracing::info!(entity = %entity, methods = descriptor.methods().len(), "model loaded");
        Ok(self.insert(descriptor))
    }

    async fn load(&self, entity: &str) -> Result<ModelDescriptor, ScriptError> {
        let sql_path = self.source(entity, &self.model_extension);
        let sql = match load_optional_properties(&sql_path).await? {
            Some(props) => props,
            None => return Err(ScriptError::NoSuchModel(entity.to_string())),
        };
        let contract_path = self.source(entity, &self.contract_extension);
        let contract = match tokio::fs::read_to_string(&contract_path).await {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(ConfigError::from(e).into()),
        };
        let cache_path = self.source(entity, &self.cache_extension);
        let caches: Option<Properties> = load_optional_properties(&cache_path).await?;
        let contract_file = contract_path.display().to_string();
        let cache_file = cache_path.display().to_string();
        let descriptor = ModelDescriptor::parse(
            entity,
            &sql,
            contract.as_deref().map(|text| (text, contract_file.as_str())),
            caches.as_ref().map(|props| (props, cache_file.as_str())),
        )?;
        Ok(descriptor)
    }
}

#[async_trait]
impl ModelProvider for SqlModelRegistry {
    async fn get_model(&self, name: &str) -> Result<Arc<dyn ModelHandle>, ScriptError> {
        let model: Arc<dyn ModelHandle> = self.model(name).await?;
        Ok(model)
    }
}
