//! Process settings read once at startup from a properties file, with `DATABASE_URL` from the environment.

use crate::config::{load_properties, validate_settings, Properties};
use crate::error::{AppError, ConfigError};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Connection pool limits; pooling itself is sqlx's job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolSettings {
    pub max_active: u32,
    pub min_idle: u32,
    /// Longest wait for a free connection.
    pub max_wait_ms: u64,
    /// Idle connections older than this are closed.
    pub min_evictable_idle_ms: u64,
    pub test_on_borrow: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            max_active: 30,
            min_idle: 0,
            max_wait_ms: 5_000,
            min_evictable_idle_ms: 8 * 60 * 60 * 1000,
            test_on_borrow: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Path used for an empty or `/` uri.
    pub index_path: String,
    /// Package unqualified bean names resolve against.
    pub form_package: String,
    pub controller_directory: PathBuf,
    #[serde(default)]
    pub view_directory: Option<PathBuf>,
    /// View rendered for redirects instead of an HTTP redirect, when set.
    #[serde(default)]
    pub redirect_path: Option<String>,
    pub model_directory: PathBuf,
    pub model_extension: String,
    pub cache_extension: String,
    pub contract_extension: String,
    #[serde(default)]
    pub form_types: Option<PathBuf>,
    pub cache_capacity: usize,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub pool: PoolSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            index_path: "/index".into(),
            form_package: String::new(),
            controller_directory: PathBuf::from("controllers"),
            view_directory: None,
            redirect_path: None,
            model_directory: PathBuf::from("models"),
            model_extension: ".sql".into(),
            cache_extension: ".cache".into(),
            contract_extension: ".contract".into(),
            form_types: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            database_url: None,
            pool: PoolSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_properties(props: &Properties) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let pool_defaults = PoolSettings::default();
        let settings = Settings {
            index_path: props
                .get_str("controller.index.path")
                .map(str::to_string)
                .unwrap_or(defaults.index_path),
            form_package: props
                .get_str("controller.form.package")
                .map(str::to_string)
                .unwrap_or(defaults.form_package),
            controller_directory: props
                .get_str("controller.directory")
                .map(PathBuf::from)
                .unwrap_or(defaults.controller_directory),
            view_directory: props.get_str("view.directory").map(PathBuf::from),
            redirect_path: props.get_str("controller.redirect.path").map(str::to_string),
            model_directory: props
                .get_str("model.directory")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_directory),
            model_extension: props
                .get_str("model.extension")
                .map(str::to_string)
                .unwrap_or(defaults.model_extension),
            cache_extension: props
                .get_str("cache.extension")
                .map(str::to_string)
                .unwrap_or(defaults.cache_extension),
            contract_extension: props
                .get_str("contract.extension")
                .map(str::to_string)
                .unwrap_or(defaults.contract_extension),
            form_types: props.get_str("form.types").map(PathBuf::from),
            cache_capacity: non_negative(props, "cache.capacity", DEFAULT_CACHE_CAPACITY as i64)?,
            database_url: props.get_str("model.datasource.url").map(str::to_string),
            pool: PoolSettings {
                max_active: non_negative(props, "maxActive", pool_defaults.max_active as i64)?,
                min_idle: non_negative(props, "minIdle", pool_defaults.min_idle as i64)?,
                max_wait_ms: non_negative(props, "maxWait", pool_defaults.max_wait_ms as i64)?,
                min_evictable_idle_ms: non_negative(
                    props,
                    "minEvictableIdleTimeMillis",
                    pool_defaults.min_evictable_idle_ms as i64,
                )?,
                test_on_borrow: props.get_bool("testOnBorrow", pool_defaults.test_on_borrow),
            },
        };
        validate_settings(&settings)?;
        Ok(settings)
    }

    /// Load from a properties file. `.env` is honoured and `DATABASE_URL` overrides the datasource url.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let props = load_properties(path).await?;
        let mut settings = Settings::from_properties(&props)?;
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                settings.database_url = Some(url);
            }
        }
        Ok(settings)
    }

    /// Directories scanned for routes: controllers, then views when distinct.
    pub fn route_directories(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.controller_directory.clone()];
        if let Some(view) = &self.view_directory {
            if *view != self.controller_directory {
                dirs.push(view.clone());
            }
        }
        dirs
    }

    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.pool.max_active)
            .min_connections(self.pool.min_idle)
            .acquire_timeout(Duration::from_millis(self.pool.max_wait_ms))
            .idle_timeout(Duration::from_millis(self.pool.min_evictable_idle_ms))
            .test_before_acquire(self.pool.test_on_borrow)
    }

    pub async fn connect_pool(&self) -> Result<PgPool, AppError> {
        let url = self
            .database_url
            .as_deref()
            .ok_or(ConfigError::MissingSetting("model.datasource.url"))?;
        let pool = self.pool_options().connect(url).await?;
        tracing::info!(max_connections = self.pool.max_active, "connection pool ready");
        Ok(pool)
    }
}

/// Integer setting that must be non-negative and fit the target type.
fn non_negative<T: TryFrom<i64>>(props: &Properties, key: &str, default: i64) -> Result<T, ConfigError> {
    let v = props.get_int(key, default)?;
    if v < 0 {
        return Err(ConfigError::InvalidSetting {
            key: key.to_string(),
            reason: "must not be negative".into(),
        });
    }
    T::try_from(v).map_err(|_| ConfigError::InvalidSetting {
        key: key.to_string(),
        reason: format!("{} is out of range", v),
    })
}
