//! Load `key = value` line files (settings, SQL templates, cache directives) and bean schemas from disk.

use crate::config::{validate_types, TypeRegistry, TypeSchema};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Ordered `key = value` entries. `#`/`!` comments and blank lines are ignored; later duplicates win.
#[derive(Clone, Debug, Default)]
pub struct Properties {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl Properties {
    pub fn new() -> Self {
        Properties::default()
    }

    /// Parse properties text. `file` is only used in error messages.
    pub fn parse(text: &str, file: &str) -> Result<Self, ConfigError> {
        let mut props = Properties::new();
        for (n, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Malformed {
                file: file.to_string(),
                line: n + 1,
                reason: "expected key = value".into(),
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::Malformed {
                    file: file.to_string(),
                    line: n + 1,
                    reason: "empty key".into(),
                });
            }
            props.set(key, value.trim());
        }
        Ok(props)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 = value.to_string(),
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), value.to_string()));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&i| self.entries[i].1.as_str())
    }

    /// Non-blank value for `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn get_int(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        match self.get_str(key) {
            None => Ok(default),
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidSetting {
                key: key.to_string(),
                reason: format!("'{}' is not an integer", v),
            }),
        }
    }

    /// `true`, `yes` and `1` (any case) are true; blank or absent yields `default`.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get_str(key) {
            None => default,
            Some(v) => {
                let v = v.trim();
                v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") || v == "1"
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read and parse a properties file.
pub async fn load_properties(path: &Path) -> Result<Properties, ConfigError> {
    let text = tokio::fs::read_to_string(path).await?;
    Properties::parse(&text, &path.display().to_string())
}

/// Read a properties file if it exists; a missing file is `None`.
pub async fn load_optional_properties(path: &Path) -> Result<Option<Properties>, ConfigError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(Properties::parse(&text, &path.display().to_string())?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Load bean schemas from a JSON array file and validate their references.
pub async fn load_types(path: &Path, package: &str) -> Result<TypeRegistry, ConfigError> {
    let text = tokio::fs::read_to_string(path).await?;
    let schemas: Vec<TypeSchema> =
        serde_json::from_str(&text).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let registry = TypeRegistry::from_schemas(package, schemas);
    validate_types(&registry)?;
    tracing::info!(types = registry.schemas().count(), path = %path.display(), "bean schemas loaded");
    Ok(registry)
}
