//! Config validation: bean schema references and settings consistency.

use crate::config::{Settings, TypeRegistry, ValueType};
use crate::error::ConfigError;
use std::collections::HashSet;

/// Every bean named by a field must itself be registered; field names must be unique per schema.
pub fn validate_types(registry: &TypeRegistry) -> Result<(), ConfigError> {
    for schema in registry.schemas() {
        let mut names = HashSet::new();
        for f in &schema.fields {
            if !names.insert(f.name.as_str()) {
                return Err(ConfigError::InvalidSetting {
                    key: schema.name.clone(),
                    reason: format!("duplicate field {}", f.name),
                });
            }
            check_type(registry, &f.type_)?;
        }
    }
    Ok(())
}

fn check_type(registry: &TypeRegistry, ty: &ValueType) -> Result<(), ConfigError> {
    match ty {
        ValueType::Bean(name) if registry.schema(name).is_none() => Err(ConfigError::MissingReference {
            kind: "type",
            id: name.clone(),
        }),
        ValueType::Array(inner) => check_type(registry, inner),
        _ => Ok(()),
    }
}

pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if !settings.index_path.starts_with('/') {
        return Err(ConfigError::InvalidSetting {
            key: "controller.index.path".into(),
            reason: format!("'{}' must start with /", settings.index_path),
        });
    }
    if settings.cache_capacity == 0 {
        return Err(ConfigError::InvalidSetting {
            key: "cache.capacity".into(),
            reason: "must be positive".into(),
        });
    }
    if settings.pool.max_active == 0 {
        return Err(ConfigError::InvalidSetting {
            key: "maxActive".into(),
            reason: "must be positive".into(),
        });
    }
    Ok(())
}
