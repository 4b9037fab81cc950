//! Parsed per-entity sources: SQL templates, declared method contract and cache directives.

use crate::config::{Properties, ValueType};
use crate::error::ConfigError;
use crate::model::MethodSignature;
use std::collections::HashMap;

/// Result-cache and invalidation directives for one entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheDirectives {
    /// method -> cache name checked before execution.
    pub result: HashMap<String, String>,
    /// method -> cache names whose entry for the same key is dropped after execution.
    pub invalidate: HashMap<String, Vec<String>>,
    /// cache name -> capacity.
    pub capacities: HashMap<String, usize>,
}

impl CacheDirectives {
    /// Lines `m.cache = name`, `m.invalidate = a,b` and `name.capacity = n`.
    pub fn from_properties(props: &Properties, file: &str) -> Result<Self, ConfigError> {
        let mut directives = CacheDirectives::default();
        for (line, (key, value)) in props.iter().enumerate() {
            let Some((subject, kind)) = key.rsplit_once('.') else {
                tracing::warn!(file, key, "cache directive without a kind, ignored");
                continue;
            };
            match kind {
                "cache" => {
                    directives.result.insert(subject.to_string(), value.to_string());
                }
                "invalidate" => {
                    let names = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                    directives.invalidate.insert(subject.to_string(), names);
                }
                "capacity" => {
                    let capacity = value.parse::<usize>().map_err(|_| ConfigError::Malformed {
                        file: file.to_string(),
                        line: line + 1,
                        reason: format!("capacity '{}' is not a non-negative integer", value),
                    })?;
                    directives.capacities.insert(subject.to_string(), capacity);
                }
                _ => tracing::warn!(file, key, "unknown cache directive, ignored"),
            }
        }
        Ok(directives)
    }

    pub fn capacity(&self, cache: &str, default: usize) -> usize {
        self.capacities.get(cache).copied().unwrap_or(default)
    }
}

/// Parse one contract line: `find(long) -> User`, `list() -> User[]`, `save(User)`.
/// A missing return type means `any`.
pub fn parse_signature(line: &str) -> Result<MethodSignature, String> {
    let (head, returns) = match line.split_once("->") {
        Some((head, ret)) => (head.trim(), ret.trim().parse::<ValueType>().map_err(|e| e.to_string())?),
        None => (line.trim(), ValueType::Any),
    };
    let open = head.find('(').ok_or("missing '('")?;
    let inner = head[open + 1..].strip_suffix(')').ok_or("missing ')'")?;
    let name = head[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(format!("'{}' is not a method name", name));
    }
    let params = inner
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<ValueType>().map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MethodSignature::new(name, params, returns))
}

/// Everything loaded for one entity.
#[derive(Clone, Debug, Default)]
pub struct ModelDescriptor {
    pub entity: String,
    templates: HashMap<String, String>,
    /// Declared methods in source order; undeclared templates are appended as `(any) -> any`.
    methods: Vec<MethodSignature>,
    pub caches: CacheDirectives,
}

impl ModelDescriptor {
    pub fn new(entity: impl Into<String>) -> Self {
        ModelDescriptor {
            entity: entity.into(),
            ..Default::default()
        }
    }

    /// Build from the template file plus the optional contract and cache files.
    pub fn parse(
        entity: &str,
        sql: &Properties,
        contract: Option<(&str, &str)>,
        caches: Option<(&Properties, &str)>,
    ) -> Result<Self, ConfigError> {
        let mut descriptor = ModelDescriptor::new(entity);
        for (method, template) in sql.iter() {
            descriptor.templates.insert(method.to_string(), template.to_string());
        }
        if let Some((text, file)) = contract {
            for (i, raw) in text.lines().enumerate() {
                let line = raw.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let sig = parse_signature(line).map_err(|reason| ConfigError::Malformed {
                    file: file.to_string(),
                    line: i + 1,
                    reason,
                })?;
                descriptor.declare(sig);
            }
        }
        let mut undeclared: Vec<&String> = descriptor
            .templates
            .keys()
            .filter(|m| !descriptor.methods.iter().any(|s| &s.name == *m))
            .collect();
        undeclared.sort();
        let defaults: Vec<MethodSignature> = undeclared
            .into_iter()
            .map(|m| MethodSignature::new(m.clone(), vec![ValueType::Any], ValueType::Any))
            .collect();
        descriptor.methods.extend(defaults);
        for sig in &descriptor.methods {
            if !descriptor.templates.contains_key(&sig.name) {
                tracing::warn!(entity, method = %sig.name, "declared method has no sql template");
            }
        }
        if let Some((props, file)) = caches {
            descriptor.caches = CacheDirectives::from_properties(props, file)?;
        }
        Ok(descriptor)
    }

    /// Add a declared method. Later declarations with the same name are unreachable.
    pub fn declare(&mut self, sig: MethodSignature) {
        if self.methods.iter().any(|s| s.name == sig.name) {
            tracing::warn!(entity = %self.entity, method = %sig.name, "overloaded method, first declaration wins");
        }
        self.methods.push(sig);
    }

    pub fn add_template(&mut self, method: impl Into<String>, sql: impl Into<String>) {
        self.templates.insert(method.into(), sql.into());
    }

    pub fn template(&self, method: &str) -> Option<&str> {
        self.templates.get(method).map(String::as_str)
    }

    pub fn method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|s| s.name == name)
    }

    pub fn methods(&self) -> &[MethodSignature] {
        &self.methods
    }
}
