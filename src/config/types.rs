//! Declared value types and bean schemas. Beans are JSON objects whose fields are fixed by a schema.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ScriptError};

/// Closed set of types a contract, a bean field or a `new` expression can name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    Void,
    String,
    Char,
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Map,
    List,
    Any,
    /// Registered bean schema, by qualified name.
    Bean(String),
    Array(Box<ValueType>),
}

impl ValueType {
    pub fn is_integral(&self) -> bool {
        matches!(self, ValueType::Byte | ValueType::Short | ValueType::Int | ValueType::Long)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || matches!(self, ValueType::Float | ValueType::Double)
    }

    /// Types a single-column query cell converts into directly.
    pub fn is_scalar(&self) -> bool {
        self.is_numeric() || matches!(self, ValueType::String | ValueType::Char | ValueType::Bool)
    }

    /// Types that never hold null: they fall back to a zero value instead.
    pub fn is_primitive(&self) -> bool {
        self.is_numeric() || matches!(self, ValueType::Char | ValueType::Bool)
    }

    /// Zero value: `false`, `0`, `"\0"`, otherwise null.
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Char => Value::String("\0".into()),
            t if t.is_numeric() => Value::Number(0.into()),
            _ => Value::Null,
        }
    }

    fn builtin(name: &str) -> Option<ValueType> {
        Some(match name.to_ascii_lowercase().as_str() {
            "void" => ValueType::Void,
            "string" => ValueType::String,
            "char" | "character" => ValueType::Char,
            "bool" | "boolean" => ValueType::Bool,
            "byte" => ValueType::Byte,
            "short" => ValueType::Short,
            "int" | "integer" => ValueType::Int,
            "long" => ValueType::Long,
            "float" => ValueType::Float,
            "double" => ValueType::Double,
            "map" => ValueType::Map,
            "list" | "arraylist" => ValueType::List,
            "any" | "object" => ValueType::Any,
            _ => return None,
        })
    }
}

impl FromStr for ValueType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(inner) = s.strip_suffix("[]") {
            return Ok(ValueType::Array(Box::new(inner.parse()?)));
        }
        if let Some(t) = ValueType::builtin(s) {
            return Ok(t);
        }
        let valid = !s.is_empty()
            && !s.starts_with('.')
            && !s.ends_with('.')
            && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
        if !valid {
            return Err(ConfigError::InvalidSetting {
                key: "type".into(),
                reason: format!("'{}' is not a type name", s),
            });
        }
        Ok(ValueType::Bean(s.to_string()))
    }
}

impl TryFrom<String> for ValueType {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ValueType> for String {
    fn from(t: ValueType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Void => write!(f, "void"),
            ValueType::String => write!(f, "string"),
            ValueType::Char => write!(f, "char"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Byte => write!(f, "byte"),
            ValueType::Short => write!(f, "short"),
            ValueType::Int => write!(f, "int"),
            ValueType::Long => write!(f, "long"),
            ValueType::Float => write!(f, "float"),
            ValueType::Double => write!(f, "double"),
            ValueType::Map => write!(f, "map"),
            ValueType::List => write!(f, "list"),
            ValueType::Any => write!(f, "any"),
            ValueType::Bean(name) => write!(f, "{}", name),
            ValueType::Array(inner) => write!(f, "{}[]", inner),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ValueType,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypeSchema {
    /// Qualified name, e.g. `app.forms.User`.
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl TypeSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Bean schemas known to the process, plus the package unqualified names resolve against.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    package: String,
    by_name: HashMap<String, TypeSchema>,
}

impl TypeRegistry {
    pub fn new(package: impl Into<String>) -> Self {
        TypeRegistry {
            package: package.into(),
            by_name: HashMap::new(),
        }
    }

    pub fn from_schemas(package: impl Into<String>, schemas: Vec<TypeSchema>) -> Self {
        let mut registry = TypeRegistry::new(package);
        for s in schemas {
            registry.register(s);
        }
        registry
    }

    pub fn register(&mut self, schema: TypeSchema) {
        self.by_name.insert(schema.name.clone(), schema);
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn schemas(&self) -> impl Iterator<Item = &TypeSchema> {
        self.by_name.values()
    }

    pub fn get(&self, qualified: &str) -> Option<&TypeSchema> {
        self.by_name.get(qualified)
    }

    /// Qualified name for `name` inside the form package.
    pub fn qualify(&self, name: &str) -> String {
        if self.package.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.package, name)
        }
    }

    /// Resolve a bean name: unqualified names try the form package first, then the bare name.
    pub fn schema(&self, name: &str) -> Option<&TypeSchema> {
        if !name.contains('.') {
            if let Some(s) = self.by_name.get(&self.qualify(name)) {
                return Some(s);
            }
        }
        self.by_name.get(name)
    }

    /// Resolve a type name written in a script (`new X`, `new X[n]`).
    pub fn resolve(&self, name: &str) -> Result<ValueType, ScriptError> {
        let parsed: ValueType = name
            .parse()
            .map_err(|_| ScriptError::UnknownType(name.to_string()))?;
        self.resolve_type(&parsed)
    }

    /// Replace bean names with their registered qualified names; unknown beans fail.
    pub fn resolve_type(&self, ty: &ValueType) -> Result<ValueType, ScriptError> {
        match ty {
            ValueType::Bean(name) => self
                .schema(name)
                .map(|s| ValueType::Bean(s.name.clone()))
                .ok_or_else(|| ScriptError::UnknownType(name.clone())),
            ValueType::Array(inner) => Ok(ValueType::Array(Box::new(self.resolve_type(inner)?))),
            other => Ok(other.clone()),
        }
    }

    /// Fresh instance of a resolved type: beans get every declared field at its zero value.
    pub fn instantiate(&self, ty: &ValueType) -> Result<Value, ScriptError> {
        match ty {
            ValueType::Bean(name) => {
                let schema = self
                    .schema(name)
                    .ok_or_else(|| ScriptError::UnknownType(name.clone()))?;
                let mut obj = Map::new();
                for f in &schema.fields {
                    obj.insert(f.name.clone(), f.type_.default_value());
                }
                Ok(Value::Object(obj))
            }
            ValueType::Map | ValueType::Any => Ok(Value::Object(Map::new())),
            ValueType::List | ValueType::Array(_) => Ok(Value::Array(Vec::new())),
            ValueType::String => Ok(Value::String(String::new())),
            ValueType::Void => Err(ScriptError::UnknownType("void".into())),
            other => Ok(other.default_value()),
        }
    }

    /// Fixed-size array of `len` zero values of `element`.
    pub fn instantiate_array(&self, element: &ValueType, len: usize) -> Value {
        Value::Array(vec![element.default_value(); len])
    }
}
