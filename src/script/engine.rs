//! Resolves a uri, runs the route's script for the verb and decides the next view or redirect.

use crate::bag::{VariableBag, MESSAGE_KEY, SUCCESS_KEY};
use crate::bean::{convert_value, BeanBuilder};
use crate::case::capitalize;
use crate::config::{Settings, TypeRegistry, ValueType};
use crate::error::{AppError, ConfigError, ScriptError};
use crate::model::ModelProvider;
use crate::route_index::{RouteIndex, RouteMatch};
use crate::script::{ActionScript, Expression};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

const REDIRECT_PREFIX: &str = "redirect:";
const MUTATION_SUFFIXES: [&str; 3] = ["/add", "/edit", "/delete"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Delete => "delete",
        }
    }
}

impl FromStr for Verb {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Verb::Get),
            "post" => Ok(Verb::Post),
            "put" => Ok(Verb::Put),
            "delete" => Ok(Verb::Delete),
            _ => Err(AppError::MethodNotAllowed(s.to_string())),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do after a script ran: render a path, or redirect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Render(String),
    Redirect(String),
}

impl Outcome {
    /// `redirect:<target>` or a bare renderable path.
    pub fn parse(s: &str) -> Outcome {
        match s.strip_prefix(REDIRECT_PREFIX) {
            Some(target) => Outcome::Redirect(target.to_string()),
            None => Outcome::Render(s.to_string()),
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Outcome::Redirect(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Render(path) => f.write_str(path),
            Outcome::Redirect(target) => write!(f, "{}{}", REDIRECT_PREFIX, target),
        }
    }
}

pub struct ActionEngine {
    routes: RouteIndex,
    controller_directory: PathBuf,
    types: Arc<TypeRegistry>,
    models: Arc<dyn ModelProvider>,
    scripts: DashMap<String, Arc<ActionScript>>,
}

impl ActionEngine {
    pub fn new(
        routes: RouteIndex,
        controller_directory: impl Into<PathBuf>,
        types: Arc<TypeRegistry>,
        models: Arc<dyn ModelProvider>,
    ) -> Self {
        ActionEngine {
            routes,
            controller_directory: controller_directory.into(),
            types,
            models,
            scripts: DashMap::new(),
        }
    }

    /// Scan the configured route directories and wire the collaborators.
    pub fn from_settings(
        settings: &Settings,
        types: Arc<TypeRegistry>,
        models: Arc<dyn ModelProvider>,
    ) -> Result<Self, ConfigError> {
        let routes = RouteIndex::build(&settings.route_directories(), settings.index_path.clone())?;
        Ok(ActionEngine::new(
            routes,
            settings.controller_directory.clone(),
            types,
            models,
        ))
    }

    pub fn routes(&self) -> &RouteIndex {
        &self.routes
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Install script source for a canonical path, ahead of any file on disk.
    pub fn register_script(&self, path: &str, verb: Verb, source: &str) -> Result<(), ScriptError> {
        let key = script_key(path, verb);
        let script = ActionScript::parse(&key, source)?;
        self.scripts.insert(key, Arc::new(script));
        Ok(())
    }

    /// Run the action for `verb` on `uri`. Only routing failures escape; every script failure
    /// is recorded in the bag as `success = false` plus `message`.
    pub async fn execute(&self, verb: Verb, uri: &str, bag: &mut VariableBag) -> Result<Outcome, AppError> {
        let route = self.routes.resolve(uri)?;
        for (name, value) in &route.captures {
            bag.insert(name.clone(), value.clone());
        }
        match self.run(verb, &route, bag).await {
            Ok(()) => Ok(match bag.redirect() {
                Some(target) => Outcome::Redirect(target.to_string()),
                None if verb == Verb::Get => Outcome::Render(route.path.clone()),
                None => Outcome::Redirect(route.uri.clone()),
            }),
            Err(e) => {
                if !e.is_security() {
                    tracing::error!(verb = %verb, uri = %route.uri, path = %route.path, error = %e, "action failed");
                }
                bag.insert(SUCCESS_KEY, false);
                bag.insert(MESSAGE_KEY, e.to_string());
                Ok(match bag.redirect() {
                    Some(target) => Outcome::Redirect(target.to_string()),
                    None => Outcome::Redirect(strip_mutation_suffix(&route.uri).to_string()),
                })
            }
        }
    }

    async fn run(&self, verb: Verb, route: &RouteMatch, bag: &mut VariableBag) -> Result<(), ScriptError> {
        let script = self.script(&route.path, verb).await?;
        self.build_beans(bag)?;
        for statement in &script.statements {
            let value = self.evaluate(&statement.expression, bag).await?;
            if !value.is_null() {
                bag.set_property(&statement.target, value)?;
            }
        }
        Ok(())
    }

    /// Cached script for (path, verb). A missing source file is an empty script.
    async fn script(&self, path: &str, verb: Verb) -> Result<Arc<ActionScript>, ScriptError> {
        let key = script_key(path, verb);
        if let Some(script) = self.scripts.get(&key) {
            return Ok(script.value().clone());
        }
        let file = self
            .controller_directory
            .join(format!("{}.{}", path.trim_start_matches('/'), verb));
        let source = match tokio::fs::read_to_string(&file).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(ConfigError::from(e).into()),
        };
        let script = Arc::new(ActionScript::parse(&key, &source)?);
        Ok(self.scripts.entry(key).or_insert(script).value().clone())
    }

    /// For each dotted bag key whose prefix has no entry yet, assemble the prefix's bean from
    /// the flat keys. A prefix without a registered schema is `UnknownType`.
    fn build_beans(&self, bag: &mut VariableBag) -> Result<(), ScriptError> {
        let prefixes: BTreeSet<String> = bag
            .keys()
            .filter_map(|k| k.split_once('.').map(|(prefix, _)| prefix.to_string()))
            .filter(|p| !p.is_empty() && bag.get(p).is_none())
            .collect();
        for prefix in prefixes {
            let type_name = self.types.qualify(&capitalize(&prefix));
            if self.types.get(&type_name).is_none() {
                return Err(ScriptError::UnknownType(type_name));
            }
            let bean = BeanBuilder::new(&self.types, bag.vars()).build(&type_name, &prefix)?;
            bag.insert(prefix, bean);
        }
        Ok(())
    }

    async fn evaluate(&self, expression: &Expression, bag: &VariableBag) -> Result<Value, ScriptError> {
        match expression {
            Expression::StringLiteral(s) => Ok(Value::String(s.clone())),
            Expression::IntLiteral(n) => Ok(Value::from(*n)),
            Expression::PropertyRef(path) => Ok(bag.property(path).cloned().unwrap_or(Value::Null)),
            Expression::NewInstance(type_name) => {
                let ty = self.types.resolve(type_name)?;
                self.types.instantiate(&ty)
            }
            Expression::NewArray { type_name, size } => {
                // Arrays look the bare name up before the form package.
                let element = match self.types.get(type_name) {
                    Some(schema) => ValueType::Bean(schema.name.clone()),
                    None => self.types.resolve(type_name)?,
                };
                Ok(self.types.instantiate_array(&element, *size))
            }
            Expression::MethodCall { model, method, arg } => {
                let handle = match bag.model(model) {
                    Some(handle) => handle,
                    None => self.models.get_model(model).await?,
                };
                let sig = handle.method(method).ok_or_else(|| ScriptError::NoSuchMethod {
                    model: model.clone(),
                    method: method.clone(),
                })?;
                match sig.params.as_slice() {
                    [] => handle.invoke(method, None).await,
                    [param] => {
                        let raw = arg
                            .as_deref()
                            .and_then(|path| bag.property(path))
                            .cloned()
                            .unwrap_or(Value::Null);
                        let param = self.types.resolve_type(param)?;
                        let value = convert_value(&raw, &param, &self.types)?;
                        handle.invoke(method, Some(value)).await
                    }
                    params => Err(ScriptError::UnsupportedArity {
                        model: model.clone(),
                        method: method.clone(),
                        arity: params.len(),
                    }),
                }
            }
        }
    }
}

fn script_key(path: &str, verb: Verb) -> String {
    format!("{}.{}", path, verb)
}

fn strip_mutation_suffix(uri: &str) -> &str {
    MUTATION_SUFFIXES
        .iter()
        .find_map(|suffix| uri.strip_suffix(suffix))
        .unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldDef, TypeSchema};
    use crate::model::{MethodSignature, ModelHandle, ModelSet};
    use async_trait::async_trait;
    use serde_json::json;

    struct Greeter;

    #[async_trait]
    impl ModelHandle for Greeter {
        fn name(&self) -> &str {
            "Greeter"
        }

        fn method(&self, name: &str) -> Option<MethodSignature> {
            match name {
                "hello" => Some(MethodSignature::new("hello", vec![ValueType::String], ValueType::String)),
                "nothing" => Some(MethodSignature::new("nothing", vec![], ValueType::Any)),
                "pair" => Some(MethodSignature::new(
                    "pair",
                    vec![ValueType::Int, ValueType::Int],
                    ValueType::Int,
                )),
                "guarded" => Some(MethodSignature::new("guarded", vec![], ValueType::Any)),
                _ => None,
            }
        }

        async fn invoke(&self, method: &str, arg: Option<Value>) -> Result<Value, ScriptError> {
            match method {
                "hello" => Ok(json!(format!("hello {}", arg.unwrap_or(Value::Null).as_str().unwrap_or("")))),
                "guarded" => Err(ScriptError::Security("not allowed".into())),
                _ => Ok(Value::Null),
            }
        }
    }

    fn engine() -> ActionEngine {
        let mut routes = RouteIndex::new("/index");
        for p in ["/index", "/users", "/users/${id}", "/users/${id}/edit", "/users/new"] {
            routes.add_route(p).unwrap();
        }
        let types = TypeRegistry::from_schemas(
            "app",
            vec![TypeSchema {
                name: "app.User".into(),
                fields: vec![
                    FieldDef { name: "id".into(), type_: ValueType::Long },
                    FieldDef { name: "name".into(), type_: ValueType::String },
                ],
            }],
        );
        let models = ModelSet::new().with("greeter", Arc::new(Greeter));
        ActionEngine::new(routes, "/nonexistent-controllers", Arc::new(types), Arc::new(models))
    }

    #[tokio::test]
    async fn empty_script_outcomes() {
        let e = engine();
        let mut bag = VariableBag::new();
        assert_eq!(
            e.execute(Verb::Get, "/users/5", &mut bag).await.unwrap(),
            Outcome::Render("/users/${id}".into())
        );
        assert_eq!(bag.get("id"), Some(&json!("5")));
        let mut bag = VariableBag::new();
        assert_eq!(
            e.execute(Verb::Post, "/users/5", &mut bag).await.unwrap(),
            Outcome::Redirect("/users/5".into())
        );
    }

    #[tokio::test]
    async fn string_assignment() {
        let e = engine();
        e.register_script("/users", Verb::Get, r#"name = "Alice""#).unwrap();
        let mut bag = VariableBag::new();
        let out = e.execute(Verb::Get, "/users", &mut bag).await.unwrap();
        assert_eq!(out, Outcome::Render("/users".into()));
        assert_eq!(bag.get("name"), Some(&json!("Alice")));
    }

    #[tokio::test]
    async fn statements_see_earlier_writes() {
        let e = engine();
        e.register_script(
            "/users/new",
            Verb::Get,
            "who = \"ann\"\ngreeting = greeter.hello(who)\nuser = new User\nuser.name = who\nslots = new User[2]\nnone = greeter.nothing()",
        )
        .unwrap();
        let mut bag = VariableBag::new();
        e.execute(Verb::Get, "/users/new", &mut bag).await.unwrap();
        assert_eq!(bag.get("greeting"), Some(&json!("hello ann")));
        assert_eq!(bag.get("user"), Some(&json!({"id": 0, "name": "ann"})));
        assert_eq!(bag.get("slots"), Some(&json!([null, null])));
        assert!(!bag.contains("none"));
    }

    #[tokio::test]
    async fn redirect_value_wins() {
        let e = engine();
        e.register_script("/users", Verb::Post, r#"redirect = "/index""#).unwrap();
        let mut bag = VariableBag::new();
        assert_eq!(
            e.execute(Verb::Post, "/users", &mut bag).await.unwrap(),
            Outcome::Redirect("/index".into())
        );
    }

    #[tokio::test]
    async fn missing_method_takes_recovery_branch() {
        let e = engine();
        e.register_script("/users/${id}", Verb::Post, "x = greeter.nope()").unwrap();
        e.register_script("/users/${id}/edit", Verb::Post, "x = greeter.nope()").unwrap();

        let mut bag = VariableBag::new();
        let out = e.execute(Verb::Post, "/users/3", &mut bag).await.unwrap();
        assert_eq!(out, Outcome::Redirect("/users/3".into()));
        assert_eq!(bag.success(), Some(false));
        assert!(!bag.message().unwrap_or("").is_empty());

        let mut bag = VariableBag::new();
        let out = e.execute(Verb::Post, "/users/3/edit", &mut bag).await.unwrap();
        assert_eq!(out.to_string(), "redirect:/users/3");
    }

    #[tokio::test]
    async fn arity_and_security_failures_are_recorded() {
        let e = engine();
        e.register_script("/users", Verb::Put, "x = greeter.pair(a)").unwrap();
        e.register_script("/users", Verb::Delete, "x = greeter.guarded()").unwrap();

        let mut bag = VariableBag::new();
        e.execute(Verb::Put, "/users", &mut bag).await.unwrap();
        assert!(bag.message().unwrap().contains("unsupported multi args"));

        let mut bag = VariableBag::new();
        let out = e.execute(Verb::Delete, "/users", &mut bag).await.unwrap();
        assert_eq!(out, Outcome::Redirect("/users".into()));
        assert_eq!(bag.message(), Some("not allowed"));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let e = engine();
        let mut bag = VariableBag::new();
        assert!(matches!(
            e.execute(Verb::Get, "/orders", &mut bag).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn dotted_form_keys_become_beans() {
        let e = engine();
        e.register_script("/users", Verb::Post, "name = user.name").unwrap();
        let mut bag = VariableBag::new();
        bag.insert("user.id", "7");
        bag.insert("user.name", "Bo");
        e.execute(Verb::Post, "/users", &mut bag).await.unwrap();
        assert_eq!(bag.get("user"), Some(&json!({"id": 7, "name": "Bo"})));
        assert_eq!(bag.get("name"), Some(&json!("Bo")));
    }

    #[tokio::test]
    async fn dotted_keys_without_schema_take_recovery_branch() {
        let mut routes = RouteIndex::new("/users");
        routes.add_route("/users").unwrap();
        let e = ActionEngine::new(
            routes,
            "/nonexistent-controllers",
            Arc::new(TypeRegistry::new("app")),
            Arc::new(ModelSet::new()),
        );
        let mut bag = VariableBag::new();
        bag.insert("user.name", "x");
        let out = e.execute(Verb::Post, "/users", &mut bag).await.unwrap();
        assert_eq!(out, Outcome::Redirect("/users".into()));
        assert_eq!(bag.success(), Some(false));
        assert!(bag.message().unwrap().contains("app.User"));
        assert!(bag.get("user").is_none());
    }

    #[test]
    fn outcome_text_form() {
        assert_eq!(Outcome::parse("redirect:/a"), Outcome::Redirect("/a".into()));
        assert_eq!(Outcome::parse("/a"), Outcome::Render("/a".into()));
        assert_eq!(Outcome::Redirect("/a".into()).to_string(), "redirect:/a");
        assert_eq!("POST".parse::<Verb>().unwrap(), Verb::Post);
        assert!("PATCH".parse::<Verb>().is_err());
    }
}
