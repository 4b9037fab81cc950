//! Front controller: every request not matched by another route lands here.

use crate::bag::{VariableBag, REDIRECT_KEY};
use crate::error::AppError;
use crate::script::{Outcome, Verb};
use crate::state::DispatchState;
use axum::{
    extract::{Query, State},
    http::{Method, Uri},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde_json::Value;

pub const CONTEXT_PATH_KEY: &str = "contextPath";
pub const REQUEST_URI_KEY: &str = "requestURI";

type Params = Vec<(String, String)>;

/// Add request parameters to the bag. A name given more than once becomes an array.
fn insert_params(bag: &mut VariableBag, params: Params) {
    for (name, value) in params {
        let merged = match bag.remove(&name) {
            None => Value::String(value),
            Some(Value::Array(mut items)) => {
                items.push(Value::String(value));
                Value::Array(items)
            }
            Some(first) => Value::Array(vec![first, Value::String(value)]),
        };
        bag.insert(name, merged);
    }
}

/// Application-relative part of `uri`, or `None` when it is not under the context path.
/// The context must match whole segments: `/shop` covers `/shop` and `/shop/x`, not `/shopping`.
fn strip_context<'a>(context_path: &str, uri: &'a str) -> Option<&'a str> {
    if context_path.is_empty() {
        return Some(uri);
    }
    match uri.strip_prefix(context_path)? {
        "" => Some("/"),
        rest if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

/// Prefix the context path to absolute targets that are not already under it.
fn with_context(context_path: &str, target: &str) -> String {
    if context_path.is_empty() || !target.starts_with('/') || strip_context(context_path, target).is_some() {
        target.to_string()
    } else {
        format!("{}{}", context_path, target)
    }
}

pub async fn dispatch(
    State(state): State<DispatchState>,
    method: Method,
    uri: Uri,
    Query(query): Query<Params>,
    form: Option<Form<Params>>,
) -> Result<Response, AppError> {
    let verb: Verb = method.as_str().parse()?;
    let path = strip_context(&state.context_path, uri.path())
        .ok_or_else(|| AppError::NotFound(uri.path().to_string()))?;

    let mut bag = VariableBag::new();
    bag.insert(CONTEXT_PATH_KEY, state.context_path.clone());
    bag.insert(REQUEST_URI_KEY, path.to_string());
    insert_params(&mut bag, query);
    // For GET the form extractor reads the query string again.
    if verb != Verb::Get {
        if let Some(Form(fields)) = form {
            insert_params(&mut bag, fields);
        }
    }

    let outcome = state.engine.execute(verb, path, &mut bag).await?;
    tracing::debug!(verb = %verb, path, outcome = %outcome, "dispatched");
    match outcome {
        Outcome::Redirect(target) => {
            let target = with_context(&state.context_path, &target);
            match &state.redirect_path {
                Some(view) => {
                    bag.insert(REDIRECT_KEY, target);
                    state.view.render(view, &bag)
                }
                None => Ok(Redirect::to(&target).into_response()),
            }
        }
        Outcome::Render(view) if view.contains("://") => Ok(Redirect::to(&view).into_response()),
        Outcome::Render(view) => {
            if !state.view.has(&view) {
                return Err(AppError::NotFound(view));
            }
            state.view.render(&view, &bag)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repeated_params_become_arrays() {
        let mut bag = VariableBag::new();
        insert_params(
            &mut bag,
            vec![
                ("tag".into(), "a".into()),
                ("name".into(), "ann".into()),
                ("tag".into(), "b".into()),
                ("tag".into(), "c".into()),
            ],
        );
        assert_eq!(bag.get("tag"), Some(&json!(["a", "b", "c"])));
        assert_eq!(bag.get("name"), Some(&json!("ann")));
    }

    #[test]
    fn context_prefix_only_for_local_absolute_targets() {
        assert_eq!(with_context("/shop", "/users"), "/shop/users");
        assert_eq!(with_context("/shop", "/shop/users"), "/shop/users");
        assert_eq!(with_context("/shop", "http://x/y"), "http://x/y");
        assert_eq!(with_context("", "/users"), "/users");
        assert_eq!(with_context("/shop", "/shopping"), "/shop/shopping");
    }

    #[test]
    fn context_path_strips_whole_segments() {
        assert_eq!(strip_context("/shop", "/shop/users"), Some("/users"));
        assert_eq!(strip_context("/shop", "/shop"), Some("/"));
        assert_eq!(strip_context("/shop", "/shopping"), None);
        assert_eq!(strip_context("/shop", "/users"), None);
        assert_eq!(strip_context("", "/users"), Some("/users"));
    }
}
