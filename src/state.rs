//! Shared state for the dispatcher routes.

use crate::script::ActionEngine;
use crate::view::View;
use std::sync::Arc;

#[derive(Clone)]
pub struct DispatchState {
    pub engine: Arc<ActionEngine>,
    pub view: Arc<dyn View>,
    /// Prefix the application is mounted under, e.g. `/shop`. Empty at the root.
    pub context_path: String,
    /// View rendered for redirects, with `redirect` set in the bag, instead of an HTTP redirect.
    pub redirect_path: Option<String>,
}

impl DispatchState {
    pub fn new(engine: Arc<ActionEngine>, view: Arc<dyn View>) -> Self {
        DispatchState {
            engine,
            view,
            context_path: String::new(),
            redirect_path: None,
        }
    }

    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Self {
        let context_path: String = context_path.into();
        self.context_path = context_path.trim_end_matches('/').to_string();
        self
    }

    pub fn with_redirect_path(mut self, redirect_path: Option<String>) -> Self {
        self.redirect_path = redirect_path;
        self
    }
}
