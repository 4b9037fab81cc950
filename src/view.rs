//! View collaborator. The engine only produces paths; rendering them is up to a `View`.

use crate::bag::VariableBag;
use crate::error::AppError;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

pub trait View: Send + Sync {
    /// Whether `path` names something this view can render.
    fn has(&self, path: &str) -> bool;

    fn render(&self, path: &str, bag: &VariableBag) -> Result<Response, AppError>;
}

#[derive(Serialize)]
pub struct RenderBody<'a> {
    pub view: &'a str,
    pub model: &'a Map<String, Value>,
}

/// Renders `{view, model}` as JSON. With a directory, only paths that exist there (any extension) render.
#[derive(Clone, Debug, Default)]
pub struct JsonView {
    directory: Option<PathBuf>,
}

impl JsonView {
    pub fn new() -> Self {
        JsonView::default()
    }

    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        JsonView {
            directory: Some(directory.into()),
        }
    }
}

impl View for JsonView {
    fn has(&self, path: &str) -> bool {
        let Some(dir) = &self.directory else {
            return true;
        };
        let target = dir.join(path.trim_start_matches('/'));
        if target.exists() {
            return true;
        }
        let (Some(parent), Some(stem)) = (target.parent(), target.file_name().and_then(|n| n.to_str())) else {
            return false;
        };
        std::fs::read_dir(parent)
            .map(|entries| {
                entries.flatten().any(|e| {
                    e.file_name()
                        .to_str()
                        .and_then(|n| n.rsplit_once('.'))
                        .is_some_and(|(base, _)| base == stem)
                })
            })
            .unwrap_or(false)
    }

    fn render(&self, path: &str, bag: &VariableBag) -> Result<Response, AppError> {
        Ok(Json(RenderBody {
            view: path,
            model: bag.vars(),
        })
        .into_response())
    }
}
