//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing setting: {0}")]
    MissingSetting(&'static str),
    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },
    #[error("{file}:{line}: {reason}")]
    Malformed {
        file: String,
        line: usize,
        reason: String,
    },
    #[error("conflicting capture names '{first}' and '{second}' under {dir}")]
    ConflictingCapture {
        dir: String,
        first: String,
        second: String,
    },
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised while an action script runs. All of them are absorbed by the
/// engine's recovery branch and surface only as `success`/`message` in the bag.
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("illegal expression: {0}")]
    Syntax(String),
    #[error("no such model {0}")]
    NoSuchModel(String),
    #[error("no such method {method} in model {model}")]
    NoSuchMethod { model: String, method: String },
    #[error("unsupported multi args in {model}.{method} ({arity} parameters)")]
    UnsupportedArity {
        model: String,
        method: String,
        arity: usize,
    },
    #[error("cannot convert {value} to {target}")]
    Conversion { value: String, target: String },
    #[error("unknown type {0}")]
    UnknownType(String),
    #[error("invalid property path '{0}'")]
    InvalidPath(String),
    #[error("{0}")]
    Security(String),
}

impl ScriptError {
    /// Security failures are reported to the caller but never logged.
    pub fn is_security(&self) -> bool {
        matches!(self, ScriptError::Security(_))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no such {0}")]
    NotFound(String),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Script(ScriptError::Security(_)) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Script(_) => (StatusCode::INTERNAL_SERVER_ERROR, "script_error"),
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed"),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
