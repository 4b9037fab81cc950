//! Convention-driven MVC action engine: routes from directory layout, per-route action scripts,
//! and SQL-template models with result caching.

pub mod bag;
pub mod bean;
pub mod case;
pub mod config;
pub mod error;
pub mod handlers;
pub mod model;
pub mod path;
pub mod route_index;
pub mod routes;
pub mod script;
pub mod sql;
pub mod state;
pub mod view;

pub use bag::VariableBag;
pub use config::{load_types, Settings, TypeRegistry, TypeSchema, ValueType};
pub use error::{AppError, ConfigError, ScriptError};
pub use model::{MethodSignature, ModelHandle, ModelProvider, ModelSet, SqlModel, SqlModelRegistry};
pub use route_index::{RouteIndex, RouteMatch};
pub use routes::{action_routes, common_routes};
pub use script::{ActionEngine, Outcome, Verb};
pub use sql::{PgExecutor, SqlExecutor};
pub use state::DispatchState;
pub use view::{JsonView, View};
