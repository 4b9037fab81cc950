//! Front-controller routes: everything falls through to the dispatcher.

use crate::handlers::dispatch;
use crate::state::DispatchState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Upper bound on url-encoded form bodies.
pub const MAX_FORM_BYTES: usize = 2 * 1024 * 1024;

pub fn action_routes(state: DispatchState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(RequestBodyLimitLayer::new(MAX_FORM_BYTES))
        .with_state(state)
}
