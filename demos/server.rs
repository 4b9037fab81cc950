//! Example server: loads settings from a properties file, connects the pool, builds the route
//! index and model registry, and serves every request through the action engine.

use convention_mvc::{
    action_routes, common_routes, load_types, ActionEngine, DispatchState, JsonView, PgExecutor, Settings,
    SqlModelRegistry, TypeRegistry,
};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("convention_mvc=info".parse()?))
        .init();

    let settings_path = std::env::var("SETTINGS_PATH").unwrap_or_else(|_| "app.properties".into());
    let settings = Settings::load(&PathBuf::from(settings_path)).await?;

    let types = match &settings.form_types {
        Some(path) => load_types(path, &settings.form_package).await?,
        None => TypeRegistry::new(settings.form_package.clone()),
    };
    let types = Arc::new(types);

    let pool = settings.connect_pool().await?;
    let executor = Arc::new(PgExecutor::new(pool));
    let models = Arc::new(SqlModelRegistry::new(&settings, executor, types.clone()));
    let engine = Arc::new(ActionEngine::from_settings(&settings, types, models)?);

    let view = match &settings.view_directory {
        Some(dir) => JsonView::with_directory(dir.clone()),
        None => JsonView::new(),
    };
    let context_path = std::env::var("CONTEXT_PATH").unwrap_or_default();
    let state = DispatchState::new(engine, Arc::new(view))
        .with_context_path(context_path)
        .with_redirect_path(settings.redirect_path.clone());

    let app = Router::new().merge(common_routes()).merge(action_routes(state));

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
