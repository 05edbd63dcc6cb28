pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{any, get},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::ScopeConfig;
use crate::middleware::{authorization_check, PING_PATH};
use crate::state::AppState;

/// Build the service router.
///
/// The authorization gate wraps every route (and the fallback), so the
/// only way past it without the required scope is the ping path.
pub fn app(state: AppState, scope: Arc<ScopeConfig>) -> Router {
    Router::new()
        .route(PING_PATH, any(handlers::ping))
        .route("/", get(handlers::instance_lookup))
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(scope, authorization_check))
        .layer(TraceLayer::new_for_http())
}
