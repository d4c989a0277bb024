//! Router construction

use super::{handlers, page};
use crate::dashboard::Dashboard;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub dashboard: Dashboard,
}

impl AppState {
    pub fn new(dashboard: Dashboard) -> Arc<Self> {
        Arc::new(Self { dashboard })
    }
}

/// Create the dashboard router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.dashboard.config().request_body_limit();
    Router::new()
        .route("/", get(page::index))
        .route("/health", get(handlers::health_check))
        .route("/api/chart-types", get(handlers::chart_types))
        .route("/api/chart", post(handlers::chart))
        .route("/api/preview", get(handlers::preview))
        .route("/api/export", get(handlers::export))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
