//! HTTP presentation layer

mod app;
mod handlers;
mod page;

pub use app::{create_router, AppState};
pub use handlers::{ChartTypeQuery, HealthResponse, PreviewResponse};
