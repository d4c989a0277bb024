//! Route handlers. Dataset and chart work runs on the blocking pool.

use super::AppState;
use crate::charts::ChartOption;
use crate::dashboard::{ChartRequest, ChartResponse, ExportError};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartTypeQuery {
    #[serde(default)]
    pub chart_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    /// PNG data URI, empty when no preview applies
    pub image: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn chart_types(State(state): State<Arc<AppState>>) -> Json<Vec<ChartOption>> {
    Json(state.dashboard.chart_options())
}

pub async fn chart(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChartRequest>,
) -> Result<Json<ChartResponse>, (StatusCode, String)> {
    task::spawn_blocking(move || state.dashboard.render(&request))
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub async fn preview(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChartTypeQuery>,
) -> Result<Json<PreviewResponse>, (StatusCode, String)> {
    let chart_type = query.chart_type.unwrap_or_default();
    task::spawn_blocking(move || state.dashboard.live_preview(&chart_type))
        .await
        .map(|image| Json(PreviewResponse { image }))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub async fn export(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChartTypeQuery>,
) -> Response {
    let chart_type = query.chart_type.unwrap_or_default();
    let result = task::spawn_blocking(move || state.dashboard.export(&chart_type)).await;

    match result {
        Ok(Ok((filename, png))) => (
            [
                (header::CONTENT_TYPE, "image/png".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename),
                ),
            ],
            png,
        )
            .into_response(),
        Ok(Err(ExportError::Disabled)) => {
            (StatusCode::NOT_FOUND, ExportError::Disabled.to_string()).into_response()
        }
        Ok(Err(e @ ExportError::Chart(_))) => {
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response()
        }
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
