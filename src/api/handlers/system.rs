use axum::{
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use serde_json::json;

use crate::api::response::{ApiResult, ApiResponse};
use crate::core::{Error, SharedState};
use crate::system::metrics;

/// System health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Current system status
    pub status: String,
    /// Service version
    pub version: String,
    /// Documents currently held by the store
    pub documents: usize,
}

/// Service information and capabilities
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    /// Service name
    pub name: String,
    /// Service version
    pub version: String,
    /// Store backend
    pub storage: String,
    /// Whether course ids are guessed from module ids
    pub derives_course_ids: bool,
    /// List of supported capabilities
    pub capabilities: Vec<String>,
}

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        documents: state.store.document_count(),
    }))
}

/// Service information endpoint
pub async fn system_info(State(state): State<SharedState>) -> Json<ApiResponse<InfoResponse>> {
    Json(ApiResponse::success(InfoResponse {
        name: crate::NAME.to_string(),
        version: crate::VERSION.to_string(),
        storage: format!("{:?}", state.store.storage_type()).to_lowercase(),
        derives_course_ids: state.config.resolver.derive_course_id,
        capabilities: ["users", "courses", "modules", "lessons", "enrollments", "dashboard"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
    }))
}

/// Prometheus text exposition
pub async fn metrics_handler(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    if !state.config.metrics.enable_prometheus {
        return Err(Error::not_found("metrics are disabled").into());
    }
    let body = metrics::render()?;
    Ok(([(CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

/// API index
pub async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "service": "Course Hub API",
        "version": crate::VERSION,
        "status": "operational",
        "endpoints": {
            "users": "/api/users",
            "courses": "/api/courses",
            "modules": "/api/modules",
            "lessons": "/api/lessons",
            "enrollments": "/api/enrollments",
            "dashboard": "/api/dashboard/stats",
            "health": "/api/health",
            "info": "/api/info",
            "metrics": "/api/metrics"
        }
    }))
}
