use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;

use crate::api::response::{ok, ApiResponse, ApiResult};
use crate::core::SharedState;
use crate::services::DashboardStats;

/// `GET /api/dashboard/stats` query
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// Size of the course ranking
    pub top: Option<usize>,
}

/// Front page statistics
pub async fn dashboard_stats(
    State(state): State<SharedState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<ApiResponse<DashboardStats>>> {
    ok(state.services.dashboard.overview(query.top).await?)
}
