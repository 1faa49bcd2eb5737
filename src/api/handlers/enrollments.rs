use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::info;

use crate::api::response::{created, found, ok, ApiResponse, ApiResult, JsonRequest};
use crate::core::SharedState;
use crate::records::{Enrollment, EnrollmentStatus};
use crate::services::NewEnrollment;

/// Body of `/api/enroll` and `/api/unenroll`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    /// User email
    pub email: String,
    /// Course name
    pub course_name: String,
}

/// Body of `PUT /api/enrollments/{id}/status`
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    /// New status
    pub status: EnrollmentStatus,
}

/// Body of `PUT /api/enrollments/{id}/progress`
#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    /// Completion percentage, 0-100
    pub progress: i64,
}

/// Enroll a user in a course by email and course name
pub async fn enroll(
    State(state): State<SharedState>,
    JsonRequest(request): JsonRequest<EnrollRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Enrollment>>)> {
    info!("🚀 Enrolling {} in {}", request.email, request.course_name);
    let enrollment = state
        .services
        .enrollments
        .enroll_user_in_course(&request.email, &request.course_name)
        .await?;
    created(enrollment, "User enrolled successfully")
}

/// Remove a user from a course by email and course name
pub async fn unenroll(
    State(state): State<SharedState>,
    JsonRequest(request): JsonRequest<EnrollRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state
        .services
        .enrollments
        .unenroll_user_from_course(&request.email, &request.course_name)
        .await?;
    info!("🗑️ {} unenrolled from {}", request.email, request.course_name);
    Ok(Json(ApiResponse::message("User unenrolled successfully")))
}

/// Every enrollment record
pub async fn list_enrollments(State(state): State<SharedState>) -> ApiResult<Json<ApiResponse<Vec<Enrollment>>>> {
    ok(state.services.enrollments.get_all().await?)
}

/// Create an explicit enrollment record
pub async fn create_enrollment(
    State(state): State<SharedState>,
    JsonRequest(request): JsonRequest<NewEnrollment>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Enrollment>>)> {
    let enrollment = state.services.enrollments.create(request).await?;
    created(enrollment, "Enrollment created successfully")
}

/// Get an enrollment record
pub async fn get_enrollment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Enrollment>>> {
    found(state.services.enrollments.get_by_id(&id).await?, format!("enrollment {}", id))
}

/// Set the status of a record
pub async fn update_enrollment_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonRequest(request): JsonRequest<StatusRequest>,
) -> ApiResult<Json<ApiResponse<Enrollment>>> {
    ok(state.services.enrollments.update_status(&id, request.status).await?)
}

/// Set the progress of a record
pub async fn update_enrollment_progress(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonRequest(request): JsonRequest<ProgressRequest>,
) -> ApiResult<Json<ApiResponse<Enrollment>>> {
    ok(state.services.enrollments.update_progress(&id, request.progress).await?)
}

/// Stamp the last access time of a record
pub async fn touch_enrollment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Enrollment>>> {
    ok(state.services.enrollments.touch(&id).await?)
}

/// Delete a record
pub async fn delete_enrollment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.services.enrollments.delete(&id).await?;
    Ok(Json(ApiResponse::message(format!("Enrollment {} deleted successfully", id))))
}
