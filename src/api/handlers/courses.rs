use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::info;

use crate::api::response::{created, found, ok, ApiResponse, ApiResult, JsonRequest};
use crate::core::SharedState;
use crate::records::{Course, Enrollment, User};
use crate::services::{CoursePatch, CourseSummary, NewCourse};

/// List every course
pub async fn list_courses(State(state): State<SharedState>) -> ApiResult<Json<ApiResponse<Vec<Course>>>> {
    ok(state.services.courses.get_all().await?)
}

/// Create a course
pub async fn create_course(
    State(state): State<SharedState>,
    JsonRequest(request): JsonRequest<NewCourse>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Course>>)> {
    info!("🚀 Creating course {}", request.name);
    let course = state.services.courses.create(request).await?;
    created(course, "Course created successfully")
}

/// Get a course by id
pub async fn get_course(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Course>>> {
    found(state.services.courses.get_by_id(&id).await?, format!("course {}", id))
}

/// Patch a course
pub async fn update_course(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonRequest(patch): JsonRequest<CoursePatch>,
) -> ApiResult<Json<ApiResponse<Course>>> {
    ok(state.services.courses.update(&id, patch).await?)
}

/// Delete a course document
pub async fn delete_course(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.services.courses.delete(&id).await?;
    info!("🗑️ Course {} deleted", id);
    Ok(Json(ApiResponse::message(format!("Course {} deleted successfully", id))))
}

/// Users listed on a course
pub async fn course_users(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<User>>>> {
    ok(state.services.courses.enrolled_users(&id).await?)
}

/// Enrollment records of a course
pub async fn course_enrollments(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<Enrollment>>>> {
    ok(state.services.enrollments.get_for_course(&id).await?)
}

/// Module and lesson figures of a course
pub async fn course_summary(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<CourseSummary>>> {
    ok(state.services.dashboard.course_summary(&id).await?)
}
