use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::info;

use crate::api::response::{created, found, ok, ApiResponse, ApiResult, JsonRequest};
use crate::core::SharedState;
use crate::records::{Course, Enrollment, User};
use crate::services::{NewUser, UserPatch};

/// List every user
pub async fn list_users(State(state): State<SharedState>) -> ApiResult<Json<ApiResponse<Vec<User>>>> {
    ok(state.services.users.get_all().await?)
}

/// Register a user
pub async fn create_user(
    State(state): State<SharedState>,
    JsonRequest(request): JsonRequest<NewUser>,
) -> ApiResult<(StatusCode, Json<ApiResponse<User>>)> {
    info!("🚀 Creating user {}", request.email);
    let user = state.services.users.create(request).await?;
    created(user, "User created successfully")
}

/// Get a user by id
pub async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<User>>> {
    found(state.services.users.get_by_id(&id).await?, format!("user {}", id))
}

/// Get a user by email
pub async fn get_user_by_email(
    State(state): State<SharedState>,
    Path(email): Path<String>,
) -> ApiResult<Json<ApiResponse<User>>> {
    found(state.services.users.get_by_email(&email).await?, format!("user with email {}", email))
}

/// Patch a user
pub async fn update_user(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    JsonRequest(patch): JsonRequest<UserPatch>,
) -> ApiResult<Json<ApiResponse<User>>> {
    ok(state.services.users.update(&id, patch).await?)
}

/// Delete a user
pub async fn delete_user(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.services.users.delete(&id).await?;
    info!("🗑️ User {} deleted", id);
    Ok(Json(ApiResponse::message(format!("User {} deleted successfully", id))))
}

/// Courses listed on a user
pub async fn user_courses(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<Course>>>> {
    ok(state.services.users.enrolled_courses(&id).await?)
}

/// Enrollment records of a user
pub async fn user_enrollments(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<Enrollment>>>> {
    ok(state.services.enrollments.get_for_user(&id).await?)
}
