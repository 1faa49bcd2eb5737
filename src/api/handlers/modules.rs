use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::info;

use crate::api::response::{created, found, ok, ApiResponse, ApiResult, JsonRequest};
use crate::core::SharedState;
use crate::records::{Lesson, Module};
use crate::services::{ModulePatch, NewModule};

/// Every module of every course
pub async fn list_all_modules(State(state): State<SharedState>) -> ApiResult<Json<ApiResponse<Vec<Module>>>> {
    ok(state.services.modules.get_all().await?)
}

/// Modules of one course
pub async fn list_course_modules(
    State(state): State<SharedState>,
    Path(course_id): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<Module>>>> {
    ok(state.services.modules.get_all_for_course(&course_id).await?)
}

/// Create a module in a course
pub async fn create_module(
    State(state): State<SharedState>,
    Path(course_id): Path<String>,
    JsonRequest(request): JsonRequest<NewModule>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Module>>)> {
    info!("🚀 Creating module {:?} in course {}", request.title, course_id);
    let module = state.services.modules.create(&course_id, request).await?;
    created(module, "Module created successfully")
}

/// Get a module from either spelling
pub async fn get_module(
    State(state): State<SharedState>,
    Path((course_id, module_id)): Path<(String, String)>,
) -> ApiResult<Json<ApiResponse<Module>>> {
    found(
        state.services.modules.get_by_id(&course_id, &module_id).await?,
        format!("module {}/{}", course_id, module_id),
    )
}

/// Patch a module
pub async fn update_module(
    State(state): State<SharedState>,
    Path((course_id, module_id)): Path<(String, String)>,
    JsonRequest(patch): JsonRequest<ModulePatch>,
) -> ApiResult<Json<ApiResponse<Module>>> {
    ok(state.services.modules.update(&course_id, &module_id, patch).await?)
}

/// Delete a module and its nested lessons
pub async fn delete_module(
    State(state): State<SharedState>,
    Path((course_id, module_id)): Path<(String, String)>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let removed = state.services.modules.delete(&course_id, &module_id).await?;
    info!("🗑️ Module {}/{} deleted with {} lessons", course_id, module_id, removed);
    Ok(Json(ApiResponse::message(format!(
        "Module {} deleted with {} lessons",
        module_id, removed
    ))))
}

/// Recompute the advisory lesson count
pub async fn recount_module_lessons(
    State(state): State<SharedState>,
    Path((course_id, module_id)): Path<(String, String)>,
) -> ApiResult<Json<ApiResponse<Module>>> {
    ok(state.services.modules.recount_lessons(&course_id, &module_id).await?)
}

/// Lessons of a module verified to exist in the course
pub async fn module_lessons(
    State(state): State<SharedState>,
    Path((course_id, module_id)): Path<(String, String)>,
) -> ApiResult<Json<ApiResponse<Vec<Lesson>>>> {
    ok(state.services.lessons.get_by_course_and_module(&course_id, &module_id).await?)
}
