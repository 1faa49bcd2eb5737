use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::info;

use crate::api::response::{created, found, ok, ApiResponse, ApiResult, JsonRequest};
use crate::core::{Error, SharedState, StorageMode};
use crate::records::Lesson;
use crate::services::{LessonFilter, LessonPatch, NewLesson};

/// `?moduleId=&courseId=` hints and filters
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonQuery {
    /// Module id
    pub module_id: Option<String>,
    /// Course id
    pub course_id: Option<String>,
}

/// `POST /api/lessons` query
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonQuery {
    /// `top-level` (default) or `nested`
    pub mode: Option<StorageMode>,
    /// Module id, overriding the body
    pub module_id: Option<String>,
    /// Course id, overriding the body
    pub course_id: Option<String>,
}

/// `GET /api/lessons/search` query
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Search term
    pub q: Option<String>,
    /// Restrict to a module
    pub module_id: Option<String>,
    /// Restrict to a course
    pub course_id: Option<String>,
}

/// List lessons: of one module when `moduleId` is given, otherwise all
/// lessons, optionally of one course
pub async fn list_lessons(
    State(state): State<SharedState>,
    Query(query): Query<LessonQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Lesson>>>> {
    let lessons = &state.services.lessons;
    let result = match (query.module_id.as_deref(), query.course_id.as_deref()) {
        (Some(module_id), Some(course_id)) => lessons.get_by_course_and_module(course_id, module_id).await?,
        (Some(module_id), None) => lessons.get_by_module(module_id, None).await?,
        (None, Some(course_id)) => lessons
            .get_all()
            .await?
            .into_iter()
            .filter(|lesson| lesson.course_id.as_deref() == Some(course_id))
            .collect(),
        (None, None) => lessons.get_all().await?,
    };
    ok(result)
}

/// Create a lesson in the flat collection or nested under its module
pub async fn create_lesson(
    State(state): State<SharedState>,
    Query(query): Query<CreateLessonQuery>,
    JsonRequest(request): JsonRequest<NewLesson>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Lesson>>)> {
    let mode = query.mode.unwrap_or_default();
    info!("🚀 Creating lesson {:?} ({:?})", request.title, mode);
    let lesson = state
        .services
        .lessons
        .create(request, mode, query.course_id.as_deref(), query.module_id.as_deref())
        .await?;
    created(lesson, "Lesson created successfully")
}

/// Get a lesson; nested lessons need both hints
pub async fn get_lesson(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<LessonQuery>,
) -> ApiResult<Json<ApiResponse<Lesson>>> {
    let lesson = state
        .services
        .lessons
        .get_by_id(&id, query.module_id.as_deref(), query.course_id.as_deref())
        .await?;
    found(lesson, format!("lesson {}", id))
}

/// Patch a lesson where it was found
pub async fn update_lesson(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<LessonQuery>,
    JsonRequest(patch): JsonRequest<LessonPatch>,
) -> ApiResult<Json<ApiResponse<Lesson>>> {
    ok(state
        .services
        .lessons
        .update(&id, patch, query.course_id.as_deref(), query.module_id.as_deref())
        .await?)
}

/// Delete a lesson where it was found
pub async fn delete_lesson(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<LessonQuery>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state
        .services
        .lessons
        .delete(&id, query.course_id.as_deref(), query.module_id.as_deref())
        .await?;
    info!("🗑️ Lesson {} deleted", id);
    Ok(Json(ApiResponse::message(format!("Lesson {} deleted successfully", id))))
}

/// Substring search over title, content and description
pub async fn search_lessons(
    State(state): State<SharedState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Lesson>>>> {
    let term = query.q.ok_or_else(|| Error::invalid_input("query parameter q is required"))?;
    let filter = LessonFilter { module_id: query.module_id, course_id: query.course_id };
    ok(state.services.lessons.search(&term, &filter).await?)
}
