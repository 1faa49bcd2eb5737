//! HTTP server implementation for the Course Hub API

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

use super::handlers::{courses, dashboard, enrollments, lessons, modules, system, users};
use crate::core::{Error, Result, SharedState};

/// Routes under `/api`
fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(system::root_handler))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/by-email/{email}", get(users::get_user_by_email))
        .route(
            "/users/{id}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/users/{id}/courses", get(users::user_courses))
        .route("/users/{id}/enrollments", get(users::user_enrollments))
        // Courses
        .route("/courses", get(courses::list_courses).post(courses::create_course))
        .route(
            "/courses/{id}",
            get(courses::get_course).put(courses::update_course).delete(courses::delete_course),
        )
        .route("/courses/{id}/users", get(courses::course_users))
        .route("/courses/{id}/enrollments", get(courses::course_enrollments))
        .route("/courses/{id}/summary", get(courses::course_summary))
        // Modules
        .route("/modules", get(modules::list_all_modules))
        .route(
            "/courses/{id}/modules",
            get(modules::list_course_modules).post(modules::create_module),
        )
        .route(
            "/courses/{id}/modules/{module_id}",
            get(modules::get_module).put(modules::update_module).delete(modules::delete_module),
        )
        .route("/courses/{id}/modules/{module_id}/recount", post(modules::recount_module_lessons))
        .route("/courses/{id}/modules/{module_id}/lessons", get(modules::module_lessons))
        // Lessons
        .route("/lessons", get(lessons::list_lessons).post(lessons::create_lesson))
        .route("/lessons/search", get(lessons::search_lessons))
        .route(
            "/lessons/{id}",
            get(lessons::get_lesson).put(lessons::update_lesson).delete(lessons::delete_lesson),
        )
        // Enrollments
        .route("/enroll", post(enrollments::enroll))
        .route("/unenroll", post(enrollments::unenroll))
        .route(
            "/enrollments",
            get(enrollments::list_enrollments).post(enrollments::create_enrollment),
        )
        .route(
            "/enrollments/{id}",
            get(enrollments::get_enrollment).delete(enrollments::delete_enrollment),
        )
        .route("/enrollments/{id}/status", put(enrollments::update_enrollment_status))
        .route("/enrollments/{id}/progress", put(enrollments::update_enrollment_progress))
        .route("/enrollments/{id}/touch", post(enrollments::touch_enrollment))
        // Dashboard
        .route("/dashboard/stats", get(dashboard::dashboard_stats))
        // System
        .route("/health", get(system::health_check))
        .route("/info", get(system::system_info))
        .route("/metrics", get(system::metrics_handler))
}

/// Creates the main application router with all routes and middleware
pub fn create_app(state: SharedState) -> Router {
    let cors = state.config.server.permissive_cors.then(|| {
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([CONTENT_TYPE])
            .allow_origin(Any)
    });

    let mut app = Router::new().nest("/api", api_routes());

    if let Some(dir) = state.config.server.static_dir.as_ref().filter(|dir| dir.is_dir()) {
        info!("📁 Serving dashboard from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .option_layer(cors),
    )
    .with_state(state)
}

/// Start the HTTP server and run until `shutdown` resolves
pub async fn start_server<F>(state: SharedState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.http_addr();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🚀 Course Hub API listening on http://{}", addr);
    info!("📖 Endpoint index at http://{}/api", addr);
    info!("❤️ Health check at http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::internal(format!("HTTP server failed: {}", e)))?;

    info!("✅ HTTP server stopped");
    Ok(())
}
