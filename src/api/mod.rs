//! # API Module
//!
//! HTTP interface for Course Hub. Every response uses the
//! `{success, data, message, error}` envelope from [`response`].
//!
//! ## Endpoints Overview
//!
//! ### Users
//! - `GET|POST /api/users`
//! - `GET /api/users/by-email/{email}`
//! - `GET|PUT|DELETE /api/users/{id}`
//! - `GET /api/users/{id}/courses`, `GET /api/users/{id}/enrollments`
//!
//! ### Courses
//! - `GET|POST /api/courses`
//! - `GET|PUT|DELETE /api/courses/{id}`
//! - `GET /api/courses/{id}/users`, `/enrollments`, `/summary`
//!
//! ### Modules
//! - `GET /api/modules` - every module of every course
//! - `GET|POST /api/courses/{id}/modules`
//! - `GET|PUT|DELETE /api/courses/{id}/modules/{module_id}`
//! - `POST /api/courses/{id}/modules/{module_id}/recount`
//! - `GET /api/courses/{id}/modules/{module_id}/lessons`
//!
//! ### Lessons
//! - `GET /api/lessons?moduleId=&courseId=`
//! - `POST /api/lessons?mode=top-level|nested&moduleId=&courseId=`
//! - `GET /api/lessons/search?q=&moduleId=&courseId=`
//! - `GET|PUT|DELETE /api/lessons/{id}?moduleId=&courseId=`
//!
//! ### Enrollments
//! - `POST /api/enroll`, `POST /api/unenroll` - `{email, courseName}`
//! - `GET|POST /api/enrollments`
//! - `GET|DELETE /api/enrollments/{id}`
//! - `PUT /api/enrollments/{id}/status`, `PUT /api/enrollments/{id}/progress`
//! - `POST /api/enrollments/{id}/touch`
//!
//! ### System
//! - `GET /api/dashboard/stats?top=`
//! - `GET /api/health`, `GET /api/info`, `GET /api/metrics`

pub mod handlers;
pub mod response;
pub mod server;

pub use response::{ApiError, ApiResponse, ApiResult};
pub use server::{create_app, start_server};
