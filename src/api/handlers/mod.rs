//! HTTP request handlers for the Course Hub API
//!
//! Handlers stay thin: extract, call one service operation, wrap the result
//! in the envelope. Errors become envelopes through [`ApiError`].
//!
//! [`ApiError`]: crate::api::response::ApiError

/// `/api/users`
pub mod users;

/// `/api/courses`
pub mod courses;

/// `/api/modules` and `/api/courses/{id}/modules`
pub mod modules;

/// `/api/lessons`
pub mod lessons;

/// `/api/enroll`, `/api/unenroll` and `/api/enrollments`
pub mod enrollments;

/// `/api/dashboard`
pub mod dashboard;

/// Health, info and metrics
pub mod system;
