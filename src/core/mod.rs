//! Core system types and foundations
//!
//! Type definitions, error handling, configuration, observability and the
//! application state shared by the HTTP layer.

pub mod app_state;
pub mod config;
pub mod error;
pub mod factory;
pub mod observability;
pub mod types;

// Re-export commonly used items
pub use app_state::{AppState, SharedState};
pub use config::Config;
pub use error::{Error, Result};
pub use types::{Fields, LessonSource, ModuleCollection, StorageMode, Timestamp};
