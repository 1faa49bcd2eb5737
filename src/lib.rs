//! Course Hub - course enrollment backend over a document store
//!
//! Users, courses, modules, lessons and enrollments live in a hierarchical
//! document store. Modules and lessons may sit under more than one layout;
//! the [`resolver`] finds them and the [`services`] hide the difference from
//! callers. The [`api`] module exposes everything over HTTP.
#![warn(missing_docs)]

// Core foundational modules
pub mod core;

// Data model and storage
pub mod records;
pub mod resolver;
pub mod storage;

// Main functional modules
pub mod api;
pub mod services;
pub mod system;

// Re-export commonly used items for convenience
pub use core::{AppState, Config, Error, Result, SharedState};

use core::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize tracing and the metrics registry. `RUST_LOG` takes precedence
/// over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::config(format!("Invalid log filter: {}", e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| Error::internal(format!("Failed to install tracing subscriber: {}", e)))?;

    tracing::info!("Initializing {} v{}", NAME, VERSION);

    system::metrics::init_registry();

    Ok(())
}
