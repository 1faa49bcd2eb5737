//! Application Factory
//!
//! Creates the AppState from configuration: store backend (with its seed
//! data), event sink and services.

use std::sync::Arc;
use tracing::info;

use crate::core::app_state::AppState;
use crate::core::config::Config;
use crate::core::observability::TracingSink;
use crate::core::Result;
use crate::storage::create_store;

/// Create AppState based on configuration
pub fn create_app_state(config: Config) -> Result<AppState> {
    info!("Creating AppState with storage type: {:?}", config.storage.storage_type);

    let store = create_store(&config.storage)?;
    info!("Store initialized successfully");

    if !config.resolver.derive_course_id {
        info!("Course id guessing disabled; nested lessons need an explicit course id");
    }

    let app_state = AppState::new(config, store, Arc::new(TracingSink));
    info!("AppState created successfully");
    Ok(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StorageType;

    #[test]
    fn default_config_builds_memory_state() {
        let state = create_app_state(Config::default()).unwrap();
        assert_eq!(state.store.storage_type(), StorageType::Memory);
        assert_eq!(state.http_addr(), Config::default().server.http_addr);
    }
}
