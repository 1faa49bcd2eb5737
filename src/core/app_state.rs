//! Application State Management
//!
//! This module defines the central AppState that holds the configured store,
//! the services built on it and the event sink they report to. Handlers
//! receive it as `State<Arc<AppState>>`.

use std::sync::Arc;

use crate::core::config::Config;
use crate::core::observability::SharedSink;
use crate::services::Services;
use crate::storage::factory::ConfiguredStore;

/// Central application state holding all services and components
pub struct AppState {
    /// Application configuration
    pub config: Config,

    /// Store backend chosen by configuration
    pub store: ConfiguredStore,

    /// Entity and aggregation services
    pub services: Services,

    /// Sink every service reports to
    pub sink: SharedSink,
}

impl AppState {
    /// Build the services over `store` and assemble the state
    pub fn new(config: Config, store: ConfiguredStore, sink: SharedSink) -> Self {
        let services = Services::new(
            store.shared(),
            sink.clone(),
            config.resolver.clone(),
            config.dashboard.clone(),
        );
        Self { config, store, services, sink }
    }

    /// HTTP bind address
    pub fn http_addr(&self) -> std::net::SocketAddr {
        self.config.server.http_addr
    }
}

/// Shared handle passed to handlers
pub type SharedState = Arc<AppState>;
