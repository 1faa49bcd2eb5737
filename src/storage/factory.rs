//! Storage factory for creating store backends based on configuration

use std::sync::Arc;
use tracing::info;

use crate::core::config::{StorageConfig, StorageType};
use crate::core::{Error, Result};
use crate::storage::memory::MemoryDocumentStore;
use crate::storage::{seed, SharedStore};

/// Store backend chosen by configuration
#[derive(Clone)]
pub enum ConfiguredStore {
    /// In-process store
    Memory(Arc<MemoryDocumentStore>),
}

impl ConfiguredStore {
    /// Handle used by the services
    pub fn shared(&self) -> SharedStore {
        match self {
            ConfiguredStore::Memory(store) => store.clone(),
        }
    }

    /// Backend type
    pub fn storage_type(&self) -> StorageType {
        match self {
            ConfiguredStore::Memory(_) => StorageType::Memory,
        }
    }

    /// Documents currently held
    pub fn document_count(&self) -> usize {
        match self {
            ConfiguredStore::Memory(store) => store.document_count(),
        }
    }

    /// Write the store contents to a seed file
    pub fn export_seed(&self, path: &std::path::Path) -> Result<usize> {
        match self {
            ConfiguredStore::Memory(store) => seed::export_seed_file(store, path),
        }
    }
}

/// Create a store implementation based on configuration, loading the seed
/// file when one is configured
pub fn create_store(config: &StorageConfig) -> Result<ConfiguredStore> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Initializing MemoryDocumentStore");
            let store = MemoryDocumentStore::new();
            if let Some(path) = &config.seed_file {
                seed::load_seed_file(&store, path).map_err(|e| {
                    Error::config(format!("Failed to load seed file {}: {}", path.display(), e))
                })?;
            }
            Ok(ConfiguredStore::Memory(Arc::new(store)))
        }
    }
}
