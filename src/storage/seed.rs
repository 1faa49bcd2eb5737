//! JSON seed files
//!
//! A seed file is one JSON object keyed by collection path, each holding an
//! object keyed by document id:
//!
//! ```json
//! {
//!   "courses": { "python_course": { "name": "Python", "description": "" } },
//!   "courses/python_course/module": { "python_intro": { "title": "Intro", "order": 1 } },
//!   "lessons": { "l1": { "moduleId": "python_intro", "title": "Hello", "order": 1 } }
//! }
//! ```

use std::path::Path;
use tracing::info;

use crate::core::{Error, Result};
use crate::storage::memory::{MemoryDocumentStore, Snapshot};

/// Parse seed JSON
pub fn parse_seed(contents: &str) -> Result<Snapshot> {
    let snapshot: Snapshot = serde_json::from_str(contents)?;
    for path in snapshot.keys() {
        let segments = path.split('/').count();
        if path.is_empty() || segments % 2 == 0 {
            return Err(Error::invalid_input(format!(
                "seed key '{}' is not a collection path",
                path
            )));
        }
    }
    Ok(snapshot)
}

/// Load a seed file into the store, returning the number of documents read
pub fn load_seed_file(store: &MemoryDocumentStore, path: &Path) -> Result<usize> {
    let contents = std::fs::read_to_string(path)?;
    let snapshot = parse_seed(&contents)?;
    let count = snapshot.values().map(|docs| docs.len()).sum();
    store.load_snapshot(snapshot);
    info!("📦 Loaded {} seed documents from {}", count, path.display());
    Ok(count)
}

/// Write the store's contents as a seed file
pub fn export_seed_file(store: &MemoryDocumentStore, path: &Path) -> Result<usize> {
    let snapshot = store.snapshot();
    let count = snapshot.values().map(|docs| docs.len()).sum();
    std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
    info!("📦 Exported {} documents to {}", count, path.display());
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CollectionPath, DocumentStore};

    const SEED: &str = r#"{
        "courses": { "python_course": { "name": "Python" } },
        "courses/python_course/module": { "python_intro": { "title": "Intro", "order": 1 } }
    }"#;

    #[test]
    fn rejects_document_paths_as_keys() {
        let err = parse_seed(r#"{ "courses/c1": { "x": {} } }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn load_then_export_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let seed_path = dir.path().join("seed.json");
        std::fs::write(&seed_path, SEED).unwrap();

        let store = MemoryDocumentStore::new();
        assert_eq!(load_seed_file(&store, &seed_path).unwrap(), 2);

        let module = store
            .get_document(&CollectionPath::root("courses/python_course/module"), "python_intro")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(module.fields["title"], "Intro");

        let out_path = dir.path().join("out.json");
        assert_eq!(export_seed_file(&store, &out_path).unwrap(), 2);
        let reparsed = parse_seed(&std::fs::read_to_string(out_path).unwrap()).unwrap();
        assert_eq!(reparsed, store.snapshot());
    }
}
