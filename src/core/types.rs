//! Core type definitions shared by the store, resolver and services

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field map of a stored document
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Timestamp type used on records
pub type Timestamp = DateTime<Utc>;

/// Top-level users collection
pub const USERS: &str = "users";
/// Top-level courses collection
pub const COURSES: &str = "courses";
/// Flat lessons collection, keyed by a `moduleId` field
pub const LESSONS: &str = "lessons";
/// Explicit enrollment records
pub const ENROLLMENTS: &str = "enrollments";

/// Current time as stored in documents
pub fn now() -> Timestamp {
    Utc::now()
}

/// RFC 3339 rendering used for every persisted timestamp
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Sub-collection spelling a course uses for its modules.
///
/// Data was written under both spellings over time. New modules always go
/// to [`ModuleCollection::Modules`]; reads probe both in [`PROBE_ORDER`].
///
/// [`PROBE_ORDER`]: ModuleCollection::PROBE_ORDER
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModuleCollection {
    /// `courses/{id}/modules`
    #[serde(rename = "modules")]
    Modules,
    /// `courses/{id}/module`
    #[serde(rename = "module")]
    Module,
}

impl ModuleCollection {
    /// Fixed priority order for probing
    pub const PROBE_ORDER: [ModuleCollection; 2] = [ModuleCollection::Modules, ModuleCollection::Module];

    /// Sub-collection name
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleCollection::Modules => "modules",
            ModuleCollection::Module => "module",
        }
    }
}

impl fmt::Display for ModuleCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical location a lesson was read from.
///
/// Update and delete must target this location; writing anywhere else
/// silently touches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LessonSource {
    /// Flat `lessons` collection
    TopLevel,
    /// `courses/{c}/modules/{m}/lessons`
    Nested,
    /// `courses/{c}/module/{m}/lessons`
    AltNested,
}

impl LessonSource {
    /// Module sub-collection for nested sources
    pub fn module_collection(&self) -> Option<ModuleCollection> {
        match self {
            LessonSource::TopLevel => None,
            LessonSource::Nested => Some(ModuleCollection::Modules),
            LessonSource::AltNested => Some(ModuleCollection::Module),
        }
    }

    /// Nested source for a module sub-collection spelling
    pub fn nested_in(collection: ModuleCollection) -> Self {
        match collection {
            ModuleCollection::Modules => LessonSource::Nested,
            ModuleCollection::Module => LessonSource::AltNested,
        }
    }
}

/// Where a new lesson is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    /// Flat `lessons` collection
    #[default]
    TopLevel,
    /// Under the owning module, whichever spelling it uses
    Nested,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_source_tags_use_kebab_case() {
        assert_eq!(serde_json::to_value(LessonSource::AltNested).unwrap(), "alt-nested");
        assert_eq!(serde_json::to_value(LessonSource::TopLevel).unwrap(), "top-level");
        let mode: StorageMode = serde_json::from_value(serde_json::json!("nested")).unwrap();
        assert_eq!(mode, StorageMode::Nested);
    }

    #[test]
    fn nested_sources_round_trip_to_collections() {
        for collection in ModuleCollection::PROBE_ORDER {
            assert_eq!(LessonSource::nested_in(collection).module_collection(), Some(collection));
        }
        assert_eq!(LessonSource::TopLevel.module_collection(), None);
    }
}
