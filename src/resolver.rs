//! Storage layout resolution
//!
//! Modules were written under two sub-collection spellings over time
//! (`courses/{c}/modules` and `courses/{c}/module`), and lessons live either
//! in the flat `lessons` collection or nested under their module. The
//! resolver is the only place that knows this; it answers with tagged
//! locations carrying the concrete collection path, so callers never branch
//! on naming conventions themselves.
//!
//! Nothing is cached: every call probes the store again.
//!
//! A probe that fails is treated as "this candidate does not match" and
//! resolution moves on. Only when every probe attempted in one resolution
//! fails does the resolution itself fail, with `StoreUnavailable`.

use serde_json::Value;

use crate::core::config::ResolverConfig;
use crate::core::observability::{ServiceEvent, SharedSink};
use crate::core::types::{LessonSource, ModuleCollection, LESSONS};
use crate::core::{Error, Result};
use crate::storage::{CollectionPath, SharedStore};
use crate::system::metrics::Metrics;

/// Where a module document lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleLocation {
    /// Under the given sub-collection spelling
    Found(ModuleCollection),
    /// Under neither spelling
    NotFound,
}

impl ModuleLocation {
    /// Matching spelling, if any
    pub fn collection(&self) -> Option<ModuleCollection> {
        match self {
            ModuleLocation::Found(collection) => Some(*collection),
            ModuleLocation::NotFound => None,
        }
    }

    /// Collection holding the module document
    pub fn path(&self, course_id: &str) -> Option<CollectionPath> {
        self.collection().map(|c| CollectionPath::modules(course_id, c))
    }
}

/// Where the lessons of a module live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LessonLocation {
    /// Flat `lessons` collection, filtered by `moduleId`
    TopLevel,
    /// `courses/{course_id}/modules/{m}/lessons`
    Nested {
        /// Course the module was found under
        course_id: String,
    },
    /// `courses/{course_id}/module/{m}/lessons`
    AltNested {
        /// Course the module was found under
        course_id: String,
    },
    /// Nowhere the resolver knows to look
    None,
}

impl LessonLocation {
    /// Nested location for a module sub-collection spelling
    pub fn nested(collection: ModuleCollection, course_id: impl Into<String>) -> Self {
        let course_id = course_id.into();
        match collection {
            ModuleCollection::Modules => LessonLocation::Nested { course_id },
            ModuleCollection::Module => LessonLocation::AltNested { course_id },
        }
    }

    /// Source tag put on lessons read from here
    pub fn source(&self) -> Option<LessonSource> {
        match self {
            LessonLocation::TopLevel => Some(LessonSource::TopLevel),
            LessonLocation::Nested { .. } => Some(LessonSource::Nested),
            LessonLocation::AltNested { .. } => Some(LessonSource::AltNested),
            LessonLocation::None => None,
        }
    }

    /// Course id of nested locations
    pub fn course_id(&self) -> Option<&str> {
        match self {
            LessonLocation::Nested { course_id } | LessonLocation::AltNested { course_id } => Some(course_id),
            LessonLocation::TopLevel | LessonLocation::None => None,
        }
    }

    /// Concrete collection holding the lessons of `module_id`
    pub fn path(&self, module_id: &str) -> Option<CollectionPath> {
        match self {
            LessonLocation::TopLevel => Some(CollectionPath::root(LESSONS)),
            LessonLocation::Nested { course_id } => Some(CollectionPath::nested_lessons(
                course_id,
                ModuleCollection::Modules,
                module_id,
            )),
            LessonLocation::AltNested { course_id } => Some(CollectionPath::nested_lessons(
                course_id,
                ModuleCollection::Module,
                module_id,
            )),
            LessonLocation::None => None,
        }
    }

    /// Short name used in events
    pub fn kind(&self) -> &'static str {
        match self {
            LessonLocation::TopLevel => "top-level",
            LessonLocation::Nested { .. } => "nested",
            LessonLocation::AltNested { .. } => "alt-nested",
            LessonLocation::None => "none",
        }
    }
}

/// Outcome of one probe
enum Probe {
    Hit,
    Miss,
    Failed,
}

/// Counts attempted and failed probes within one resolution
#[derive(Default)]
struct ProbeTally {
    attempted: usize,
    failed: usize,
}

impl ProbeTally {
    fn record(&mut self, probe: &Probe) {
        self.attempted += 1;
        let outcome = match probe {
            Probe::Hit => "hit",
            Probe::Miss => "miss",
            Probe::Failed => {
                self.failed += 1;
                "error"
            }
        };
        Metrics::global().resolver.probes.with_label_values(&[outcome]).inc();
    }

    fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

/// Finds which physical layout holds a module or its lessons
#[derive(Clone)]
pub struct StorageLayoutResolver {
    store: SharedStore,
    sink: SharedSink,
    config: ResolverConfig,
}

impl StorageLayoutResolver {
    /// Create a resolver over `store`
    pub fn new(store: SharedStore, sink: SharedSink, config: ResolverConfig) -> Self {
        Self { store, sink, config }
    }

    /// Probe `modules` then `module` for the module document; first hit wins
    pub async fn resolve_module_location(&self, course_id: &str, module_id: &str) -> Result<ModuleLocation> {
        let mut tally = ProbeTally::default();
        let mut location = ModuleLocation::NotFound;

        for collection in ModuleCollection::PROBE_ORDER {
            let path = CollectionPath::modules(course_id, collection);
            let probe = match self.store.get_document(&path, module_id).await {
                Ok(Some(_)) => Probe::Hit,
                Ok(None) => Probe::Miss,
                Err(e) => {
                    self.probe_failed(format!("{}/{}", path, module_id), &e);
                    Probe::Failed
                }
            };
            tally.record(&probe);
            if matches!(probe, Probe::Hit) {
                location = ModuleLocation::Found(collection);
                break;
            }
        }

        if tally.all_failed() {
            return Err(Error::store_unavailable(format!(
                "every probe for module {}/{} failed",
                course_id, module_id
            )));
        }

        self.sink.emit(ServiceEvent::ModuleResolved {
            course_id: course_id.to_string(),
            module_id: module_id.to_string(),
            collection: location.collection(),
        });
        Ok(location)
    }

    /// Locate the lessons of `module_id`.
    ///
    /// The flat collection is checked first and wins when lessons exist in
    /// both places. Nested layouts are probed only with a course id: the one
    /// supplied, or failing that a guess from the module id prefix when
    /// enabled.
    pub async fn resolve_lesson_location(&self, module_id: &str, course_id: Option<&str>) -> Result<LessonLocation> {
        let mut tally = ProbeTally::default();

        let flat = CollectionPath::root(LESSONS);
        let probe = match self
            .store
            .query_equals(&flat, "moduleId", &Value::String(module_id.to_string()))
            .await
        {
            Ok(docs) if !docs.is_empty() => Probe::Hit,
            Ok(_) => Probe::Miss,
            Err(e) => {
                self.probe_failed(format!("{}?moduleId={}", flat, module_id), &e);
                Probe::Failed
            }
        };
        tally.record(&probe);
        if matches!(probe, Probe::Hit) {
            return Ok(self.lesson_resolved(module_id, LessonLocation::TopLevel));
        }

        let course_id = match course_id {
            Some(id) => Some(id.to_string()),
            None => self.derive_course_id(module_id),
        };

        let mut location = LessonLocation::None;
        if let Some(course_id) = course_id {
            for collection in ModuleCollection::PROBE_ORDER {
                let probe = self.probe_nested(&course_id, collection, module_id).await;
                tally.record(&probe);
                if matches!(probe, Probe::Hit) {
                    location = LessonLocation::nested(collection, course_id);
                    break;
                }
            }
        }

        if tally.all_failed() {
            return Err(Error::store_unavailable(format!(
                "every probe for lessons of module {} failed",
                module_id
            )));
        }

        Ok(self.lesson_resolved(module_id, location))
    }

    /// Best-effort course id guess: the module id text before the first
    /// separator plus the configured suffix.
    ///
    /// The guess is unreliable; it is never validated and is only used to
    /// decide where to probe. Returns `None` when disabled.
    pub fn derive_course_id(&self, module_id: &str) -> Option<String> {
        if !self.config.derive_course_id {
            return None;
        }

        let prefix = module_id
            .split(self.config.module_id_separator)
            .next()
            .unwrap_or_default();
        if prefix.is_empty() {
            return None;
        }

        let course_id = format!("{}{}", prefix, self.config.course_id_suffix);
        Metrics::global().resolver.derived_course_ids.inc();
        self.sink.emit(ServiceEvent::CourseIdDerived {
            module_id: module_id.to_string(),
            course_id: course_id.clone(),
        });
        Some(course_id)
    }

    /// A module matches under `collection` only when its document exists
    /// there; lessons under a missing module document are not reachable
    async fn probe_nested(&self, course_id: &str, collection: ModuleCollection, module_id: &str) -> Probe {
        let modules = CollectionPath::modules(course_id, collection);
        match self.store.get_document(&modules, module_id).await {
            Ok(Some(_)) => Probe::Hit,
            Ok(None) => Probe::Miss,
            Err(e) => {
                self.probe_failed(format!("{}/{}", modules, module_id), &e);
                Probe::Failed
            }
        }
    }

    fn probe_failed(&self, path: String, error: &Error) {
        self.sink.emit(ServiceEvent::ProbeFailed { path, error: error.to_string() });
    }

    fn lesson_resolved(&self, module_id: &str, location: LessonLocation) -> LessonLocation {
        self.sink.emit(ServiceEvent::LessonResolved {
            module_id: module_id.to_string(),
            kind: location.kind(),
        });
        location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observability::RecordingSink;
    use crate::core::types::Fields;
    use crate::storage::{DocumentStore, Fault, FaultOp, MemoryDocumentStore};
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn resolver(store: Arc<MemoryDocumentStore>) -> (StorageLayoutResolver, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let resolver = StorageLayoutResolver::new(store, sink.clone(), ResolverConfig::default());
        (resolver, sink)
    }

    proptest! {
        #[test]
        fn module_probe_prefers_plural_spelling(
            in_plural in any::<bool>(),
            in_singular in any::<bool>(),
            course in "[a-z]{1,8}",
            module in "[a-z]{1,8}",
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let location = rt.block_on(async {
                let store = Arc::new(MemoryDocumentStore::new());
                if in_plural {
                    store
                        .set_document(&CollectionPath::modules(&course, ModuleCollection::Modules), &module, Fields::new())
                        .await
                        .unwrap();
                }
                if in_singular {
                    store
                        .set_document(&CollectionPath::modules(&course, ModuleCollection::Module), &module, Fields::new())
                        .await
                        .unwrap();
                }
                let (resolver, _) = resolver(store);
                resolver.resolve_module_location(&course, &module).await.unwrap()
            });

            let expected = if in_plural {
                ModuleLocation::Found(ModuleCollection::Modules)
            } else if in_singular {
                ModuleLocation::Found(ModuleCollection::Module)
            } else {
                ModuleLocation::NotFound
            };
            prop_assert_eq!(location, expected);
        }
    }

    #[tokio::test]
    async fn flat_lessons_win_over_nested() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .set_document(&CollectionPath::root(LESSONS), "l1", fields(json!({"moduleId": "py_intro"})))
            .await
            .unwrap();
        store
            .set_document(
                &CollectionPath::nested_lessons("py_course", ModuleCollection::Modules, "py_intro"),
                "l2",
                Fields::new(),
            )
            .await
            .unwrap();

        let (resolver, _) = resolver(store);
        let location = resolver.resolve_lesson_location("py_intro", Some("py_course")).await.unwrap();
        assert_eq!(location, LessonLocation::TopLevel);
        assert_eq!(location.path("py_intro").unwrap().as_str(), LESSONS);
    }

    #[tokio::test]
    async fn singular_spelling_is_found_through_guessed_course() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .set_document(&CollectionPath::modules("py_course", ModuleCollection::Module), "py_intro", Fields::new())
            .await
            .unwrap();

        let (resolver, sink) = resolver(store);
        let location = resolver.resolve_lesson_location("py_intro", None).await.unwrap();
        assert_eq!(location, LessonLocation::AltNested { course_id: "py_course".into() });
        assert_eq!(
            location.path("py_intro").unwrap().as_str(),
            "courses/py_course/module/py_intro/lessons"
        );
        assert_eq!(sink.count(|e| matches!(e, ServiceEvent::CourseIdDerived { .. })), 1);
    }

    #[tokio::test]
    async fn lessons_without_module_document_do_not_match() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .set_document(
                &CollectionPath::nested_lessons("c1", ModuleCollection::Modules, "m1"),
                "l1",
                Fields::new(),
            )
            .await
            .unwrap();

        let (resolver, _) = resolver(store.clone());
        assert_eq!(resolver.resolve_lesson_location("m1", Some("c1")).await.unwrap(), LessonLocation::None);

        store
            .set_document(&CollectionPath::modules("c1", ModuleCollection::Modules), "m1", Fields::new())
            .await
            .unwrap();
        assert_eq!(
            resolver.resolve_lesson_location("m1", Some("c1")).await.unwrap(),
            LessonLocation::Nested { course_id: "c1".into() }
        );
    }

    #[tokio::test]
    async fn disabled_heuristic_skips_nested_probes() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .set_document(&CollectionPath::modules("py_course", ModuleCollection::Modules), "py_intro", Fields::new())
            .await
            .unwrap();

        let config = ResolverConfig { derive_course_id: false, ..Default::default() };
        let resolver = StorageLayoutResolver::new(store, Arc::new(RecordingSink::new()), config);
        assert_eq!(resolver.derive_course_id("py_intro"), None);
        assert_eq!(resolver.resolve_lesson_location("py_intro", None).await.unwrap(), LessonLocation::None);
    }

    #[tokio::test]
    async fn failed_probe_falls_through_to_next_candidate() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .set_document(&CollectionPath::modules("c1", ModuleCollection::Module), "m1", Fields::new())
            .await
            .unwrap();
        store.inject_fault(Fault::new(FaultOp::Read, "courses/c1/modules"));

        let (resolver, sink) = resolver(store);
        let location = resolver.resolve_module_location("c1", "m1").await.unwrap();
        assert_eq!(location, ModuleLocation::Found(ModuleCollection::Module));
        assert_eq!(sink.count(|e| matches!(e, ServiceEvent::ProbeFailed { .. })), 1);
    }

    #[tokio::test]
    async fn every_probe_failing_is_store_unavailable() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.inject_fault(Fault::new(FaultOp::Read, ""));

        let (resolver, _) = resolver(store);
        let err = resolver.resolve_module_location("c1", "m1").await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));

        let err = resolver.resolve_lesson_location("m1", Some("c1")).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }
}
