//! Entity and aggregation services
//!
//! Each service owns a handle to the shared store and the event sink. Module
//! and lesson services go through the [`StorageLayoutResolver`] for every
//! lookup; the others are equality-filtered CRUD over flat collections.

use serde::Serialize;
use serde_json::Value;

use crate::core::config::{DashboardConfig, ResolverConfig};
use crate::core::observability::SharedSink;
use crate::core::types::{now, Fields};
use crate::core::Result;
use crate::records::normalize::timestamp_value;
use crate::resolver::StorageLayoutResolver;
use crate::storage::{to_fields, CollectionPath, Document, SharedStore};

pub mod course;
pub mod dashboard;
pub mod enrollment;
pub mod lesson;
pub mod module;
pub mod user;

pub use course::{CoursePatch, CourseService, NewCourse};
pub use dashboard::{CourseRanking, CourseSummary, DashboardService, DashboardStats, ModuleLessonCount, Totals};
pub use enrollment::{EnrollmentService, NewEnrollment};
pub use lesson::{LessonFilter, LessonPatch, LessonService, NewLesson};
pub use module::{ModulePatch, ModuleService, NewModule};
pub use user::{NewUser, UserPatch, UserService};

/// Every service, wired to one store and one sink
#[derive(Clone)]
pub struct Services {
    /// Users
    pub users: UserService,
    /// Courses
    pub courses: CourseService,
    /// Modules
    pub modules: ModuleService,
    /// Lessons
    pub lessons: LessonService,
    /// Enrollments
    pub enrollments: EnrollmentService,
    /// Dashboard statistics
    pub dashboard: DashboardService,
}

impl Services {
    /// Build every service over `store`
    pub fn new(
        store: SharedStore,
        sink: SharedSink,
        resolver_config: ResolverConfig,
        dashboard_config: DashboardConfig,
    ) -> Self {
        let resolver = StorageLayoutResolver::new(store.clone(), sink.clone(), resolver_config);
        let modules = ModuleService::new(store.clone(), sink.clone(), resolver.clone());
        let lessons = LessonService::new(store.clone(), sink.clone(), resolver);

        Self {
            users: UserService::new(store.clone(), sink.clone()),
            courses: CourseService::new(store.clone(), sink.clone()),
            enrollments: EnrollmentService::new(store.clone(), sink),
            dashboard: DashboardService::new(store, modules.clone(), lessons.clone(), dashboard_config),
            modules,
            lessons,
        }
    }
}

/// Current time as a stored value
pub(crate) fn timestamp_now() -> Value {
    timestamp_value(&now())
}

/// Patch fields from a patch struct, with `updatedAt` stamped
pub(crate) fn stamped_patch<T: Serialize>(patch: &T) -> Result<Fields> {
    let mut fields = to_fields(patch)?;
    fields.insert("updatedAt".to_string(), timestamp_now());
    Ok(fields)
}

/// First document whose `field` equals `value`
pub(crate) async fn find_one(
    store: &SharedStore,
    collection: &CollectionPath,
    field: &str,
    value: &str,
) -> Result<Option<Document>> {
    let docs = store
        .query_equals(collection, field, &Value::String(value.to_string()))
        .await?;
    Ok(docs.into_iter().next())
}

/// Test fixtures shared by the service tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::core::observability::RecordingSink;
    use crate::core::types::ModuleCollection;
    use crate::storage::{DocumentStore, MemoryDocumentStore};
    use serde_json::json;
    use std::sync::Arc;

    pub struct Fixture {
        pub store: Arc<MemoryDocumentStore>,
        pub sink: Arc<RecordingSink>,
        pub services: Services,
    }

    pub fn fixture() -> Fixture {
        let store = Arc::new(MemoryDocumentStore::new());
        let sink = Arc::new(RecordingSink::new());
        let services = Services::new(
            store.clone(),
            sink.clone(),
            ResolverConfig::default(),
            DashboardConfig::default(),
        );
        Fixture { store, sink, services }
    }

    pub fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    impl Fixture {
        pub async fn put(&self, path: &CollectionPath, id: &str, value: Value) {
            self.store.set_document(path, id, fields(value)).await.unwrap();
        }

        pub async fn course(&self, id: &str, name: &str) {
            self.put(&CollectionPath::root("courses"), id, json!({"name": name})).await;
        }

        pub async fn module(&self, course_id: &str, collection: ModuleCollection, id: &str, order: i64) {
            self.put(
                &CollectionPath::modules(course_id, collection),
                id,
                json!({"title": id, "order": order}),
            )
            .await;
        }
    }
}
