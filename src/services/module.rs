//! Module service
//!
//! Reads probe both sub-collection spellings; new modules always go to
//! `modules`. Updates and deletes target whichever spelling the resolver
//! finds.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::core::observability::{ServiceEvent, SharedSink};
use crate::core::types::{Fields, ModuleCollection, COURSES, LESSONS};
use crate::core::{Error, Result};
use crate::records::normalize::{module_id_from_title, opt_str_field};
use crate::records::Module;
use crate::resolver::{ModuleLocation, StorageLayoutResolver};
use crate::services::{stamped_patch, timestamp_now};
use crate::storage::{CollectionPath, DocumentRef, SharedStore};

/// Payload for creating a module
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewModule {
    /// Explicit module id; derived from the title when absent
    #[serde(default)]
    pub id: Option<String>,
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Display position
    #[serde(default)]
    pub order: i64,
    /// Unlocked for learners; locked by default
    #[serde(default)]
    pub is_unlocked: bool,
}

/// Partial update of a module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulePatch {
    /// New title; the module id does not change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New display position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Lock state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_unlocked: Option<bool>,
    /// Advisory lesson count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_lessons: Option<i64>,
}

/// Module operations over both sub-collection spellings
#[derive(Clone)]
pub struct ModuleService {
    store: SharedStore,
    sink: SharedSink,
    resolver: StorageLayoutResolver,
}

impl ModuleService {
    /// Create the service
    pub fn new(store: SharedStore, sink: SharedSink, resolver: StorageLayoutResolver) -> Self {
        Self { store, sink, resolver }
    }

    /// Every module of every course, sorted by course id then order.
    ///
    /// Reads two collections per course, so cost grows with the number of
    /// courses.
    pub async fn get_all(&self) -> Result<Vec<Module>> {
        let courses = self.store.list_documents(&CollectionPath::root(COURSES)).await?;

        let mut modules = Vec::new();
        for course in &courses {
            modules.extend(self.get_all_for_course(&course.id).await?);
        }
        // Per-course lists are already ordered; a stable sort on the course
        // id keeps that order.
        modules.sort_by(|a, b| a.course_id.cmp(&b.course_id));
        Ok(modules)
    }

    /// Modules of one course from both spellings, deduplicated and sorted by
    /// order. A module present under both keeps its `modules` copy.
    pub async fn get_all_for_course(&self, course_id: &str) -> Result<Vec<Module>> {
        let mut seen = HashSet::new();
        let mut modules = Vec::new();

        for collection in ModuleCollection::PROBE_ORDER {
            let docs = self
                .store
                .list_documents(&CollectionPath::modules(course_id, collection))
                .await?;
            for doc in &docs {
                if seen.insert(doc.id.clone()) {
                    modules.push(Module::from_document(doc, course_id, collection));
                }
            }
        }

        modules.sort_by_key(|m| m.order);
        Ok(modules)
    }

    /// Module by id, from whichever spelling holds it
    pub async fn get_by_id(&self, course_id: &str, module_id: &str) -> Result<Option<Module>> {
        let ModuleLocation::Found(collection) = self.resolver.resolve_module_location(course_id, module_id).await? else {
            return Ok(None);
        };
        let doc = self
            .store
            .get_document(&CollectionPath::modules(course_id, collection), module_id)
            .await?;
        Ok(doc.map(|doc| Module::from_document(&doc, course_id, collection)))
    }

    /// Create a module under `courses/{course_id}/modules`
    pub async fn create(&self, course_id: &str, data: NewModule) -> Result<Module> {
        let title = data.title.trim();
        if title.is_empty() {
            return Err(Error::invalid_input("module title is required"));
        }

        let module_id = match data.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => module_id_from_title(title),
        };
        if module_id.contains('/') {
            return Err(Error::invalid_input(format!("module id {} must not contain '/'", module_id)));
        }

        if self
            .store
            .get_document(&CollectionPath::root(COURSES), course_id)
            .await?
            .is_none()
        {
            return Err(Error::not_found(format!("course {}", course_id)));
        }
        if let ModuleLocation::Found(collection) = self.resolver.resolve_module_location(course_id, &module_id).await? {
            return Err(Error::conflict(format!(
                "module {} already exists in course {} under {}",
                module_id, course_id, collection
            )));
        }

        let now = timestamp_now();
        let mut fields = Fields::new();
        fields.insert("title".to_string(), Value::String(title.to_string()));
        fields.insert("description".to_string(), Value::String(data.description));
        fields.insert("order".to_string(), json!(data.order));
        fields.insert("totalLessons".to_string(), json!(0));
        fields.insert("isUnlocked".to_string(), Value::Bool(data.is_unlocked));
        fields.insert("createdAt".to_string(), now.clone());
        fields.insert("updatedAt".to_string(), now);

        let path = CollectionPath::modules(course_id, ModuleCollection::Modules);
        self.store.set_document(&path, &module_id, fields).await?;
        self.sink.emit(ServiceEvent::Created { entity: "module", id: module_id.clone() });

        self.get_by_id(course_id, &module_id)
            .await?
            .ok_or_else(|| Error::internal(format!("module {} vanished after create", module_id)))
    }

    /// Merge `patch` into the module wherever it lives
    pub async fn update(&self, course_id: &str, module_id: &str, patch: ModulePatch) -> Result<Module> {
        let collection = self.require_location(course_id, module_id).await?;
        let path = CollectionPath::modules(course_id, collection);
        self.store
            .update_document(&path, module_id, stamped_patch(&patch)?)
            .await?;
        self.sink.emit(ServiceEvent::Updated { entity: "module", id: module_id.to_string() });

        self.get_by_id(course_id, module_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("module {}/{}", course_id, module_id)))
    }

    /// Delete the module and every lesson nested under it in one batch.
    /// A module stored under both spellings is one module: every copy and
    /// its lessons go together. Returns the number of lessons removed.
    pub async fn delete(&self, course_id: &str, module_id: &str) -> Result<usize> {
        let mut refs = Vec::new();
        let mut lesson_count = 0;
        for collection in ModuleCollection::PROBE_ORDER {
            let modules_path = CollectionPath::modules(course_id, collection);
            if self.store.get_document(&modules_path, module_id).await?.is_none() {
                continue;
            }

            let lessons_path = CollectionPath::nested_lessons(course_id, collection, module_id);
            let lessons = self.store.list_documents(&lessons_path).await?;
            lesson_count += lessons.len();
            refs.extend(
                lessons
                    .iter()
                    .map(|lesson| DocumentRef::new(lessons_path.clone(), lesson.id.clone())),
            );
            refs.push(DocumentRef::new(modules_path, module_id));
        }
        if refs.is_empty() {
            return Err(Error::not_found(format!("module {}/{}", course_id, module_id)));
        }

        self.store.batch_delete(refs).await?;
        self.sink.emit(ServiceEvent::Deleted {
            entity: "module",
            id: module_id.to_string(),
            cascaded: lesson_count,
        });
        Ok(lesson_count)
    }

    /// Recompute the advisory `totalLessons` counter from the lessons that
    /// currently exist: nested under the module, plus flat lessons pointing
    /// at it whose course is this course or unset.
    pub async fn recount_lessons(&self, course_id: &str, module_id: &str) -> Result<Module> {
        let collection = self.require_location(course_id, module_id).await?;

        let nested = self
            .store
            .list_documents(&CollectionPath::nested_lessons(course_id, collection, module_id))
            .await?;
        let flat = self
            .store
            .query_equals(&CollectionPath::root(LESSONS), "moduleId", &Value::String(module_id.to_string()))
            .await?;
        let flat_count = flat
            .iter()
            .filter(|doc| opt_str_field(&doc.fields, "courseId").map_or(true, |c| c == course_id))
            .count();

        let patch = ModulePatch {
            total_lessons: Some((nested.len() + flat_count) as i64),
            ..Default::default()
        };
        self.update(course_id, module_id, patch).await
    }

    async fn require_location(&self, course_id: &str, module_id: &str) -> Result<ModuleCollection> {
        self.resolver
            .resolve_module_location(course_id, module_id)
            .await?
            .collection()
            .ok_or_else(|| Error::not_found(format!("module {}/{}", course_id, module_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::fixture;
    use crate::storage::{Fault, FaultOp};

    fn new_module(title: &str) -> NewModule {
        NewModule { id: None, title: title.to_string(), description: String::new(), order: 1, is_unlocked: false }
    }

    #[tokio::test]
    async fn create_writes_plural_spelling_with_defaults() {
        let fx = fixture();
        fx.course("py_course", "Python").await;

        let module = fx.services.modules.create("py_course", new_module("Intro to Python")).await.unwrap();
        assert_eq!(module.id, "intro_to_python");
        assert_eq!(module.source, ModuleCollection::Modules);
        assert_eq!(module.total_lessons, 0);
        assert!(!module.is_unlocked);
    }

    #[tokio::test]
    async fn create_conflicts_with_either_spelling() {
        let fx = fixture();
        fx.course("c1", "Rust").await;
        fx.module("c1", ModuleCollection::Module, "basics", 1).await;

        let err = fx.services.modules.create("c1", new_module("Basics")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn create_under_missing_course_is_not_found() {
        let fx = fixture();
        let err = fx.services.modules.create("ghost", new_module("Basics")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn singular_only_course_still_lists_modules() {
        let fx = fixture();
        fx.course("c1", "Rust").await;
        fx.module("c1", ModuleCollection::Module, "m2", 2).await;
        fx.module("c1", ModuleCollection::Module, "m1", 1).await;

        let modules = fx.services.modules.get_all_for_course("c1").await.unwrap();
        let ids: Vec<_> = modules.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert!(modules.iter().all(|m| m.source == ModuleCollection::Module));
    }

    #[tokio::test]
    async fn get_all_merges_spellings_without_duplicates() {
        let fx = fixture();
        fx.course("b_course", "B").await;
        fx.course("a_course", "A").await;
        fx.module("b_course", ModuleCollection::Modules, "b2", 2).await;
        fx.module("b_course", ModuleCollection::Modules, "b1", 1).await;
        fx.module("a_course", ModuleCollection::Module, "a1", 1).await;
        // Same module under both spellings counts once
        fx.module("a_course", ModuleCollection::Modules, "a1", 1).await;
        fx.module("a_course", ModuleCollection::Module, "a0", 0).await;

        let modules = fx.services.modules.get_all().await.unwrap();
        let keys: Vec<_> = modules.iter().map(|m| (m.course_id.as_str(), m.id.as_str())).collect();
        assert_eq!(
            keys,
            vec![("a_course", "a0"), ("a_course", "a1"), ("b_course", "b1"), ("b_course", "b2")]
        );
        assert_eq!(modules[1].source, ModuleCollection::Modules);
    }

    #[tokio::test]
    async fn update_targets_resolved_spelling() {
        let fx = fixture();
        fx.course("c1", "Rust").await;
        fx.module("c1", ModuleCollection::Module, "m1", 1).await;

        let patch = ModulePatch { is_unlocked: Some(true), ..Default::default() };
        let module = fx.services.modules.update("c1", "m1", patch).await.unwrap();
        assert!(module.is_unlocked);
        assert_eq!(module.source, ModuleCollection::Module);

        let err = fx.services.modules.update("c1", "ghost", ModulePatch::default()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() {
        let fx = fixture();
        fx.course("c1", "Rust").await;
        fx.module("c1", ModuleCollection::Modules, "m1", 1).await;
        let lessons = CollectionPath::nested_lessons("c1", ModuleCollection::Modules, "m1");
        fx.put(&lessons, "l1", json!({"title": "One"})).await;
        fx.put(&lessons, "l2", json!({"title": "Two"})).await;

        assert_eq!(fx.services.modules.delete("c1", "m1").await.unwrap(), 2);
        let err = fx.services.modules.delete("c1", "m1").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(fx.store.document_count(), 1);
    }

    #[tokio::test]
    async fn delete_removes_both_spellings_at_once() {
        let fx = fixture();
        fx.course("c1", "Rust").await;
        fx.module("c1", ModuleCollection::Modules, "m1", 1).await;
        fx.module("c1", ModuleCollection::Module, "m1", 1).await;
        fx.put(&CollectionPath::nested_lessons("c1", ModuleCollection::Modules, "m1"), "l1", json!({})).await;
        fx.put(&CollectionPath::nested_lessons("c1", ModuleCollection::Module, "m1"), "l2", json!({})).await;
        fx.put(&CollectionPath::nested_lessons("c1", ModuleCollection::Module, "m1"), "l3", json!({})).await;

        let modules = &fx.services.modules;
        assert_eq!(modules.delete("c1", "m1").await.unwrap(), 3);
        assert!(modules.get_all_for_course("c1").await.unwrap().is_empty());
        assert!(modules.delete("c1", "m1").await.unwrap_err().is_not_found());
        assert_eq!(fx.store.document_count(), 1);

        let deletes: Vec<_> = fx
            .sink
            .events()
            .into_iter()
            .filter_map(|event| match event {
                ServiceEvent::Deleted { entity: "module", cascaded, .. } => Some(cascaded),
                _ => None,
            })
            .collect();
        assert_eq!(deletes, vec![3]);
    }

    #[tokio::test]
    async fn failed_batch_leaves_module_and_lessons_in_place() {
        let fx = fixture();
        fx.course("c1", "Rust").await;
        fx.module("c1", ModuleCollection::Modules, "m1", 1).await;
        let lessons = CollectionPath::nested_lessons("c1", ModuleCollection::Modules, "m1");
        for id in ["l1", "l2", "l3"] {
            fx.put(&lessons, id, json!({"title": id})).await;
        }
        fx.store.inject_fault(Fault::new(FaultOp::Batch, lessons.as_str()));

        let err = fx.services.modules.delete("c1", "m1").await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
        assert_eq!(fx.store.document_count(), 5);
        assert!(fx.services.modules.get_by_id("c1", "m1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn recount_sets_advisory_total() {
        let fx = fixture();
        fx.course("c1", "Rust").await;
        fx.module("c1", ModuleCollection::Modules, "m1", 1).await;
        fx.put(
            &CollectionPath::nested_lessons("c1", ModuleCollection::Modules, "m1"),
            "l1",
            json!({"title": "Nested"}),
        )
        .await;
        let flat = CollectionPath::root(LESSONS);
        fx.put(&flat, "l2", json!({"moduleId": "m1"})).await;
        fx.put(&flat, "l3", json!({"moduleId": "m1", "courseId": "other"})).await;

        let module = fx.services.modules.recount_lessons("c1", "m1").await.unwrap();
        assert_eq!(module.total_lessons, 2);
    }
}
