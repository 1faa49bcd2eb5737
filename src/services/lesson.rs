//! Lesson service
//!
//! Lessons live in the flat `lessons` collection or nested under their
//! module in either spelling. Every mutation first locates the lesson and
//! then writes to the location recorded in its `source` tag; writing to any
//! other collection would silently touch nothing.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::core::observability::{ServiceEvent, SharedSink};
use crate::core::types::{Fields, LessonSource, ModuleCollection, StorageMode, COURSES, LESSONS};
use crate::core::{Error, Result};
use crate::records::normalize::contains_term;
use crate::records::Lesson;
use crate::resolver::{LessonLocation, ModuleLocation, StorageLayoutResolver};
use crate::services::{stamped_patch, timestamp_now};
use crate::storage::{CollectionPath, Document, SharedStore};

/// Payload for creating a lesson
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLesson {
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Body
    #[serde(default)]
    pub content: String,
    /// Display position
    #[serde(default)]
    pub order: i64,
    /// Owning module, unless given separately
    #[serde(default)]
    pub module_id: Option<String>,
    /// Owning course, unless given separately
    #[serde(default)]
    pub course_id: Option<String>,
    /// Any other fields, stored as given
    #[serde(flatten)]
    pub extra: Fields,
}

/// Partial update of a lesson
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPatch {
    /// New title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// New display position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Any other fields to merge
    #[serde(flatten)]
    pub extra: Fields,
}

/// Narrows the candidate set of a search
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonFilter {
    /// Only lessons of this module
    #[serde(default)]
    pub module_id: Option<String>,
    /// Only lessons of this course
    #[serde(default)]
    pub course_id: Option<String>,
}

/// Lesson operations across flat and nested layouts
#[derive(Clone)]
pub struct LessonService {
    store: SharedStore,
    sink: SharedSink,
    resolver: StorageLayoutResolver,
}

impl LessonService {
    /// Create the service
    pub fn new(store: SharedStore, sink: SharedSink, resolver: StorageLayoutResolver) -> Self {
        Self { store, sink, resolver }
    }

    /// Lessons of a module, sorted by order.
    ///
    /// Without `course_id` nested layouts are only found through the course
    /// id guess, which may be wrong; pass it whenever it is known.
    pub async fn get_by_module(&self, module_id: &str, course_id: Option<&str>) -> Result<Vec<Lesson>> {
        let location = self.resolver.resolve_lesson_location(module_id, course_id).await?;
        self.read_location(&location, module_id).await
    }

    /// Lessons of a module checked to exist in the course under either
    /// spelling; empty when it does not
    pub async fn get_by_course_and_module(&self, course_id: &str, module_id: &str) -> Result<Vec<Lesson>> {
        if let ModuleLocation::NotFound = self.resolver.resolve_module_location(course_id, module_id).await? {
            return Ok(Vec::new());
        }
        self.get_by_module(module_id, Some(course_id)).await
    }

    /// Every lesson: the flat collection plus every nested lesson under
    /// every course and module of both spellings, deduplicated by
    /// (id, module id).
    ///
    /// Reads one collection per module; meant for admin and export paths.
    pub async fn get_all(&self) -> Result<Vec<Lesson>> {
        let mut seen = HashSet::new();
        let mut lessons = Vec::new();

        let flat = self.store.list_documents(&CollectionPath::root(LESSONS)).await?;
        for doc in &flat {
            let lesson = Lesson::from_document(doc, LessonSource::TopLevel, "", None);
            if seen.insert((lesson.id.clone(), lesson.module_id.clone())) {
                lessons.push(lesson);
            }
        }

        let courses = self.store.list_documents(&CollectionPath::root(COURSES)).await?;
        for course in &courses {
            for collection in ModuleCollection::PROBE_ORDER {
                let modules = self
                    .store
                    .list_documents(&CollectionPath::modules(&course.id, collection))
                    .await?;
                for module in &modules {
                    let path = CollectionPath::nested_lessons(&course.id, collection, &module.id);
                    for doc in self.store.list_documents(&path).await? {
                        let lesson = Lesson::from_document(
                            &doc,
                            LessonSource::nested_in(collection),
                            &module.id,
                            Some(&course.id),
                        );
                        if seen.insert((lesson.id.clone(), lesson.module_id.clone())) {
                            lessons.push(lesson);
                        }
                    }
                }
            }
        }

        lessons.sort_by(|a, b| a.module_id.cmp(&b.module_id).then(a.order.cmp(&b.order)));
        Ok(lessons)
    }

    /// Lesson by id. The flat collection is tried first; nested layouts
    /// only when both `module_id` and `course_id` are given.
    pub async fn get_by_id(
        &self,
        lesson_id: &str,
        module_id: Option<&str>,
        course_id: Option<&str>,
    ) -> Result<Option<Lesson>> {
        if let Some(doc) = self.store.get_document(&CollectionPath::root(LESSONS), lesson_id).await? {
            return Ok(Some(Lesson::from_document(&doc, LessonSource::TopLevel, "", None)));
        }

        let (Some(module_id), Some(course_id)) = (module_id, course_id) else {
            return Ok(None);
        };
        let ModuleLocation::Found(collection) = self.resolver.resolve_module_location(course_id, module_id).await? else {
            return Ok(None);
        };

        let path = CollectionPath::nested_lessons(course_id, collection, module_id);
        let doc = self.store.get_document(&path, lesson_id).await?;
        Ok(doc.map(|doc| Lesson::from_document(&doc, LessonSource::nested_in(collection), module_id, Some(course_id))))
    }

    /// Create a lesson.
    ///
    /// `TopLevel` writes to the flat collection and needs a module id.
    /// `Nested` needs both ids and an existing module, and writes under
    /// whichever spelling the module uses.
    pub async fn create(
        &self,
        data: NewLesson,
        mode: StorageMode,
        course_id: Option<&str>,
        module_id: Option<&str>,
    ) -> Result<Lesson> {
        if data.title.trim().is_empty() {
            return Err(Error::invalid_input("lesson title is required"));
        }
        let module_id = module_id
            .map(str::to_string)
            .or_else(|| data.module_id.clone())
            .filter(|id| !id.is_empty());
        let course_id = course_id
            .map(str::to_string)
            .or_else(|| data.course_id.clone())
            .filter(|id| !id.is_empty());

        let (path, source, module_id) = match mode {
            StorageMode::TopLevel => {
                let module_id = module_id.ok_or_else(|| Error::invalid_input("moduleId is required"))?;
                (CollectionPath::root(LESSONS), LessonSource::TopLevel, module_id)
            }
            StorageMode::Nested => {
                let (Some(course_id), Some(module_id)) = (course_id.as_deref(), module_id.clone()) else {
                    return Err(Error::invalid_input("nested lessons need both courseId and moduleId"));
                };
                let collection = self
                    .resolver
                    .resolve_module_location(course_id, &module_id)
                    .await?
                    .collection()
                    .ok_or_else(|| Error::not_found(format!("module {}/{}", course_id, module_id)))?;
                (
                    CollectionPath::nested_lessons(course_id, collection, &module_id),
                    LessonSource::nested_in(collection),
                    module_id,
                )
            }
        };

        let now = timestamp_now();
        let mut fields = data.extra;
        fields.insert("moduleId".to_string(), Value::String(module_id.clone()));
        if let Some(course_id) = &course_id {
            fields.insert("courseId".to_string(), Value::String(course_id.clone()));
        }
        fields.insert("title".to_string(), Value::String(data.title.trim().to_string()));
        fields.insert("description".to_string(), Value::String(data.description));
        fields.insert("content".to_string(), Value::String(data.content));
        fields.insert("order".to_string(), json!(data.order));
        fields.insert("createdAt".to_string(), now.clone());
        fields.insert("updatedAt".to_string(), now);

        let id = self.store.add_document(&path, fields.clone()).await?;
        self.sink.emit(ServiceEvent::Created { entity: "lesson", id: id.clone() });
        Ok(Lesson::from_document(&Document::new(id, fields), source, &module_id, course_id.as_deref()))
    }

    /// Patch a lesson at the location it was found
    pub async fn update(
        &self,
        lesson_id: &str,
        patch: LessonPatch,
        course_id: Option<&str>,
        module_id: Option<&str>,
    ) -> Result<Lesson> {
        let lesson = self.require(lesson_id, module_id, course_id).await?;
        let path = Self::location_of(&lesson)?;

        self.store
            .update_document(&path, lesson_id, stamped_patch(&patch)?)
            .await?;
        self.sink.emit(ServiceEvent::Updated { entity: "lesson", id: lesson_id.to_string() });

        let fallback_module = (!lesson.module_id.is_empty()).then_some(lesson.module_id.as_str());
        self.require(lesson_id, module_id.or(fallback_module), course_id.or(lesson.course_id.as_deref()))
            .await
    }

    /// Delete a lesson at the location it was found
    pub async fn delete(&self, lesson_id: &str, course_id: Option<&str>, module_id: Option<&str>) -> Result<()> {
        let lesson = self.require(lesson_id, module_id, course_id).await?;
        let path = Self::location_of(&lesson)?;

        self.store.delete_document(&path, lesson_id).await?;
        self.sink.emit(ServiceEvent::Deleted { entity: "lesson", id: lesson_id.to_string(), cascaded: 0 });
        Ok(())
    }

    /// Case-insensitive substring search over title, content and
    /// description of the candidate set picked by `filter`. A linear scan.
    pub async fn search(&self, term: &str, filter: &LessonFilter) -> Result<Vec<Lesson>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(Error::invalid_input("search term must not be empty"));
        }

        let candidates = match (filter.module_id.as_deref(), filter.course_id.as_deref()) {
            (Some(module_id), Some(course_id)) => self.get_by_course_and_module(course_id, module_id).await?,
            (Some(module_id), None) => self.get_by_module(module_id, None).await?,
            (None, Some(course_id)) => self
                .get_all()
                .await?
                .into_iter()
                .filter(|lesson| lesson.course_id.as_deref() == Some(course_id))
                .collect(),
            (None, None) => self.get_all().await?,
        };

        Ok(candidates
            .into_iter()
            .filter(|lesson| contains_term(&[lesson.title.as_str(), lesson.content.as_str(), lesson.description.as_str()], term))
            .collect())
    }

    async fn read_location(&self, location: &LessonLocation, module_id: &str) -> Result<Vec<Lesson>> {
        let (Some(path), Some(source)) = (location.path(module_id), location.source()) else {
            return Ok(Vec::new());
        };

        let docs = match location {
            LessonLocation::TopLevel => {
                self.store
                    .query_equals(&path, "moduleId", &Value::String(module_id.to_string()))
                    .await?
            }
            _ => self.store.list_documents(&path).await?,
        };

        let mut lessons: Vec<Lesson> = docs
            .iter()
            .map(|doc| Lesson::from_document(doc, source, module_id, location.course_id()))
            .collect();
        lessons.sort_by_key(|lesson| lesson.order);
        Ok(lessons)
    }

    fn location_of(lesson: &Lesson) -> Result<CollectionPath> {
        match lesson.source.module_collection() {
            None => Ok(CollectionPath::root(LESSONS)),
            Some(collection) => {
                let course_id = lesson
                    .course_id
                    .as_deref()
                    .ok_or_else(|| Error::internal(format!("nested lesson {} has no course id", lesson.id)))?;
                Ok(CollectionPath::nested_lessons(course_id, collection, &lesson.module_id))
            }
        }
    }

    async fn require(&self, lesson_id: &str, module_id: Option<&str>, course_id: Option<&str>) -> Result<Lesson> {
        self.get_by_id(lesson_id, module_id, course_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("lesson {}", lesson_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{fields, fixture};
    use crate::storage::DocumentStore;

    fn new_lesson(title: &str, order: i64) -> NewLesson {
        NewLesson { title: title.to_string(), order, ..Default::default() }
    }

    #[tokio::test]
    async fn nested_create_round_trips_with_module_spelling() {
        let fx = fixture();
        fx.course("py_course", "Python").await;
        fx.module("py_course", ModuleCollection::Module, "py_intro", 1).await;

        let created = fx
            .services
            .lessons
            .create(new_lesson("Variables", 1), StorageMode::Nested, Some("py_course"), Some("py_intro"))
            .await
            .unwrap();
        assert_eq!(created.source, LessonSource::AltNested);

        let lessons = fx.services.lessons.get_by_module("py_intro", None).await.unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].id, created.id);
        assert_eq!(lessons[0].source, LessonSource::AltNested);
    }

    #[tokio::test]
    async fn nested_create_needs_ids_and_module() {
        let fx = fixture();
        let lessons = &fx.services.lessons;

        let err = lessons
            .create(new_lesson("Orphan", 0), StorageMode::Nested, Some("c1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = lessons
            .create(new_lesson("Orphan", 0), StorageMode::Nested, Some("c1"), Some("ghost"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn lessons_sort_by_order_with_missing_as_zero() {
        let fx = fixture();
        let flat = CollectionPath::root(LESSONS);
        fx.put(&flat, "a", json!({"moduleId": "m1", "title": "Third", "order": 2})).await;
        fx.put(&flat, "b", json!({"moduleId": "m1", "title": "First"})).await;
        fx.put(&flat, "c", json!({"moduleId": "m1", "title": "Second", "order": 1})).await;

        let titles: Vec<_> = fx
            .services
            .lessons
            .get_by_module("m1", None)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.title)
            .collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[tokio::test]
    async fn update_and_delete_target_nested_location() {
        let fx = fixture();
        fx.course("c1", "Rust").await;
        fx.module("c1", ModuleCollection::Modules, "m1", 1).await;
        let lessons = &fx.services.lessons;
        let lesson = lessons
            .create(new_lesson("Borrowing", 1), StorageMode::Nested, Some("c1"), Some("m1"))
            .await
            .unwrap();

        // Without hints the nested lesson cannot be found
        let err = lessons.update(&lesson.id, LessonPatch::default(), None, None).await.unwrap_err();
        assert!(err.is_not_found());

        let patch = LessonPatch { content: Some("&T and &mut T".into()), ..Default::default() };
        let updated = lessons.update(&lesson.id, patch, Some("c1"), Some("m1")).await.unwrap();
        assert_eq!(updated.content, "&T and &mut T");
        assert_eq!(updated.source, LessonSource::Nested);

        lessons.delete(&lesson.id, Some("c1"), Some("m1")).await.unwrap();
        assert!(lessons.get_by_id(&lesson.id, Some("m1"), Some("c1")).await.unwrap().is_none());
        let err = lessons.delete(&lesson.id, Some("c1"), Some("m1")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn search_filters_by_module_and_term() {
        let fx = fixture();
        let flat = CollectionPath::root(LESSONS);
        fx.put(&flat, "l1", json!({"moduleId": "M1", "title": "Functions and Methods"})).await;
        fx.put(&flat, "l2", json!({"moduleId": "M1", "title": "Loops"})).await;
        fx.put(&flat, "l3", json!({"moduleId": "M2", "title": "More functions"})).await;

        let filter = LessonFilter { module_id: Some("M1".into()), course_id: None };
        let hits = fx.services.lessons.search("functions", &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "l1");
    }

    #[tokio::test]
    async fn get_all_unions_flat_and_nested() {
        let fx = fixture();
        fx.course("c1", "Rust").await;
        fx.module("c1", ModuleCollection::Modules, "m1", 1).await;
        fx.module("c1", ModuleCollection::Module, "m2", 2).await;
        fx.put(&CollectionPath::root(LESSONS), "l1", json!({"moduleId": "m1"})).await;
        fx.put(&CollectionPath::nested_lessons("c1", ModuleCollection::Modules, "m1"), "l2", json!({})).await;
        fx.put(&CollectionPath::nested_lessons("c1", ModuleCollection::Module, "m2"), "l3", json!({})).await;

        let lessons = fx.services.lessons.get_all().await.unwrap();
        let sources: Vec<_> = lessons.iter().map(|l| (l.id.as_str(), l.source)).collect();
        assert_eq!(
            sources,
            vec![
                ("l1", LessonSource::TopLevel),
                ("l2", LessonSource::Nested),
                ("l3", LessonSource::AltNested),
            ]
        );
    }

    #[tokio::test]
    async fn listed_nested_lessons_are_reachable_for_writes() {
        let fx = fixture();
        fx.course("c1", "Rust").await;
        let lessons_path = CollectionPath::nested_lessons("c1", ModuleCollection::Modules, "m1");
        fx.put(&lessons_path, "l1", json!({"title": "Orphan"})).await;

        // No module document: every read path agrees the lesson is absent
        let lessons = &fx.services.lessons;
        assert!(lessons.get_by_module("m1", Some("c1")).await.unwrap().is_empty());
        assert!(lessons.get_by_id("l1", Some("m1"), Some("c1")).await.unwrap().is_none());
        assert!(lessons.get_all().await.unwrap().is_empty());

        fx.module("c1", ModuleCollection::Modules, "m1", 1).await;
        let listed = lessons.get_by_module("m1", Some("c1")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].source, LessonSource::Nested);
        assert_eq!(lessons.get_all().await.unwrap().len(), 1);

        let patch = LessonPatch { title: Some("Adopted".into()), ..Default::default() };
        let updated = lessons.update("l1", patch, Some("c1"), Some("m1")).await.unwrap();
        assert_eq!(updated.title, "Adopted");
        lessons.delete("l1", Some("c1"), Some("m1")).await.unwrap();
        assert!(fx.store.get_document(&lessons_path, "l1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn extra_fields_pass_through_create() {
        let fx = fixture();
        let mut data = new_lesson("Intro", 0);
        data.extra = fields(json!({"videoUrl": "https://v/1"}));
        let lesson = fx
            .services
            .lessons
            .create(data, StorageMode::TopLevel, None, Some("m1"))
            .await
            .unwrap();
        assert_eq!(lesson.extra["videoUrl"], "https://v/1");
        assert_eq!(lesson.source, LessonSource::TopLevel);
    }
}
