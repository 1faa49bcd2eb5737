//! Course service

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::observability::{ServiceEvent, SharedSink};
use crate::core::types::{Fields, COURSES, USERS};
use crate::core::{Error, Result};
use crate::records::{Course, User};
use crate::services::{find_one, stamped_patch, timestamp_now};
use crate::storage::{CollectionPath, SharedStore};

/// Payload for creating a course
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    /// Name; must be unique
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
}

/// Partial update of a course
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePatch {
    /// New name; re-checked for uniqueness
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// CRUD over the `courses` collection. Names are looked up like keys but
/// only guarded by a pre-check.
#[derive(Clone)]
pub struct CourseService {
    store: SharedStore,
    sink: SharedSink,
}

impl CourseService {
    /// Create the service
    pub fn new(store: SharedStore, sink: SharedSink) -> Self {
        Self { store, sink }
    }

    fn collection() -> CollectionPath {
        CollectionPath::root(COURSES)
    }

    /// Create a course
    pub async fn create(&self, data: NewCourse) -> Result<Course> {
        let name = data.name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("course name is required"));
        }
        if self.get_by_name(name).await?.is_some() {
            return Err(Error::conflict(format!("course {} already exists", name)));
        }

        let now = timestamp_now();
        let mut fields = Fields::new();
        fields.insert("name".to_string(), Value::String(name.to_string()));
        fields.insert("description".to_string(), Value::String(data.description));
        fields.insert("enrolledUsers".to_string(), json!([]));
        fields.insert("createdAt".to_string(), now.clone());
        fields.insert("updatedAt".to_string(), now);

        let id = self.store.add_document(&Self::collection(), fields).await?;
        self.sink.emit(ServiceEvent::Created { entity: "course", id: id.clone() });
        self.require(&id).await
    }

    /// Course by id
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Course>> {
        let doc = self.store.get_document(&Self::collection(), id).await?;
        Ok(doc.as_ref().map(Course::from_document))
    }

    /// Course by name
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Course>> {
        let doc = find_one(&self.store, &Self::collection(), "name", name).await?;
        Ok(doc.as_ref().map(Course::from_document))
    }

    /// Every course, in id order
    pub async fn get_all(&self) -> Result<Vec<Course>> {
        let docs = self.store.list_documents(&Self::collection()).await?;
        Ok(docs.iter().map(Course::from_document).collect())
    }

    /// Patch a course
    pub async fn update(&self, id: &str, mut patch: CoursePatch) -> Result<Course> {
        let existing = self.require(id).await?;
        if let Some(name) = patch.name.as_mut() {
            *name = name.trim().to_string();
        }

        if let Some(name) = patch.name.as_deref() {
            if name.is_empty() {
                return Err(Error::invalid_input("course name must not be empty"));
            }
            if name != existing.name {
                if let Some(other) = self.get_by_name(name).await? {
                    if other.id != id {
                        return Err(Error::conflict(format!("course {} already exists", name)));
                    }
                }
            }
        }

        self.store
            .update_document(&Self::collection(), id, stamped_patch(&patch)?)
            .await?;
        self.sink.emit(ServiceEvent::Updated { entity: "course", id: id.to_string() });
        self.require(id).await
    }

    /// Delete a course document. Its module sub-collections, user lists and
    /// enrollment records are not touched.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.require(id).await?;
        self.store.delete_document(&Self::collection(), id).await?;
        self.sink.emit(ServiceEvent::Deleted { entity: "course", id: id.to_string(), cascaded: 0 });
        Ok(())
    }

    /// Users listed on the course, in enrollment order
    pub async fn enrolled_users(&self, course_id: &str) -> Result<Vec<User>> {
        let course = self.require(course_id).await?;
        let users = CollectionPath::root(USERS);

        let mut result = Vec::with_capacity(course.enrolled_users.len());
        for user_id in &course.enrolled_users {
            if let Some(doc) = self.store.get_document(&users, user_id).await? {
                result.push(User::from_document(&doc));
            }
        }
        Ok(result)
    }

    async fn require(&self, id: &str) -> Result<Course> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("course {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::fixture;

    #[tokio::test]
    async fn names_are_unique_by_precheck() {
        let fx = fixture();
        let courses = &fx.services.courses;
        let rust = courses
            .create(NewCourse { name: "Rust".into(), description: "Systems".into() })
            .await
            .unwrap();
        assert_eq!(courses.get_by_name("Rust").await.unwrap().unwrap().id, rust.id);

        let err = courses
            .create(NewCourse { name: "Rust".into(), description: String::new() })
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn blank_name_is_invalid() {
        let fx = fixture();
        let err = fx
            .services
            .courses
            .create(NewCourse { name: "  ".into(), description: String::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn update_keeps_unpatched_fields() {
        let fx = fixture();
        let courses = &fx.services.courses;
        let course = courses
            .create(NewCourse { name: "Rust".into(), description: "Systems".into() })
            .await
            .unwrap();

        let patch = CoursePatch { name: None, description: Some("Ownership".into()) };
        let updated = courses.update(&course.id, patch).await.unwrap();
        assert_eq!(updated.name, "Rust");
        assert_eq!(updated.description, "Ownership");
        assert!(updated.updated_at >= course.updated_at);
    }

    #[tokio::test]
    async fn renamed_course_is_trimmed_before_the_uniqueness_check() {
        let fx = fixture();
        let courses = &fx.services.courses;
        courses.create(NewCourse { name: "Rust".into(), description: String::new() }).await.unwrap();
        let go = courses.create(NewCourse { name: "Go".into(), description: String::new() }).await.unwrap();

        let patch = CoursePatch { name: Some("Rust ".into()), description: None };
        assert!(courses.update(&go.id, patch).await.unwrap_err().is_conflict());

        let patch = CoursePatch { name: Some(" Zig ".into()), description: None };
        assert_eq!(courses.update(&go.id, patch).await.unwrap().name, "Zig");
    }

    #[tokio::test]
    async fn missing_course_is_not_found_on_write() {
        let fx = fixture();
        let err = fx.services.courses.update("ghost", CoursePatch::default()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(fx.services.courses.enrolled_users("ghost").await.unwrap_err().is_not_found());
    }
}
