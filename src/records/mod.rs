//! Normalized records
//!
//! Services never hand raw documents to callers. Each record type reads a
//! stored [`Document`] leniently, filling defaults for missing fields, and
//! serializes with the camelCase names the stored data uses.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::types::{Fields, LessonSource, ModuleCollection, Timestamp};
use crate::storage::Document;

/// Lenient field readers
pub mod normalize;

use normalize::{bool_field, int_field, opt_str_field, str_field, string_list, timestamp_field};

/// A learner account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Document id
    pub id: String,
    /// Email, unique by pre-check at creation
    pub email: String,
    /// Display name
    pub name: String,
    /// Course ids in enrollment order
    pub enrolled_courses: Vec<String>,
    /// Creation time
    pub created_at: Option<Timestamp>,
    /// Last update time
    pub updated_at: Option<Timestamp>,
}

impl User {
    /// Normalize a stored user document
    pub fn from_document(doc: &Document) -> Self {
        let f = &doc.fields;
        Self {
            id: doc.id.clone(),
            email: str_field(f, "email"),
            name: str_field(f, "name"),
            enrolled_courses: string_list(f, "enrolledCourses"),
            created_at: timestamp_field(f, "createdAt"),
            updated_at: timestamp_field(f, "updatedAt"),
        }
    }
}

/// A course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// Document id
    pub id: String,
    /// Name, used as a secondary lookup key
    pub name: String,
    /// Description
    pub description: String,
    /// User ids in enrollment order
    pub enrolled_users: Vec<String>,
    /// Creation time
    pub created_at: Option<Timestamp>,
    /// Last update time
    pub updated_at: Option<Timestamp>,
}

impl Course {
    /// Normalize a stored course document
    pub fn from_document(doc: &Document) -> Self {
        let f = &doc.fields;
        Self {
            id: doc.id.clone(),
            name: str_field(f, "name"),
            description: str_field(f, "description"),
            enrolled_users: string_list(f, "enrolledUsers"),
            created_at: timestamp_field(f, "createdAt"),
            updated_at: timestamp_field(f, "updatedAt"),
        }
    }
}

/// A module of a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    /// Module id, unique within its course
    pub id: String,
    /// Owning course
    pub course_id: String,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Display position; ties keep their stable order
    pub order: i64,
    /// Advisory lesson count, not kept in sync with the lessons
    pub total_lessons: i64,
    /// Whether learners can open it
    pub is_unlocked: bool,
    /// Sub-collection spelling the module was read from
    pub source: ModuleCollection,
    /// Creation time
    pub created_at: Option<Timestamp>,
    /// Last update time
    pub updated_at: Option<Timestamp>,
}

impl Module {
    /// Normalize a stored module document found under `source`
    pub fn from_document(doc: &Document, course_id: &str, source: ModuleCollection) -> Self {
        let f = &doc.fields;
        Self {
            id: doc.id.clone(),
            course_id: course_id.to_string(),
            title: str_field(f, "title"),
            description: str_field(f, "description"),
            order: int_field(f, "order"),
            total_lessons: int_field(f, "totalLessons"),
            is_unlocked: bool_field(f, "isUnlocked"),
            source,
            created_at: timestamp_field(f, "createdAt"),
            updated_at: timestamp_field(f, "updatedAt"),
        }
    }
}

const LESSON_KEYS: [&str; 10] = [
    "id",
    "moduleId",
    "courseId",
    "title",
    "description",
    "content",
    "order",
    "source",
    "createdAt",
    "updatedAt",
];

/// A lesson, tagged with where it was found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Document id
    pub id: String,
    /// Owning module
    pub module_id: String,
    /// Owning course, when known
    pub course_id: Option<String>,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Body
    pub content: String,
    /// Display position; missing is 0
    pub order: i64,
    /// Physical location the lesson was read from
    pub source: LessonSource,
    /// Creation time
    pub created_at: Option<Timestamp>,
    /// Last update time
    pub updated_at: Option<Timestamp>,
    /// Fields this service does not interpret, passed through untouched
    #[serde(flatten)]
    pub extra: Fields,
}

impl Lesson {
    /// Normalize a stored lesson document.
    ///
    /// Nested lessons often lack `moduleId`/`courseId`; the ids of the path
    /// they were read from fill the gap.
    pub fn from_document(doc: &Document, source: LessonSource, module_id: &str, course_id: Option<&str>) -> Self {
        let f = &doc.fields;
        let extra = f
            .iter()
            .filter(|(key, _)| !LESSON_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            id: doc.id.clone(),
            module_id: opt_str_field(f, "moduleId").unwrap_or_else(|| module_id.to_string()),
            course_id: opt_str_field(f, "courseId").or_else(|| course_id.map(str::to_string)),
            title: str_field(f, "title"),
            description: str_field(f, "description"),
            content: str_field(f, "content"),
            order: int_field(f, "order"),
            source,
            created_at: timestamp_field(f, "createdAt"),
            updated_at: timestamp_field(f, "updatedAt"),
            extra,
        }
    }
}

/// Enrollment state; unknown values are kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnrollmentStatus {
    /// Learner is working through the course
    Active,
    /// Learner finished the course
    Completed,
    /// Any other stored value
    Other(String),
}

impl EnrollmentStatus {
    /// Stored text
    pub fn as_str(&self) -> &str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Other(s) => s,
        }
    }
}

impl From<String> for EnrollmentStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "active" => EnrollmentStatus::Active,
            "completed" => EnrollmentStatus::Completed,
            _ => EnrollmentStatus::Other(value),
        }
    }
}

impl From<EnrollmentStatus> for String {
    fn from(status: EnrollmentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit link between one user and one course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    /// Document id
    pub id: String,
    /// Enrolled user
    pub user_id: String,
    /// Course enrolled in
    pub course_id: String,
    /// Current state
    pub status: EnrollmentStatus,
    /// Advisory completion percentage, 0-100
    pub progress: i64,
    /// When the enrollment started
    pub enrolled_at: Option<Timestamp>,
    /// Last time the learner opened the course
    pub last_accessed_at: Option<Timestamp>,
}

impl Enrollment {
    /// Normalize a stored enrollment document
    pub fn from_document(doc: &Document) -> Self {
        let f = &doc.fields;
        let status = opt_str_field(f, "status").unwrap_or_else(|| "active".to_string());
        Self {
            id: doc.id.clone(),
            user_id: str_field(f, "userId"),
            course_id: str_field(f, "courseId"),
            status: EnrollmentStatus::from(status),
            progress: int_field(f, "progress").clamp(0, 100),
            enrolled_at: timestamp_field(f, "enrolledAt"),
            last_accessed_at: timestamp_field(f, "lastAccessedAt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: serde_json::Value) -> Document {
        Document::new(id, value.as_object().cloned().unwrap())
    }

    #[test]
    fn module_defaults_fill_missing_fields() {
        let module = Module::from_document(&doc("m1", json!({"title": "Intro"})), "c1", ModuleCollection::Module);
        assert_eq!(module.order, 0);
        assert_eq!(module.total_lessons, 0);
        assert!(!module.is_unlocked);
        assert_eq!(module.source, ModuleCollection::Module);
        assert_eq!(module.course_id, "c1");
    }

    #[test]
    fn nested_lesson_takes_ids_from_path_and_keeps_extras() {
        let lesson = Lesson::from_document(
            &doc("l1", json!({"title": "Loops", "videoUrl": "https://v/1"})),
            LessonSource::AltNested,
            "py_intro",
            Some("py_course"),
        );
        assert_eq!(lesson.module_id, "py_intro");
        assert_eq!(lesson.course_id.as_deref(), Some("py_course"));
        assert_eq!(lesson.extra["videoUrl"], "https://v/1");

        let value = serde_json::to_value(&lesson).unwrap();
        assert_eq!(value["source"], "alt-nested");
        assert_eq!(value["videoUrl"], "https://v/1");
        assert_eq!(value["moduleId"], "py_intro");
    }

    #[test]
    fn enrollment_status_keeps_unknown_values() {
        let enrollment = Enrollment::from_document(&doc(
            "e1",
            json!({"userId": "u1", "courseId": "c1", "status": "paused", "progress": 140}),
        ));
        assert_eq!(enrollment.status, EnrollmentStatus::Other("paused".into()));
        assert_eq!(enrollment.progress, 100);
        assert_eq!(serde_json::to_value(&enrollment.status).unwrap(), "paused");
    }

    #[test]
    fn user_lists_keep_insertion_order() {
        let user = User::from_document(&doc("u1", json!({"email": "a@x.io", "enrolledCourses": ["c2", "c1"]})));
        assert_eq!(user.enrolled_courses, vec!["c2", "c1"]);
    }
}
