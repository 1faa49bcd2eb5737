//! Enrollment service
//!
//! Enrollment has two representations: the `enrolledCourses` /
//! `enrolledUsers` list pair on users and courses, and explicit records in
//! the `enrollments` collection. `enroll_user_in_course` and
//! `unenroll_user_from_course` update both inside one transaction. The
//! explicit record operations only touch the records, so the two can drift
//! apart; dashboard counts read the records.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::observability::{ServiceEvent, SharedSink};
use crate::core::types::{Fields, COURSES, ENROLLMENTS, USERS};
use crate::core::{Error, Result};
use crate::records::normalize::{str_field, string_list};
use crate::records::{Enrollment, EnrollmentStatus};
use crate::services::timestamp_now;
use crate::storage::{CollectionPath, Document, SharedStore, Transaction};

/// Payload for creating an explicit enrollment record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEnrollment {
    /// Enrolled user
    pub user_id: String,
    /// Course enrolled in
    pub course_id: String,
    /// Initial state; active when absent
    #[serde(default)]
    pub status: Option<EnrollmentStatus>,
}

/// Enrollment transactions and explicit record CRUD
#[derive(Clone)]
pub struct EnrollmentService {
    store: SharedStore,
    sink: SharedSink,
}

fn users() -> CollectionPath {
    CollectionPath::root(USERS)
}

fn courses() -> CollectionPath {
    CollectionPath::root(COURSES)
}

fn enrollments() -> CollectionPath {
    CollectionPath::root(ENROLLMENTS)
}

fn find_in_tx(tx: &mut dyn Transaction, collection: &CollectionPath, field: &str, value: &str, what: &str) -> Result<Document> {
    tx.query_equals(collection, field, &Value::String(value.to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found(format!("{} {}", what, value)))
}

fn record_fields(user_id: &str, course_id: &str, status: &EnrollmentStatus) -> Fields {
    let now = timestamp_now();
    let mut fields = Fields::new();
    fields.insert("userId".to_string(), Value::String(user_id.to_string()));
    fields.insert("courseId".to_string(), Value::String(course_id.to_string()));
    fields.insert("status".to_string(), Value::String(status.to_string()));
    fields.insert("progress".to_string(), json!(0));
    fields.insert("enrolledAt".to_string(), now.clone());
    fields.insert("lastAccessedAt".to_string(), now);
    fields
}

fn list_patch(key: &str, list: Vec<String>) -> Fields {
    let mut patch = Fields::new();
    patch.insert(key.to_string(), json!(list));
    patch.insert("updatedAt".to_string(), timestamp_now());
    patch
}

impl EnrollmentService {
    /// Create the service
    pub fn new(store: SharedStore, sink: SharedSink) -> Self {
        Self { store, sink }
    }

    /// Enroll the user with `email` in the course named `course_name`.
    ///
    /// Runs as one transaction: both lookups, the duplicate check on both
    /// lists, both list writes and the explicit record either all happen
    /// or none do. Concurrent calls for the same pair are serialized, so
    /// exactly one succeeds and the rest fail with Conflict.
    pub async fn enroll_user_in_course(&self, email: &str, course_name: &str) -> Result<Enrollment> {
        let mut enrolled: Option<Enrollment> = None;

        self.store
            .run_transaction(&mut |tx: &mut dyn Transaction| {
                let user = find_in_tx(tx, &users(), "email", email, "user with email")?;
                let course = find_in_tx(tx, &courses(), "name", course_name, "course named")?;

                let mut user_courses = string_list(&user.fields, "enrolledCourses");
                let mut course_users = string_list(&course.fields, "enrolledUsers");
                if user_courses.contains(&course.id) || course_users.contains(&user.id) {
                    return Err(Error::conflict(format!(
                        "user {} is already enrolled in {}",
                        email, course_name
                    )));
                }

                user_courses.push(course.id.clone());
                course_users.push(user.id.clone());
                tx.update(&users(), &user.id, list_patch("enrolledCourses", user_courses))?;
                tx.update(&courses(), &course.id, list_patch("enrolledUsers", course_users))?;

                // A record left behind by the explicit API is reactivated
                // instead of duplicated.
                let existing = tx
                    .query_equals(&enrollments(), "userId", &Value::String(user.id.clone()))?
                    .into_iter()
                    .find(|doc| str_field(&doc.fields, "courseId") == course.id);
                let record_id = existing
                    .map(|doc| doc.id)
                    .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
                let fields = record_fields(&user.id, &course.id, &EnrollmentStatus::Active);
                tx.set(&enrollments(), &record_id, fields.clone());

                enrolled = Some(Enrollment::from_document(&Document::new(record_id, fields)));
                Ok(())
            })
            .await?;

        let enrollment = enrolled.ok_or_else(|| Error::internal("enrollment transaction produced no record"))?;
        self.sink.emit(ServiceEvent::Enrolled {
            user_id: enrollment.user_id.clone(),
            course_id: enrollment.course_id.clone(),
        });
        Ok(enrollment)
    }

    /// Reverse of [`enroll_user_in_course`](Self::enroll_user_in_course):
    /// removes both list entries and the explicit record in one
    /// transaction. NotFound when the pair is not enrolled.
    pub async fn unenroll_user_from_course(&self, email: &str, course_name: &str) -> Result<()> {
        let mut pair: Option<(String, String)> = None;

        self.store
            .run_transaction(&mut |tx: &mut dyn Transaction| {
                let user = find_in_tx(tx, &users(), "email", email, "user with email")?;
                let course = find_in_tx(tx, &courses(), "name", course_name, "course named")?;

                let mut user_courses = string_list(&user.fields, "enrolledCourses");
                let mut course_users = string_list(&course.fields, "enrolledUsers");
                if !user_courses.contains(&course.id) && !course_users.contains(&user.id) {
                    return Err(Error::not_found(format!(
                        "enrollment of {} in {}",
                        email, course_name
                    )));
                }

                user_courses.retain(|id| id != &course.id);
                course_users.retain(|id| id != &user.id);
                tx.update(&users(), &user.id, list_patch("enrolledCourses", user_courses))?;
                tx.update(&courses(), &course.id, list_patch("enrolledUsers", course_users))?;

                let records = tx.query_equals(&enrollments(), "userId", &Value::String(user.id.clone()))?;
                for doc in records.iter().filter(|doc| str_field(&doc.fields, "courseId") == course.id) {
                    tx.delete(&enrollments(), &doc.id);
                }

                pair = Some((user.id, course.id));
                Ok(())
            })
            .await?;

        if let Some((user_id, course_id)) = pair {
            self.sink.emit(ServiceEvent::Unenrolled { user_id, course_id });
        }
        Ok(())
    }

    /// Create an explicit record. Both parties must exist and the pair must
    /// not already have a record. The list pair is not touched.
    pub async fn create(&self, data: NewEnrollment) -> Result<Enrollment> {
        if self.store.get_document(&users(), &data.user_id).await?.is_none() {
            return Err(Error::not_found(format!("user {}", data.user_id)));
        }
        if self.store.get_document(&courses(), &data.course_id).await?.is_none() {
            return Err(Error::not_found(format!("course {}", data.course_id)));
        }
        if self.find_pair(&data.user_id, &data.course_id).await?.is_some() {
            return Err(Error::conflict(format!(
                "user {} already has an enrollment in {}",
                data.user_id, data.course_id
            )));
        }

        let status = data.status.unwrap_or(EnrollmentStatus::Active);
        let fields = record_fields(&data.user_id, &data.course_id, &status);
        let id = self.store.add_document(&enrollments(), fields.clone()).await?;
        self.sink.emit(ServiceEvent::Created { entity: "enrollment", id: id.clone() });
        Ok(Enrollment::from_document(&Document::new(id, fields)))
    }

    /// Record by id
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Enrollment>> {
        let doc = self.store.get_document(&enrollments(), id).await?;
        Ok(doc.as_ref().map(Enrollment::from_document))
    }

    /// Records of one user
    pub async fn get_for_user(&self, user_id: &str) -> Result<Vec<Enrollment>> {
        self.query("userId", user_id).await
    }

    /// Records of one course
    pub async fn get_for_course(&self, course_id: &str) -> Result<Vec<Enrollment>> {
        self.query("courseId", course_id).await
    }

    /// Every record
    pub async fn get_all(&self) -> Result<Vec<Enrollment>> {
        let docs = self.store.list_documents(&enrollments()).await?;
        Ok(docs.iter().map(Enrollment::from_document).collect())
    }

    /// Set the status of a record
    pub async fn update_status(&self, id: &str, status: EnrollmentStatus) -> Result<Enrollment> {
        let mut patch = Fields::new();
        patch.insert("status".to_string(), Value::String(status.to_string()));
        self.patch(id, patch).await
    }

    /// Set progress (0-100); reaching 100 marks the record completed
    pub async fn update_progress(&self, id: &str, progress: i64) -> Result<Enrollment> {
        if !(0..=100).contains(&progress) {
            return Err(Error::invalid_input(format!("progress {} is outside 0-100", progress)));
        }
        let mut patch = Fields::new();
        patch.insert("progress".to_string(), json!(progress));
        patch.insert("lastAccessedAt".to_string(), timestamp_now());
        if progress == 100 {
            patch.insert("status".to_string(), Value::String(EnrollmentStatus::Completed.to_string()));
        }
        self.patch(id, patch).await
    }

    /// Stamp `lastAccessedAt`
    pub async fn touch(&self, id: &str) -> Result<Enrollment> {
        let mut patch = Fields::new();
        patch.insert("lastAccessedAt".to_string(), timestamp_now());
        self.patch(id, patch).await
    }

    /// Delete a record; the list pair is not touched
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.require(id).await?;
        self.store.delete_document(&enrollments(), id).await?;
        self.sink.emit(ServiceEvent::Deleted { entity: "enrollment", id: id.to_string(), cascaded: 0 });
        Ok(())
    }

    async fn query(&self, field: &str, value: &str) -> Result<Vec<Enrollment>> {
        let docs = self
            .store
            .query_equals(&enrollments(), field, &Value::String(value.to_string()))
            .await?;
        Ok(docs.iter().map(Enrollment::from_document).collect())
    }

    async fn find_pair(&self, user_id: &str, course_id: &str) -> Result<Option<Enrollment>> {
        Ok(self
            .get_for_user(user_id)
            .await?
            .into_iter()
            .find(|enrollment| enrollment.course_id == course_id))
    }

    async fn patch(&self, id: &str, patch: Fields) -> Result<Enrollment> {
        self.require(id).await?;
        self.store.update_document(&enrollments(), id, patch).await?;
        self.sink.emit(ServiceEvent::Updated { entity: "enrollment", id: id.to_string() });
        self.require(id).await
    }

    async fn require(&self, id: &str) -> Result<Enrollment> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("enrollment {}", id)))
    }
}
