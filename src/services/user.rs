//! User service

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::observability::{ServiceEvent, SharedSink};
use crate::core::types::{Fields, COURSES, USERS};
use crate::core::{Error, Result};
use crate::records::{Course, User};
use crate::services::{find_one, stamped_patch, timestamp_now};
use crate::storage::{CollectionPath, SharedStore};

/// Payload for creating a user
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// Email; must not already be registered
    pub email: String,
    /// Display name
    #[serde(default)]
    pub name: String,
}

/// Partial update of a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    /// New email; re-checked for uniqueness
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// CRUD over the `users` collection.
///
/// Email uniqueness is a pre-check before the write, so two concurrent
/// creates with the same email can both pass it.
#[derive(Clone)]
pub struct UserService {
    store: SharedStore,
    sink: SharedSink,
}

impl UserService {
    /// Create the service
    pub fn new(store: SharedStore, sink: SharedSink) -> Self {
        Self { store, sink }
    }

    fn collection() -> CollectionPath {
        CollectionPath::root(USERS)
    }

    /// Register a user
    pub async fn create(&self, data: NewUser) -> Result<User> {
        let email = data.email.trim();
        if email.is_empty() {
            return Err(Error::invalid_input("email is required"));
        }
        if self.get_by_email(email).await?.is_some() {
            return Err(Error::conflict(format!("email {} is already registered", email)));
        }

        let now = timestamp_now();
        let mut fields = Fields::new();
        fields.insert("email".to_string(), Value::String(email.to_string()));
        fields.insert("name".to_string(), Value::String(data.name));
        fields.insert("enrolledCourses".to_string(), json!([]));
        fields.insert("createdAt".to_string(), now.clone());
        fields.insert("updatedAt".to_string(), now);

        let id = self.store.add_document(&Self::collection(), fields).await?;
        self.sink.emit(ServiceEvent::Created { entity: "user", id: id.clone() });
        self.require(&id).await
    }

    /// User by id
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        let doc = self.store.get_document(&Self::collection(), id).await?;
        Ok(doc.as_ref().map(User::from_document))
    }

    /// User by email
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let doc = find_one(&self.store, &Self::collection(), "email", email).await?;
        Ok(doc.as_ref().map(User::from_document))
    }

    /// Every user, in id order
    pub async fn get_all(&self) -> Result<Vec<User>> {
        let docs = self.store.list_documents(&Self::collection()).await?;
        Ok(docs.iter().map(User::from_document).collect())
    }

    /// Patch a user; changing the email re-runs the uniqueness pre-check
    pub async fn update(&self, id: &str, mut patch: UserPatch) -> Result<User> {
        let existing = self.require(id).await?;
        if let Some(email) = patch.email.as_mut() {
            *email = email.trim().to_string();
        }

        if let Some(email) = patch.email.as_deref() {
            if email.is_empty() {
                return Err(Error::invalid_input("email must not be empty"));
            }
            if email != existing.email {
                if let Some(other) = self.get_by_email(email).await? {
                    if other.id != id {
                        return Err(Error::conflict(format!("email {} is already registered", email)));
                    }
                }
            }
        }

        self.store
            .update_document(&Self::collection(), id, stamped_patch(&patch)?)
            .await?;
        self.sink.emit(ServiceEvent::Updated { entity: "user", id: id.to_string() });
        self.require(id).await
    }

    /// Delete a user. Course lists and enrollment records that mention the
    /// user are left as they are.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.require(id).await?;
        self.store.delete_document(&Self::collection(), id).await?;
        self.sink.emit(ServiceEvent::Deleted { entity: "user", id: id.to_string(), cascaded: 0 });
        Ok(())
    }

    /// Courses listed on the user, in enrollment order; ids whose course
    /// no longer exists are skipped
    pub async fn enrolled_courses(&self, user_id: &str) -> Result<Vec<Course>> {
        let user = self.require(user_id).await?;
        let courses = CollectionPath::root(COURSES);

        let mut result = Vec::with_capacity(user.enrolled_courses.len());
        for course_id in &user.enrolled_courses {
            if let Some(doc) = self.store.get_document(&courses, course_id).await? {
                result.push(Course::from_document(&doc));
            }
        }
        Ok(result)
    }

    async fn require(&self, id: &str) -> Result<User> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("user {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::fixture;

    fn new_user(email: &str) -> NewUser {
        NewUser { email: email.to_string(), name: "Ada".to_string() }
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let fx = fixture();
        let users = &fx.services.users;
        let created = users.create(new_user("ada@example.com")).await.unwrap();
        assert!(created.enrolled_courses.is_empty());
        assert!(created.created_at.is_some());

        let err = users.create(new_user("ada@example.com")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn email_change_is_prechecked() {
        let fx = fixture();
        let users = &fx.services.users;
        users.create(new_user("ada@example.com")).await.unwrap();
        let bob = users.create(new_user("bob@example.com")).await.unwrap();

        let patch = UserPatch { email: Some("ada@example.com".into()), name: None };
        assert!(users.update(&bob.id, patch).await.unwrap_err().is_conflict());

        let patch = UserPatch { email: None, name: Some("Bob".into()) };
        let updated = users.update(&bob.id, patch).await.unwrap();
        assert_eq!(updated.name, "Bob");
        assert_eq!(updated.email, "bob@example.com");
    }

    #[tokio::test]
    async fn padded_email_change_is_trimmed_and_prechecked() {
        let fx = fixture();
        let users = &fx.services.users;
        users.create(new_user("ada@example.com")).await.unwrap();
        let bob = users.create(new_user("bob@example.com")).await.unwrap();

        let patch = UserPatch { email: Some("ada@example.com ".into()), name: None };
        assert!(users.update(&bob.id, patch).await.unwrap_err().is_conflict());

        let patch = UserPatch { email: Some("  robert@example.com ".into()), name: None };
        let updated = users.update(&bob.id, patch).await.unwrap();
        assert_eq!(updated.email, "robert@example.com");
        assert!(users.get_by_email("robert@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() {
        let fx = fixture();
        let users = &fx.services.users;
        let user = users.create(new_user("ada@example.com")).await.unwrap();
        users.delete(&user.id).await.unwrap();
        assert!(users.delete(&user.id).await.unwrap_err().is_not_found());
        assert!(users.get_by_id(&user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enrolled_courses_skip_missing_ids() {
        let fx = fixture();
        fx.course("c1", "Rust").await;
        fx.put(
            &CollectionPath::root(USERS),
            "u1",
            json!({"email": "a@x.io", "enrolledCourses": ["c1", "gone"]}),
        )
        .await;

        let courses = fx.services.users.enrolled_courses("u1").await.unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].name, "Rust");
    }
}
