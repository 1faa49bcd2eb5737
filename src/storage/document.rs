//! Addressing and document values for the document store

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::core::types::{Fields, ModuleCollection, COURSES, LESSONS};

/// Slash-joined path of a collection, e.g. `courses/c1/modules/m1/lessons`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Top-level collection
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Sub-collection `name` of document `doc_id` in this collection
    pub fn child(&self, doc_id: &str, name: &str) -> Self {
        Self(format!("{}/{}/{}", self.0, doc_id, name))
    }

    /// `courses/{course_id}/{modules|module}`
    pub fn modules(course_id: &str, collection: ModuleCollection) -> Self {
        Self::root(COURSES).child(course_id, collection.as_str())
    }

    /// `courses/{course_id}/{modules|module}/{module_id}/lessons`
    pub fn nested_lessons(course_id: &str, collection: ModuleCollection, module_id: &str) -> Self {
        Self::modules(course_id, collection).child(module_id, LESSONS)
    }

    /// Path text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this path is `prefix` or lies underneath it
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0 == prefix
            || (self.0.starts_with(prefix) && self.0.as_bytes().get(prefix.len()) == Some(&b'/'))
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to one document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    /// Collection holding the document
    pub collection: CollectionPath,
    /// Document id
    pub id: String,
}

impl DocumentRef {
    /// Create a reference
    pub fn new(collection: CollectionPath, id: impl Into<String>) -> Self {
        Self { collection, id: id.into() }
    }
}

/// A stored document: id plus schemaless fields
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document id within its collection
    pub id: String,
    /// Stored fields
    pub fields: Fields,
}

impl Document {
    /// Create a document
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self { id: id.into(), fields }
    }

    /// Field value, if present
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Convert a serializable value into a field map
pub fn to_fields<T: Serialize>(value: &T) -> crate::core::Result<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(crate::core::Error::invalid_input(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths_follow_layout() {
        let path = CollectionPath::nested_lessons("py_course", ModuleCollection::Module, "py_intro");
        assert_eq!(path.as_str(), "courses/py_course/module/py_intro/lessons");
        assert_eq!(
            CollectionPath::modules("c1", ModuleCollection::Modules).as_str(),
            "courses/c1/modules"
        );
    }

    #[test]
    fn prefix_matching_respects_segments() {
        let path = CollectionPath::modules("c1", ModuleCollection::Modules);
        assert!(path.starts_with("courses"));
        assert!(path.starts_with("courses/c1"));
        assert!(!path.starts_with("courses/c"));
    }

    #[test]
    fn to_fields_rejects_non_objects() {
        assert!(to_fields(&vec![1, 2]).is_err());
        let fields = to_fields(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(fields["a"], 1);
    }
}
