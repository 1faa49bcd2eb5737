//! Structured service events
//!
//! Services and the resolver never log through a global; they receive an
//! [`EventSink`] and emit [`ServiceEvent`]s. The server wires in
//! [`TracingSink`]; tests use [`RecordingSink`] to assert on what happened.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::types::ModuleCollection;

/// Shared handle to an event sink
pub type SharedSink = Arc<dyn EventSink>;

/// Something worth reporting that happened inside a service
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    /// A record was written for the first time
    Created {
        /// Entity kind ("user", "course", ...)
        entity: &'static str,
        /// Record id
        id: String,
    },
    /// A record was patched
    Updated {
        /// Entity kind
        entity: &'static str,
        /// Record id
        id: String,
    },
    /// A record was removed
    Deleted {
        /// Entity kind
        entity: &'static str,
        /// Record id
        id: String,
        /// Dependent documents removed in the same batch
        cascaded: usize,
    },
    /// Module location resolution finished
    ModuleResolved {
        /// Course id probed
        course_id: String,
        /// Module id probed
        module_id: String,
        /// Matching spelling, if any
        collection: Option<ModuleCollection>,
    },
    /// Lesson location resolution finished
    LessonResolved {
        /// Module id probed
        module_id: String,
        /// Location kind (`top-level`, `nested`, `alt-nested`, `none`)
        kind: &'static str,
    },
    /// A single resolver probe failed and was treated as "no match"
    ProbeFailed {
        /// Path that was probed
        path: String,
        /// Store error text
        error: String,
    },
    /// A course id was guessed from a module id
    CourseIdDerived {
        /// Module id the guess came from
        module_id: String,
        /// Guessed course id
        course_id: String,
    },
    /// A user joined a course through the enrollment transaction
    Enrolled {
        /// User id
        user_id: String,
        /// Course id
        course_id: String,
    },
    /// A user left a course through the unenroll transaction
    Unenrolled {
        /// User id
        user_id: String,
        /// Course id
        course_id: String,
    },
}

/// Receiver of service events
pub trait EventSink: Send + Sync {
    /// Record one event
    fn emit(&self, event: ServiceEvent);
}

/// Emits events as `tracing` events with structured fields
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ServiceEvent) {
        match event {
            ServiceEvent::Created { entity, id } => {
                tracing::info!(entity, %id, "record created");
            }
            ServiceEvent::Updated { entity, id } => {
                tracing::info!(entity, %id, "record updated");
            }
            ServiceEvent::Deleted { entity, id, cascaded } => {
                tracing::info!(entity, %id, cascaded, "record deleted");
            }
            ServiceEvent::ModuleResolved { course_id, module_id, collection } => {
                tracing::debug!(
                    %course_id,
                    %module_id,
                    collection = collection.map(|c| c.as_str()).unwrap_or("none"),
                    "module location resolved"
                );
            }
            ServiceEvent::LessonResolved { module_id, kind } => {
                tracing::debug!(%module_id, kind, "lesson location resolved");
            }
            ServiceEvent::ProbeFailed { path, error } => {
                tracing::warn!(%path, %error, "probe failed, treating candidate as absent");
            }
            ServiceEvent::CourseIdDerived { module_id, course_id } => {
                tracing::warn!(%module_id, %course_id, "course id guessed from module id prefix");
            }
            ServiceEvent::Enrolled { user_id, course_id } => {
                tracing::info!(%user_id, %course_id, "user enrolled");
            }
            ServiceEvent::Unenrolled { user_id, course_id } => {
                tracing::info!(%user_id, %course_id, "user unenrolled");
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ServiceEvent>>,
}

impl RecordingSink {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events so far
    pub fn events(&self) -> Vec<ServiceEvent> {
        self.events.lock().clone()
    }

    /// Number of events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&ServiceEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ServiceEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.emit(ServiceEvent::Created { entity: "user", id: "u1".into() });
        sink.emit(ServiceEvent::Deleted { entity: "user", id: "u1".into(), cascaded: 0 });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ServiceEvent::Created { .. }));
        assert_eq!(sink.count(|e| matches!(e, ServiceEvent::Deleted { .. })), 1);
    }
}
