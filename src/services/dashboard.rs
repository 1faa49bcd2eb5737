//! Dashboard aggregation
//!
//! Read-only statistics over every collection. Enrollment figures come from
//! the explicit enrollment records.

use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;

use crate::core::config::DashboardConfig;
use crate::core::types::{COURSES, ENROLLMENTS, USERS};
use crate::core::{Error, Result};
use crate::records::{Course, Enrollment, EnrollmentStatus};
use crate::services::{LessonService, ModuleService};
use crate::storage::{CollectionPath, SharedStore};

/// Document counts per entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    /// Users
    pub users: usize,
    /// Courses
    pub courses: usize,
    /// Modules across both spellings
    pub modules: usize,
    /// Lessons across flat and nested layouts
    pub lessons: usize,
    /// Explicit enrollment records
    pub enrollments: usize,
}

/// One row of the course ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRanking {
    /// Course id
    pub course_id: String,
    /// Course name
    pub name: String,
    /// Enrollment records for the course
    pub enrollments: usize,
}

/// Figures shown on the dashboard front page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Entity counts
    pub totals: Totals,
    /// Records with status `active`
    pub active_enrollments: usize,
    /// Records with status `completed`
    pub completed_enrollments: usize,
    /// Completed over all records; 0 when there are none
    pub completion_rate: f64,
    /// Records per course; 0 when there are no courses
    pub average_enrollments_per_course: f64,
    /// Most enrolled courses, ties broken by name
    pub top_courses: Vec<CourseRanking>,
    /// Newest records by `enrolledAt`
    pub recent_enrollments: Vec<Enrollment>,
}

/// Lesson count of one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleLessonCount {
    /// Module id
    pub module_id: String,
    /// Module title
    pub title: String,
    /// Lessons currently stored for the module
    pub lessons: usize,
}

/// Figures for one course
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    /// Course id
    pub course_id: String,
    /// Course name
    pub name: String,
    /// Modules across both spellings
    pub module_count: usize,
    /// Lessons across every module
    pub lesson_count: usize,
    /// Enrollment records for the course
    pub enrolled_users: usize,
    /// Per-module lesson counts, in module order
    pub modules: Vec<ModuleLessonCount>,
}

/// Dashboard statistics
#[derive(Clone)]
pub struct DashboardService {
    store: SharedStore,
    modules: ModuleService,
    lessons: LessonService,
    config: DashboardConfig,
}

impl DashboardService {
    /// Create the service
    pub fn new(store: SharedStore, modules: ModuleService, lessons: LessonService, config: DashboardConfig) -> Self {
        Self { store, modules, lessons, config }
    }

    /// Front page statistics; `top_n` defaults to the configured ranking size
    pub async fn overview(&self, top_n: Option<usize>) -> Result<DashboardStats> {
        let top_n = top_n.unwrap_or(self.config.top_courses);

        let users_path = CollectionPath::root(USERS);
        let courses_path = CollectionPath::root(COURSES);
        let enrollments_path = CollectionPath::root(ENROLLMENTS);
        let (users, course_docs, enrollment_docs, modules, lessons) = futures::try_join!(
            self.store.list_documents(&users_path),
            self.store.list_documents(&courses_path),
            self.store.list_documents(&enrollments_path),
            self.modules.get_all(),
            self.lessons.get_all(),
        )?;
        let courses: Vec<Course> = course_docs.iter().map(Course::from_document).collect();
        let enrollments: Vec<Enrollment> = enrollment_docs.iter().map(Enrollment::from_document).collect();

        let active = enrollments.iter().filter(|e| e.status == EnrollmentStatus::Active).count();
        let completed = enrollments.iter().filter(|e| e.status == EnrollmentStatus::Completed).count();

        let mut per_course: HashMap<&str, usize> = HashMap::new();
        for enrollment in &enrollments {
            *per_course.entry(enrollment.course_id.as_str()).or_default() += 1;
        }
        let mut top_courses: Vec<CourseRanking> = courses
            .iter()
            .map(|course| CourseRanking {
                course_id: course.id.clone(),
                name: course.name.clone(),
                enrollments: per_course.get(course.id.as_str()).copied().unwrap_or(0),
            })
            .collect();
        top_courses.sort_by(|a, b| b.enrollments.cmp(&a.enrollments).then_with(|| a.name.cmp(&b.name)));
        top_courses.truncate(top_n);

        let mut recent_enrollments = enrollments.clone();
        recent_enrollments.sort_by_key(|e| Reverse(e.enrolled_at));
        recent_enrollments.truncate(self.config.recent_enrollments);

        Ok(DashboardStats {
            totals: Totals {
                users: users.len(),
                courses: courses.len(),
                modules: modules.len(),
                lessons: lessons.len(),
                enrollments: enrollments.len(),
            },
            active_enrollments: active,
            completed_enrollments: completed,
            completion_rate: ratio(completed, enrollments.len()),
            average_enrollments_per_course: ratio(enrollments.len(), courses.len()),
            top_courses,
            recent_enrollments,
        })
    }

    /// Module and lesson figures for one course
    pub async fn course_summary(&self, course_id: &str) -> Result<CourseSummary> {
        let doc = self
            .store
            .get_document(&CollectionPath::root(COURSES), course_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("course {}", course_id)))?;
        let course = Course::from_document(&doc);

        let mut modules = Vec::new();
        for module in self.modules.get_all_for_course(course_id).await? {
            let lessons = self.lessons.get_by_module(&module.id, Some(course_id)).await?;
            modules.push(ModuleLessonCount { module_id: module.id, title: module.title, lessons: lessons.len() });
        }

        let enrolled_users = self
            .store
            .query_equals(
                &CollectionPath::root(ENROLLMENTS),
                "courseId",
                &serde_json::Value::String(course_id.to_string()),
            )
            .await?
            .len();

        Ok(CourseSummary {
            course_id: course.id,
            name: course.name,
            module_count: modules.len(),
            lesson_count: modules.iter().map(|m| m.lessons).sum(),
            enrolled_users,
            modules,
        })
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
