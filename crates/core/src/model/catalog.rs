use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId, ModuleId};

/// XP granted by a lesson whose payload omits the reward.
pub const DEFAULT_XP_REWARD: u32 = 10;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("lesson id {0} appears more than once in the catalog")]
    DuplicateLesson(LessonId),
}

//
// ─── LESSON / MODULE / COURSE ──────────────────────────────────────────────────
//

/// A single lesson as seen by the progress engine.
///
/// Content (theory blocks, exercises, quizzes) is not modelled here; only the
/// fields that drive sequencing and rewards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: LessonId,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "order_index")]
    pub order_index: i32,
    #[serde(default = "default_xp_reward", alias = "xp_reward")]
    pub xp_reward: u32,
}

fn default_xp_reward() -> u32 {
    DEFAULT_XP_REWARD
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: ModuleId,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "order_index")]
    pub order_index: i32,
    /// Sequencing order is the array order, not `order_index`.
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Module {
    /// Position of the lesson within this module's lesson array.
    #[must_use]
    pub fn position_of(&self, lesson_id: &LessonId) -> Option<usize> {
        self.lessons.iter().position(|lesson| &lesson.id == lesson_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "is_published")]
    pub is_published: bool,
    #[serde(default)]
    pub modules: Vec<Module>,
}

impl Course {
    /// Lessons of every module, in catalog order.
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.modules.iter().flat_map(|module| module.lessons.iter())
    }

    #[must_use]
    pub fn lesson_ids(&self) -> Vec<LessonId> {
        self.lessons().map(|lesson| lesson.id.clone()).collect()
    }

    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|module| module.lessons.len()).sum()
    }

    /// Full reward pool of the course, completed or not.
    #[must_use]
    pub fn total_xp(&self) -> u64 {
        self.lessons().map(|lesson| u64::from(lesson.xp_reward)).sum()
    }

    #[must_use]
    pub fn contains_lesson(&self, lesson_id: &LessonId) -> bool {
        self.lessons().any(|lesson| &lesson.id == lesson_id)
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Immutable snapshot of the Course → Module → Lesson tree.
///
/// The snapshot is fetched once and passed explicitly to whoever needs it;
/// refreshing means fetching a new `Catalog`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    courses: Vec<Course>,
}

impl Catalog {
    #[must_use]
    pub fn new(courses: Vec<Course>) -> Self {
        Self { courses }
    }

    #[must_use]
    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    #[must_use]
    pub fn course(&self, id: &CourseId) -> Option<&Course> {
        self.courses.iter().find(|course| &course.id == id)
    }

    /// Reverse lookup from a lesson to its owning course.
    ///
    /// Linear scan in catalog order; the first course containing the lesson wins.
    #[must_use]
    pub fn find_course_by_lesson_id(&self, lesson_id: &LessonId) -> Option<&Course> {
        self.courses
            .iter()
            .find(|course| course.contains_lesson(lesson_id))
    }

    #[must_use]
    pub fn lesson(&self, lesson_id: &LessonId) -> Option<&Lesson> {
        self.courses
            .iter()
            .flat_map(Course::lessons)
            .find(|lesson| &lesson.id == lesson_id)
    }

    /// Check that lesson ids are unique across the whole catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateLesson` with the first repeated id.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for lesson in self.courses.iter().flat_map(Course::lessons) {
            if !seen.insert(&lesson.id) {
                return Err(CatalogError::DuplicateLesson(lesson.id.clone()));
            }
        }
        Ok(())
    }
}

impl From<Vec<Course>> for Catalog {
    fn from(courses: Vec<Course>) -> Self {
        Self::new(courses)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
