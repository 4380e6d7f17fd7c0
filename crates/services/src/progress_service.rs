use std::sync::Arc;

use learn_core::aggregate::{completed_count, completed_xp, course_progress, lesson_progress};
use learn_core::model::{
    Catalog, Course, CourseId, LessonId, ProgressRecord, ProgressUpdate, UserId,
};
use learn_core::navigation::resume_lesson_id;
use storage::repository::ProgressStore;

use crate::error::ProgressServiceError;

/// Completion figures for one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseProgress {
    pub course_id: CourseId,
    pub title: String,
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    /// XP of completed lessons only.
    pub earned_xp: u64,
}

impl CourseProgress {
    #[must_use]
    pub fn from_records(course: &Course, records: &[ProgressRecord]) -> Self {
        let lesson_ids = course.lesson_ids();
        Self {
            course_id: course.id.clone(),
            title: course.title.clone(),
            completed: completed_count(records, &lesson_ids),
            total: lesson_ids.len(),
            percent: course_progress(records, &lesson_ids),
            earned_xp: completed_xp(records, course),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

/// Read-side views over the session's progress store.
#[derive(Clone)]
pub struct ProgressService {
    store: Arc<dyn ProgressStore>,
}

impl ProgressService {
    #[must_use]
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn records(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ProgressRecord>, ProgressServiceError> {
        Ok(self.store.get_user_progress(user_id).await?)
    }

    /// The user's record for one lesson, if any.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn lesson(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<Option<ProgressRecord>, ProgressServiceError> {
        let records = self.records(user_id).await?;
        Ok(lesson_progress(&records, lesson_id).cloned())
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn course_progress(
        &self,
        user_id: &UserId,
        course: &Course,
    ) -> Result<CourseProgress, ProgressServiceError> {
        let records = self.records(user_id).await?;
        Ok(CourseProgress::from_records(course, &records))
    }

    /// Progress for every course in the catalog, in catalog order.
    ///
    /// The store is read once for the whole dashboard.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn dashboard(
        &self,
        user_id: &UserId,
        catalog: &Catalog,
    ) -> Result<Vec<CourseProgress>, ProgressServiceError> {
        let records = self.records(user_id).await?;
        Ok(catalog
            .courses()
            .iter()
            .map(|course| CourseProgress::from_records(course, &records))
            .collect())
    }

    /// First lesson of `course` the user has not completed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the store cannot be read.
    pub async fn resume(
        &self,
        user_id: &UserId,
        course: &Course,
    ) -> Result<Option<LessonId>, ProgressServiceError> {
        let records = self.records(user_id).await?;
        Ok(resume_lesson_id(course, &records))
    }

    /// Write an arbitrary status update, as issued.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the write fails.
    pub async fn update(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
        update: ProgressUpdate,
    ) -> Result<ProgressRecord, ProgressServiceError> {
        Ok(self
            .store
            .update_lesson_progress(user_id, lesson_id, update)
            .await?)
    }
}
