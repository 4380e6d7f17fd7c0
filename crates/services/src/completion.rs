//! Lesson attempt state machine and the completion write that ends it.
//!
//! A correct verdict completes the lesson and resolves where the learner goes
//! next. The write and the navigation are independent: a failed write is
//! logged and handed back, but the next step is still resolved so the learner
//! is never stuck on a lesson because storage is down.

use std::sync::Arc;

use learn_core::model::{Catalog, CourseId, LessonId, ProgressRecord, ProgressUpdate, UserId};
use learn_core::navigation::{NextLesson, next_lesson_id};
use storage::repository::{ProgressStore, StorageError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttemptState {
    #[default]
    Unanswered,
    Correct,
    Incorrect,
}

/// One learner working through one lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonAttempt {
    user_id: UserId,
    lesson_id: LessonId,
    state: AttemptState,
    answers: u32,
    touched: bool,
}

impl LessonAttempt {
    #[must_use]
    pub fn new(user_id: UserId, lesson_id: LessonId) -> Self {
        Self {
            user_id,
            lesson_id,
            state: AttemptState::Unanswered,
            answers: 0,
            touched: false,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> &LessonId {
        &self.lesson_id
    }

    #[must_use]
    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// Verdicts submitted so far, including the correct one.
    #[must_use]
    pub fn answers(&self) -> u32 {
        self.answers
    }

    /// Record a verdict and return it. An incorrect verdict leaves the attempt
    /// open for another try.
    fn answer(&mut self, is_correct: bool) -> AttemptState {
        self.answers = self.answers.saturating_add(1);
        if is_correct {
            self.state = AttemptState::Correct;
            AttemptState::Correct
        } else {
            self.state = AttemptState::Unanswered;
            AttemptState::Incorrect
        }
    }
}

/// Shown once when the last lesson of a course is completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseCompletion {
    pub course_id: CourseId,
    pub title: String,
    /// Sum of `xp_reward` over every lesson of the course.
    pub total_xp: u64,
    pub lesson_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Advance(LessonId),
    CourseComplete(CourseCompletion),
    /// The lesson is not in the catalog snapshot.
    NoFurtherLesson,
}

#[derive(Debug)]
pub enum AttemptOutcome {
    /// Incorrect verdict; nothing was written.
    Retry,
    Completed {
        saved: Result<ProgressRecord, StorageError>,
        next: NextStep,
    },
}

impl AttemptOutcome {
    #[must_use]
    pub fn next(&self) -> Option<&NextStep> {
        match self {
            AttemptOutcome::Retry => None,
            AttemptOutcome::Completed { next, .. } => Some(next),
        }
    }
}

/// Drives lesson attempts against the session's progress store.
#[derive(Clone)]
pub struct CompletionCoordinator {
    store: Arc<dyn ProgressStore>,
}

impl CompletionCoordinator {
    #[must_use]
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// Apply the validator's verdict for the attempt.
    pub async fn submit(
        &self,
        attempt: &mut LessonAttempt,
        catalog: &Catalog,
        is_correct: bool,
    ) -> AttemptOutcome {
        if attempt.answer(is_correct) == AttemptState::Incorrect {
            tracing::debug!(
                user = %attempt.user_id,
                lesson = %attempt.lesson_id,
                answers = attempt.answers,
                "incorrect answer"
            );
            return AttemptOutcome::Retry;
        }

        let update = ProgressUpdate::completed().with_attempts(attempt.answers);
        let saved = self
            .store
            .update_lesson_progress(&attempt.user_id, &attempt.lesson_id, update)
            .await;
        match &saved {
            Ok(_) => tracing::info!(
                user = %attempt.user_id,
                lesson = %attempt.lesson_id,
                "lesson completed"
            ),
            Err(err) => tracing::warn!(
                user = %attempt.user_id,
                lesson = %attempt.lesson_id,
                error = %err,
                "completion not saved; continuing"
            ),
        }

        let next = resolve_next(catalog, &attempt.lesson_id);
        if let NextStep::CourseComplete(done) = &next {
            tracing::info!(
                user = %attempt.user_id,
                course = %done.course_id,
                total_xp = done.total_xp,
                "course completed"
            );
        }

        AttemptOutcome::Completed { saved, next }
    }

    /// Theory lessons have no check; reading to the end counts as correct.
    pub async fn acknowledge(
        &self,
        attempt: &mut LessonAttempt,
        catalog: &Catalog,
    ) -> AttemptOutcome {
        self.submit(attempt, catalog, true).await
    }

    /// Mark the lesson `in_progress` on the first interaction of the attempt.
    ///
    /// Returns `Ok(None)` when nothing was written: the attempt was already
    /// touched, or the lesson is completed and must not be demoted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read or written.
    pub async fn touch(
        &self,
        attempt: &mut LessonAttempt,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        if attempt.touched {
            return Ok(None);
        }

        let records = self.store.get_user_progress(&attempt.user_id).await?;
        attempt.touched = true;
        let already_done = records
            .iter()
            .any(|r| r.lesson_id == attempt.lesson_id && r.is_completed());
        if already_done {
            return Ok(None);
        }

        let record = self
            .store
            .mark_lesson_in_progress(&attempt.user_id, &attempt.lesson_id)
            .await?;
        Ok(Some(record))
    }
}

fn resolve_next(catalog: &Catalog, lesson_id: &LessonId) -> NextStep {
    match next_lesson_id(catalog, lesson_id) {
        Some(NextLesson::Lesson(id)) => NextStep::Advance(id),
        Some(NextLesson::CourseComplete) => catalog
            .find_course_by_lesson_id(lesson_id)
            .map_or(NextStep::NoFurtherLesson, |course| {
                NextStep::CourseComplete(CourseCompletion {
                    course_id: course.id.clone(),
                    title: course.title.clone(),
                    total_xp: course.total_xp(),
                    lesson_count: course.lesson_count(),
                })
            }),
        None => NextStep::NoFurtherLesson,
    }
}
