use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{LessonId, UserId};

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Completion state of a lesson for a single user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }

    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, ProgressStatus::Completed)
    }
}

//
// ─── UPDATE ────────────────────────────────────────────────────────────────────
//

/// A single progress write as issued by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub status: ProgressStatus,
    pub score: Option<u32>,
    pub attempts: Option<u32>,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(status: ProgressStatus) -> Self {
        Self {
            status,
            score: None,
            attempts: None,
        }
    }

    #[must_use]
    pub fn completed() -> Self {
        Self::new(ProgressStatus::Completed)
    }

    #[must_use]
    pub fn in_progress() -> Self {
        Self::new(ProgressStatus::InProgress)
    }

    #[must_use]
    pub fn with_score(mut self, score: u32) -> Self {
        self.score = Some(score);
        self
    }

    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    /// Attempts as written: client-supplied, defaulting to 1, never below 1.
    #[must_use]
    pub fn effective_attempts(&self) -> u32 {
        self.attempts.unwrap_or(1).max(1)
    }

    /// Completion timestamp carried by this write, if it completes the lesson.
    #[must_use]
    pub fn completed_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.status.is_completed().then_some(now)
    }
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Per-user, per-lesson progress. Unique on `(user_id, lesson_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_seconds: Option<u64>,
}

impl ProgressRecord {
    /// First write for a `(user, lesson)` pair.
    #[must_use]
    pub fn from_update(
        user_id: UserId,
        lesson_id: LessonId,
        update: &ProgressUpdate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            user_id,
            lesson_id,
            status: update.status,
            score: update.score,
            attempts: update.effective_attempts(),
            completed_at: update.completed_at(now),
            time_spent_seconds: None,
        }
    }

    /// Upsert merge for an existing record.
    ///
    /// Status, score and attempts are replaced. `completed_at` is stamped with
    /// `now` on every completing write (a repeat completion refreshes it) and
    /// kept otherwise. `time_spent_seconds` is never touched.
    pub fn apply(&mut self, update: &ProgressUpdate, now: DateTime<Utc>) {
        self.status = update.status;
        self.score = update.score;
        self.attempts = update.effective_attempts();
        if let Some(at) = update.completed_at(now) {
            self.completed_at = Some(at);
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn record(update: &ProgressUpdate) -> ProgressRecord {
        ProgressRecord::from_update(
            UserId::new("u1"),
            LessonId::new("py-001"),
            update,
            fixed_now(),
        )
    }

    #[test]
    fn in_progress_write_has_no_completion_time() {
        let rec = record(&ProgressUpdate::in_progress());
        assert_eq!(rec.status, ProgressStatus::InProgress);
        assert_eq!(rec.attempts, 1);
        assert!(rec.completed_at.is_none());
    }

    #[test]
    fn zero_attempts_normalizes_to_one() {
        let rec = record(&ProgressUpdate::completed().with_attempts(0));
        assert_eq!(rec.attempts, 1);
        assert_eq!(rec.completed_at, Some(fixed_now()));
    }

    #[test]
    fn apply_preserves_time_spent_and_prior_completion() {
        let mut rec = record(&ProgressUpdate::completed().with_score(80));
        rec.time_spent_seconds = Some(300);

        let later = fixed_now() + Duration::minutes(5);
        rec.apply(&ProgressUpdate::in_progress().with_attempts(3), later);

        assert_eq!(rec.status, ProgressStatus::InProgress);
        assert_eq!(rec.score, None);
        assert_eq!(rec.attempts, 3);
        assert_eq!(rec.completed_at, Some(fixed_now()));
        assert_eq!(rec.time_spent_seconds, Some(300));
    }

    #[test]
    fn repeat_completion_refreshes_timestamp() {
        let mut rec = record(&ProgressUpdate::completed());
        let later = fixed_now() + Duration::hours(1);
        rec.apply(&ProgressUpdate::completed(), later);
        assert!(rec.is_completed());
        assert_eq!(rec.completed_at, Some(later));
    }

    #[test]
    fn status_uses_snake_case_on_the_wire() {
        let json = serde_json::to_string(&ProgressStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");
        assert_eq!(ProgressStatus::InProgress.as_str(), "in_progress");
    }
}
