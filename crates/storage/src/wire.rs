//! Wire shapes for progress payloads.
//!
//! Reads are tolerant (mixed field naming, missing fields) and are normalized
//! into the strict `ProgressRecord` here and nowhere else.

use chrono::{DateTime, Utc};
use learn_core::model::{LessonId, ProgressRecord, ProgressStatus, ProgressUpdate, UserId};
use serde::{Deserialize, Serialize};

/// A progress record as it arrives from the API or guest storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireProgressRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(alias = "lessonId")]
    pub lesson_id: LessonId,
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(
        default,
        alias = "completedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        alias = "timeSpentSeconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_spent_seconds: Option<u64>,
}

impl WireProgressRecord {
    /// Convert into the strict record, filling gaps.
    ///
    /// A missing `user_id` is taken from the user the read was issued for;
    /// missing or zero `attempts` becomes 1.
    #[must_use]
    pub fn normalize(self, requested_user: &UserId) -> ProgressRecord {
        ProgressRecord {
            id: self.id,
            user_id: self.user_id.unwrap_or_else(|| requested_user.clone()),
            lesson_id: self.lesson_id,
            status: self.status,
            score: self.score,
            attempts: self.attempts.unwrap_or(1).max(1),
            completed_at: self.completed_at,
            time_spent_seconds: self.time_spent_seconds,
        }
    }
}

impl From<ProgressRecord> for WireProgressRecord {
    fn from(record: ProgressRecord) -> Self {
        Self {
            id: record.id,
            user_id: Some(record.user_id),
            lesson_id: record.lesson_id,
            status: record.status,
            score: record.score,
            attempts: Some(record.attempts),
            completed_at: record.completed_at,
            time_spent_seconds: record.time_spent_seconds,
        }
    }
}

/// Body of `POST /progress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireProgressWrite {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WireProgressWrite {
    #[must_use]
    pub fn new(
        user_id: &UserId,
        lesson_id: &LessonId,
        update: &ProgressUpdate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.clone(),
            lesson_id: lesson_id.clone(),
            status: update.status,
            score: update.score,
            attempts: update.effective_attempts(),
            completed_at: update.completed_at(now),
        }
    }
}
