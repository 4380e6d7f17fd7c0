//! Guest-mode progress store.
//!
//! All records of a user live as one JSON array under a per-user key. Every
//! write is a full read-modify-write of that array; a single user's record
//! count is bounded by the catalog size, so the linear scan is fine.

use std::sync::Arc;

use async_trait::async_trait;
use learn_core::Clock;
use learn_core::model::{LessonId, ProgressRecord, ProgressUpdate, UserId};
use uuid::Uuid;

use crate::repository::{KeyValueStore, ProgressStore, StorageError};
use crate::wire::WireProgressRecord;

const KEY_PREFIX: &str = "progress:";

/// Key the user's progress array is stored under.
#[must_use]
pub fn storage_key(user_id: &UserId) -> String {
    format!("{KEY_PREFIX}{user_id}")
}

#[derive(Clone)]
pub struct LocalProgressStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Clock,
}

impl LocalProgressStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Clock) -> Self {
        Self { kv, clock }
    }

    async fn load(&self, user_id: &UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        let Some(raw) = self.kv.get(&storage_key(user_id)).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<WireProgressRecord>>(&raw) {
            Ok(rows) => Ok(rows
                .into_iter()
                .map(|row| row.normalize(user_id))
                .collect()),
            Err(err) => {
                // Guest progress is not durable; an unreadable value is an empty set.
                tracing::warn!(
                    user = %user_id,
                    error = %err,
                    "discarding malformed guest progress"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn save(
        &self,
        user_id: &UserId,
        records: &[ProgressRecord],
    ) -> Result<(), StorageError> {
        let raw = serde_json::to_string(records)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.kv.set(&storage_key(user_id), &raw).await
    }
}

#[async_trait]
impl ProgressStore for LocalProgressStore {
    async fn get_user_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.load(user_id).await
    }

    async fn update_lesson_progress(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
        update: ProgressUpdate,
    ) -> Result<ProgressRecord, StorageError> {
        let now = self.clock.now();
        let mut records = self.load(user_id).await?;

        let record = match records.iter_mut().find(|r| &r.lesson_id == lesson_id) {
            Some(existing) => {
                existing.apply(&update, now);
                existing.clone()
            }
            None => {
                let mut created =
                    ProgressRecord::from_update(user_id.clone(), lesson_id.clone(), &update, now);
                created.id = Some(Uuid::new_v4().to_string());
                records.push(created.clone());
                created
            }
        };

        self.save(user_id, &records).await?;
        tracing::debug!(
            user = %user_id,
            lesson = %lesson_id,
            status = record.status.as_str(),
            "guest progress saved"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryKeyValueStore;
    use chrono::Duration;
    use learn_core::model::ProgressStatus;
    use learn_core::time::{fixed_clock, fixed_now};

    fn store(kv: &InMemoryKeyValueStore) -> LocalProgressStore {
        LocalProgressStore::new(Arc::new(kv.clone()), fixed_clock())
    }

    #[tokio::test]
    async fn completing_twice_keeps_one_record() {
        let kv = InMemoryKeyValueStore::new();
        let store = store(&kv);
        let user = UserId::new("guest");
        let lesson = LessonId::new("py-001");

        let first = store.mark_lesson_completed(&user, &lesson).await.unwrap();
        let second = store.mark_lesson_completed(&user, &lesson).await.unwrap();

        assert_eq!(first.status, ProgressStatus::Completed);
        assert_eq!(second.status, ProgressStatus::Completed);
        assert_eq!(first.id, second.id);

        let all = store.get_user_progress(&user).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn repeat_completion_refreshes_timestamp() {
        let kv = InMemoryKeyValueStore::new();
        let user = UserId::new("guest");
        let lesson = LessonId::new("a");

        store(&kv).mark_lesson_completed(&user, &lesson).await.unwrap();

        let mut later = fixed_clock();
        later.advance(Duration::minutes(10));
        let again = LocalProgressStore::new(Arc::new(kv.clone()), later)
            .mark_lesson_completed(&user, &lesson)
            .await
            .unwrap();
        assert_eq!(again.completed_at, Some(fixed_now() + Duration::minutes(10)));
    }

    #[tokio::test]
    async fn merge_carries_time_spent_over() {
        let kv = InMemoryKeyValueStore::new();
        let user = UserId::new("guest");
        kv.set(
            &storage_key(&user),
            r#"[{"lesson_id":"a","status":"in_progress","attempts":2,"time_spent_seconds":90}]"#,
        )
        .await
        .unwrap();

        let store = store(&kv);
        let updated = store
            .update_lesson_progress(
                &user,
                &LessonId::new("a"),
                ProgressUpdate::completed().with_score(7),
            )
            .await
            .unwrap();

        assert_eq!(updated.status, ProgressStatus::Completed);
        assert_eq!(updated.score, Some(7));
        assert_eq!(updated.attempts, 1);
        assert_eq!(updated.time_spent_seconds, Some(90));
        assert_eq!(updated.completed_at, Some(fixed_now()));
    }

    #[tokio::test]
    async fn malformed_state_reads_as_empty_and_is_replaced() {
        let kv = InMemoryKeyValueStore::new();
        let user = UserId::new("guest");
        kv.set(&storage_key(&user), "{not json").await.unwrap();

        let store = store(&kv);
        assert!(store.get_user_progress(&user).await.unwrap().is_empty());

        store
            .mark_lesson_in_progress(&user, &LessonId::new("b"))
            .await
            .unwrap();
        let all = store.get_user_progress(&user).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, ProgressStatus::InProgress);
    }

    #[tokio::test]
    async fn users_do_not_share_keys() {
        let kv = InMemoryKeyValueStore::new();
        let store = store(&kv);
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        store
            .mark_lesson_completed(&alice, &LessonId::new("a"))
            .await
            .unwrap();

        assert!(store.get_user_progress(&bob).await.unwrap().is_empty());
        assert!(kv.get("progress:alice").await.unwrap().is_some());
        assert!(kv.get("progress:bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn demotion_is_accepted_as_issued() {
        let kv = InMemoryKeyValueStore::new();
        let store = store(&kv);
        let user = UserId::new("guest");
        let lesson = LessonId::new("a");

        store.mark_lesson_completed(&user, &lesson).await.unwrap();
        let demoted = store.mark_lesson_in_progress(&user, &lesson).await.unwrap();

        assert_eq!(demoted.status, ProgressStatus::InProgress);
        assert_eq!(demoted.completed_at, Some(fixed_now()));
    }
}
