//! Pure completion math over a user's progress records.

use crate::model::{Course, LessonId, ProgressRecord};

/// First record for the lesson, if the user has touched it.
#[must_use]
pub fn lesson_progress<'a>(
    records: &'a [ProgressRecord],
    lesson_id: &LessonId,
) -> Option<&'a ProgressRecord> {
    records.iter().find(|record| &record.lesson_id == lesson_id)
}

#[must_use]
pub fn is_lesson_completed(records: &[ProgressRecord], lesson_id: &LessonId) -> bool {
    lesson_progress(records, lesson_id).is_some_and(ProgressRecord::is_completed)
}

/// Number of `lesson_ids` whose record is `completed`.
#[must_use]
pub fn completed_count(records: &[ProgressRecord], lesson_ids: &[LessonId]) -> usize {
    lesson_ids
        .iter()
        .filter(|id| is_lesson_completed(records, id))
        .count()
}

/// Completion percentage in `0..=100`, rounded half up.
///
/// An empty `lesson_ids` set is `0`.
#[must_use]
pub fn course_progress(records: &[ProgressRecord], lesson_ids: &[LessonId]) -> u8 {
    percent(completed_count(records, lesson_ids), lesson_ids.len())
}

/// XP of the lessons in `course` the user has completed.
#[must_use]
pub fn completed_xp(records: &[ProgressRecord], course: &Course) -> u64 {
    course
        .lessons()
        .filter(|lesson| is_lesson_completed(records, &lesson.id))
        .map(|lesson| u64::from(lesson.xp_reward))
        .sum()
}

pub(crate) fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    // round(100 * c / n) in integers: (200c + n) / 2n
    let value = (200 * completed + total) / (2 * total);
    u8::try_from(value).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProgressStatus, ProgressUpdate, UserId};
    use crate::time::fixed_now;

    fn rec(lesson: &str, status: ProgressStatus) -> ProgressRecord {
        ProgressRecord::from_update(
            UserId::new("u1"),
            LessonId::new(lesson),
            &ProgressUpdate::new(status),
            fixed_now(),
        )
    }

    fn ids(raw: &[&str]) -> Vec<LessonId> {
        raw.iter().map(|id| LessonId::new(*id)).collect()
    }

    #[test]
    fn lesson_progress_finds_first_match() {
        let records = vec![
            rec("a", ProgressStatus::InProgress),
            rec("b", ProgressStatus::Completed),
        ];
        let found = lesson_progress(&records, &LessonId::new("b")).unwrap();
        assert_eq!(found.status, ProgressStatus::Completed);
        assert!(lesson_progress(&records, &LessonId::new("z")).is_none());
    }

    #[test]
    fn empty_lesson_set_is_zero_percent() {
        let records = vec![rec("a", ProgressStatus::Completed)];
        assert_eq!(course_progress(&records, &[]), 0);
    }

    #[test]
    fn two_of_three_rounds_to_67() {
        let records = vec![
            rec("py-001", ProgressStatus::Completed),
            rec("py-002", ProgressStatus::Completed),
        ];
        let lessons = ids(&["py-001", "py-002", "py-003"]);
        assert_eq!(course_progress(&records, &lessons), 67);
    }

    #[test]
    fn only_completed_counts() {
        let records = vec![
            rec("a", ProgressStatus::InProgress),
            rec("b", ProgressStatus::NotStarted),
            rec("c", ProgressStatus::Completed),
            rec("outside", ProgressStatus::Completed),
        ];
        let lessons = ids(&["a", "b", "c", "d"]);
        assert_eq!(completed_count(&records, &lessons), 1);
        assert_eq!(course_progress(&records, &lessons), 25);
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(percent(1, 8), 13); // 12.5
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(1, 200), 1); // 0.5
        assert_eq!(percent(3, 3), 100);
    }

    #[test]
    fn percentage_stays_within_bounds() {
        let lessons = ids(&["a", "b", "c", "d", "e", "f", "g"]);
        let mut records = Vec::new();
        let mut previous = course_progress(&records, &lessons);
        for id in &lessons {
            records.push(rec(id.as_str(), ProgressStatus::Completed));
            let now = course_progress(&records, &lessons);
            assert!(now <= 100);
            assert!(now >= previous);
            previous = now;
        }
        assert_eq!(previous, 100);
    }

    #[test]
    fn duplicate_ids_in_lesson_set_are_counted_per_entry() {
        let records = vec![rec("a", ProgressStatus::Completed)];
        let lessons = ids(&["a", "a", "b", "b"]);
        assert_eq!(course_progress(&records, &lessons), 50);
    }
}
