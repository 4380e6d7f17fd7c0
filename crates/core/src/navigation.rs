//! Catalog-order navigation between lessons.
//!
//! "Next" is always the next lesson by catalog position. Progress is never
//! consulted here, except by [`resume_lesson_id`], which is a separate entry
//! point for "continue where I left off".

use std::fmt;

use crate::aggregate::is_lesson_completed;
use crate::model::{Catalog, Course, LessonId, ProgressRecord};

/// Wire/display form of [`NextLesson::CourseComplete`].
pub const COURSE_COMPLETE: &str = "course-complete";

/// Where a learner goes after finishing a lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextLesson {
    Lesson(LessonId),
    /// The lesson was the last one of its course.
    CourseComplete,
}

impl fmt::Display for NextLesson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextLesson::Lesson(id) => write!(f, "{id}"),
            NextLesson::CourseComplete => f.write_str(COURSE_COMPLETE),
        }
    }
}

/// Resolve the lesson after `lesson_id`.
///
/// Returns `None` when the lesson is not in the catalog.
#[must_use]
pub fn next_lesson_id(catalog: &Catalog, lesson_id: &LessonId) -> Option<NextLesson> {
    catalog
        .courses()
        .iter()
        .find_map(|course| next_in_course(course, lesson_id))
}

/// Same as [`next_lesson_id`], restricted to one course.
#[must_use]
pub fn next_in_course(course: &Course, lesson_id: &LessonId) -> Option<NextLesson> {
    for (module_index, module) in course.modules.iter().enumerate() {
        let Some(position) = module.position_of(lesson_id) else {
            continue;
        };

        if let Some(next) = module.lessons.get(position + 1) {
            return Some(NextLesson::Lesson(next.id.clone()));
        }

        // Empty modules must be skipped, not treated as the end of the course.
        let following = course.modules[module_index + 1..]
            .iter()
            .find_map(|module| module.lessons.first());

        return Some(match following {
            Some(lesson) => NextLesson::Lesson(lesson.id.clone()),
            None => NextLesson::CourseComplete,
        });
    }
    None
}

/// Owning course of a lesson; see [`Catalog::find_course_by_lesson_id`].
#[must_use]
pub fn find_course_by_lesson_id<'a>(
    catalog: &'a Catalog,
    lesson_id: &LessonId,
) -> Option<&'a Course> {
    catalog.find_course_by_lesson_id(lesson_id)
}

/// First lesson of `course`, in catalog order, that is not completed.
///
/// `None` means every lesson is completed (or the course has no lessons).
#[must_use]
pub fn resume_lesson_id(course: &Course, records: &[ProgressRecord]) -> Option<LessonId> {
    course
        .lessons()
        .find(|lesson| !is_lesson_completed(records, &lesson.id))
        .map(|lesson| lesson.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseId, Lesson, Module, ModuleId, ProgressUpdate, UserId};
    use crate::time::fixed_now;

    fn module(id: &str, lessons: &[&str]) -> Module {
        Module {
            id: ModuleId::new(id),
            title: String::new(),
            order_index: 0,
            lessons: lessons
                .iter()
                .map(|lesson| Lesson {
                    id: LessonId::new(*lesson),
                    title: String::new(),
                    order_index: 0,
                    xp_reward: 10,
                })
                .collect(),
        }
    }

    fn course(id: &str, modules: Vec<Module>) -> Course {
        Course {
            id: CourseId::new(id),
            title: id.to_owned(),
            is_published: true,
            modules,
        }
    }

    fn next(catalog: &Catalog, lesson: &str) -> Option<NextLesson> {
        next_lesson_id(catalog, &LessonId::new(lesson))
    }

    fn lesson(id: &str) -> Option<NextLesson> {
        Some(NextLesson::Lesson(LessonId::new(id)))
    }

    #[test]
    fn advances_within_module() {
        let catalog = Catalog::new(vec![course("c", vec![module("m1", &["A", "B", "C"])])]);
        assert_eq!(next(&catalog, "A"), lesson("B"));
        assert_eq!(next(&catalog, "B"), lesson("C"));
    }

    #[test]
    fn advances_across_modules() {
        let catalog = Catalog::new(vec![course(
            "c",
            vec![module("m1", &["A", "B"]), module("m2", &["C"])],
        )]);
        assert_eq!(next(&catalog, "B"), lesson("C"));
    }

    #[test]
    fn skips_empty_modules() {
        let catalog = Catalog::new(vec![course(
            "c",
            vec![module("m1", &["A"]), module("m2", &[]), module("m3", &["C"])],
        )]);
        assert_eq!(next(&catalog, "A"), lesson("C"));
    }

    #[test]
    fn trailing_empty_modules_still_complete_the_course() {
        let catalog = Catalog::new(vec![course(
            "c",
            vec![module("m1", &["A"]), module("m2", &[]), module("m3", &[])],
        )]);
        assert_eq!(next(&catalog, "A"), Some(NextLesson::CourseComplete));
    }

    #[test]
    fn last_lesson_completes_course() {
        let catalog = Catalog::new(vec![course("c", vec![module("m1", &["A"])])]);
        let result = next(&catalog, "A").unwrap();
        assert_eq!(result, NextLesson::CourseComplete);
        assert_eq!(result.to_string(), COURSE_COMPLETE);
    }

    #[test]
    fn never_crosses_into_the_next_course() {
        let catalog = Catalog::new(vec![
            course("c1", vec![module("m1", &["A"])]),
            course("c2", vec![module("m2", &["B"])]),
        ]);
        assert_eq!(next(&catalog, "A"), Some(NextLesson::CourseComplete));
        assert_eq!(next(&catalog, "B"), Some(NextLesson::CourseComplete));
    }

    #[test]
    fn unknown_lesson_is_absent() {
        let catalog = Catalog::new(vec![course("c", vec![module("m1", &["A"])])]);
        assert_eq!(next(&catalog, "nonexistent"), None);
        assert_eq!(next(&Catalog::default(), "A"), None);
    }

    #[test]
    fn find_course_matches_resolver_traversal() {
        let catalog = Catalog::new(vec![
            course("c1", vec![module("m1", &["A"])]),
            course("c2", vec![module("m2", &[]), module("m3", &["B"])]),
        ]);
        let found = find_course_by_lesson_id(&catalog, &LessonId::new("B")).unwrap();
        assert_eq!(found.id, CourseId::new("c2"));
    }

    #[test]
    fn resume_picks_first_incomplete_lesson() {
        let c = course("c", vec![module("m1", &["A", "B"]), module("m2", &["C"])]);
        let done = |id: &str| {
            ProgressRecord::from_update(
                UserId::new("u"),
                LessonId::new(id),
                &ProgressUpdate::completed(),
                fixed_now(),
            )
        };

        assert_eq!(resume_lesson_id(&c, &[]), Some(LessonId::new("A")));
        assert_eq!(
            resume_lesson_id(&c, &[done("A"), done("C")]),
            Some(LessonId::new("B"))
        );
        assert_eq!(resume_lesson_id(&c, &[done("A"), done("B"), done("C")]), None);
    }
}
