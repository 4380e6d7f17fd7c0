mod catalog;
mod ids;
mod progress;

pub use ids::{CourseId, LessonId, ModuleId, ParseIdError, UserId};

pub use catalog::{Catalog, CatalogError, Course, Lesson, Module};
pub use progress::{ProgressRecord, ProgressStatus, ProgressUpdate};
