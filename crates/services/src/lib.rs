#![forbid(unsafe_code)]

pub mod app_services;
pub mod completion;
pub mod config;
pub mod error;
pub mod progress_service;

pub use learn_core::Clock;

pub use app_services::AppServices;
pub use completion::{
    AttemptOutcome, AttemptState, CompletionCoordinator, CourseCompletion, LessonAttempt, NextStep,
};
pub use config::EngineConfig;
pub use error::{AppServicesError, ConfigError, ProgressServiceError};
pub use progress_service::{CourseProgress, ProgressService};
