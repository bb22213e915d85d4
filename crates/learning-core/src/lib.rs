//! Learning coach core.
//!
//! Spaced repetition scheduling tuned for short attention spans, energy-based
//! study sessions, review planning and progress analytics. The crate holds no
//! I/O of its own beyond configuration files: persistence goes through
//! [`ExerciseRepository`] and time through [`Clock`].

pub mod actions;
pub mod analytics;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod planner;
pub mod recommender;
pub mod repository;
pub mod reward;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod streak;
pub mod timer;
pub mod validation;

#[cfg(test)]
mod generators;

pub use analytics::{
    mastery_percent, Analytics, Category, Confidence, DifficultyLevel, DomainAnalysis,
    ExerciseAnalysis, LearningInsights,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::LearningConfig;
pub use error::{ConfigError, CoreError, CoreResult, StoreError, StoreResult};
pub use models::{Exercise, ExerciseId, ExerciseRecord, Rating, ReviewHistoryEntry, SrsState};
pub use planner::{DailyPlan, Planner, PlannerStats, WeeklyPlan};
pub use recommender::{Priority, Recommender};
pub use repository::{ExerciseRepository, InMemoryRepository};
pub use reward::RewardEvent;
pub use scheduler::{AdhdSm2, IntervalPreview, ReviewHorizon, ReviewSchedule, Scheduler};
pub use service::{LearningService, ReviewOutcome, StepOutcome};
pub use session::{
    EnergyLevel, Session, SessionBuilder, SessionHandle, SessionMode, SessionPlan, SessionStatus,
    SessionSummary,
};
pub use streak::StreakTracker;
pub use timer::{SessionTimer, TimerStatus};
