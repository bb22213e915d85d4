//! Spaced repetition scheduling.
//!
//! The algorithm is an SM-2 variant tuned for short attention spans: a hard
//! recall only drops the interval back to one day, a forgotten exercise comes
//! back the same day, and easy recalls get a small extra multiplier.
//!
//! | Rating    | New interval                              | Ease delta |
//! |-----------|-------------------------------------------|------------|
//! | Easy      | 1 if new, else `floor(prev * ease * 1.1)` | +0.15      |
//! | Good      | 1 if new, else `floor(prev * ease)`       | 0          |
//! | Hard      | 1                                         | -0.10      |
//! | Forgotten | 0 (due today)                             | -0.20      |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{civil_days_between, Clock};
use crate::models::{clamp_ease, Exercise, Rating, DEFAULT_EASE, MAX_INTERVAL_DAYS};

/// Tunable parameters of the scheduling algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdhdSm2 {
    /// Ease given to reset exercises.
    pub initial_ease: f64,
    /// Extra interval multiplier for easy recalls.
    pub easy_bonus: f64,
    /// Ease change on an easy recall.
    pub easy_ease_delta: f64,
    /// Ease change on a hard recall.
    pub hard_ease_delta: f64,
    /// Ease change when forgotten.
    pub forgotten_ease_delta: f64,
}

impl Default for AdhdSm2 {
    fn default() -> Self {
        Self {
            initial_ease: DEFAULT_EASE,
            easy_bonus: 1.1,
            easy_ease_delta: 0.15,
            hard_ease_delta: -0.10,
            forgotten_ease_delta: -0.20,
        }
    }
}

impl AdhdSm2 {
    /// Algorithm name.
    pub fn name(&self) -> &str {
        "SM-2 (ADHD)"
    }

    /// Compute the post-review schedule without touching the exercise.
    ///
    /// The incoming ease drives the interval as-is; only the resulting ease is
    /// clamped. Intervals never exceed [`MAX_INTERVAL_DAYS`].
    pub fn calculate(&self, interval_days: u32, ease_factor: f64, rating: Rating) -> ReviewSchedule {
        let ease = if ease_factor.is_nan() { DEFAULT_EASE } else { ease_factor };
        let grown = |multiplier: f64| -> u32 {
            if interval_days == 0 {
                1
            } else {
                let next = (f64::from(interval_days) * multiplier).floor();
                // Saturating float-to-int cast; never shrink below one day.
                (next as u32).clamp(1, MAX_INTERVAL_DAYS)
            }
        };

        let (interval_days, delta, completed) = match rating {
            Rating::Easy => (grown(ease * self.easy_bonus), self.easy_ease_delta, true),
            Rating::Good => (grown(ease), 0.0, true),
            Rating::Hard => (1, self.hard_ease_delta, true),
            Rating::Forgotten => (0, self.forgotten_ease_delta, false),
        };

        ReviewSchedule {
            interval_days,
            ease_factor: clamp_ease(ease + delta),
            completed,
        }
    }
}

/// Result of applying a rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewSchedule {
    pub interval_days: u32,
    pub ease_factor: f64,
    pub completed: bool,
}

/// Interval each rating would produce, in `Rating::ALL` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntervalPreview {
    pub forgotten: u32,
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

/// Coarse distance to the next review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewHorizon {
    New,
    Today,
    Tomorrow,
    ThisWeek,
    ThisMonth,
    Later,
}

impl ReviewHorizon {
    /// Bucket a day distance: 0, 1, up to 7, up to 30, beyond.
    pub fn from_days(days: u32) -> Self {
        match days {
            0 => Self::Today,
            1 => Self::Tomorrow,
            2..=7 => Self::ThisWeek,
            8..=30 => Self::ThisMonth,
            _ => Self::Later,
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "Nouveau",
            Self::Today => "Aujourd'hui",
            Self::Tomorrow => "Demain",
            Self::ThisWeek => "Cette semaine",
            Self::ThisMonth => "Ce mois",
            Self::Later => "Plus tard",
        }
    }
}

/// Applies the scheduling algorithm to exercises.
#[derive(Clone)]
pub struct Scheduler {
    algorithm: AdhdSm2,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_algorithm(clock, AdhdSm2::default())
    }

    pub fn with_algorithm(clock: Arc<dyn Clock>, algorithm: AdhdSm2) -> Self {
        Self { algorithm, clock }
    }

    pub fn algorithm(&self) -> &AdhdSm2 {
        &self.algorithm
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Apply a rating to an exercise.
    pub fn review(&self, exercise: &mut Exercise, rating: Rating) -> ReviewSchedule {
        let schedule =
            self.algorithm
                .calculate(exercise.interval_days, exercise.ease_factor, rating);
        let now = self.clock.now();

        exercise.interval_days = schedule.interval_days;
        exercise.ease_factor = schedule.ease_factor;
        exercise.completed = schedule.completed;
        exercise.repetitions = exercise.repetitions.saturating_add(1);
        exercise.last_reviewed = Some(now);
        exercise.updated_at = now;

        tracing::debug!(
            exercise = %exercise.id,
            rating = rating.name(),
            interval_days = schedule.interval_days,
            ease_factor = schedule.ease_factor,
            "exercise reviewed"
        );
        schedule
    }

    /// Apply a raw 1..=4 rating. Out-of-range values leave the exercise untouched.
    pub fn review_value(&self, exercise: &mut Exercise, rating: i64) -> Option<ReviewSchedule> {
        match Rating::from_value(rating) {
            Some(rating) => Some(self.review(exercise, rating)),
            None => {
                tracing::warn!(exercise = %exercise.id, rating, "ignoring out-of-range rating");
                None
            }
        }
    }

    /// Intervals each rating would give, for display before the user answers.
    pub fn preview(&self, exercise: &Exercise) -> IntervalPreview {
        let interval = |rating| {
            self.algorithm
                .calculate(exercise.interval_days, exercise.ease_factor, rating)
                .interval_days
        };
        IntervalPreview {
            forgotten: interval(Rating::Forgotten),
            hard: interval(Rating::Hard),
            good: interval(Rating::Good),
            easy: interval(Rating::Easy),
        }
    }

    /// Due when never reviewed, when the interval is zero, or once the
    /// interval has fully elapsed.
    pub fn is_due(&self, exercise: &Exercise) -> bool {
        if exercise.interval_days == 0 {
            return true;
        }
        match exercise.next_review_at() {
            None => true,
            Some(next) => self.clock.now() > next,
        }
    }

    /// Civil days until the next review, never negative.
    pub fn days_until_review(&self, exercise: &Exercise) -> u32 {
        if exercise.interval_days == 0 {
            return 0;
        }
        let Some(next) = exercise.next_review_at() else {
            return 0;
        };
        let days = civil_days_between(self.clock.today(), self.clock.civil_date(next));
        u32::try_from(days.max(0)).unwrap_or(u32::MAX)
    }

    /// Coarse bucket for the next review.
    pub fn review_horizon(&self, exercise: &Exercise) -> ReviewHorizon {
        if exercise.is_new() {
            return ReviewHorizon::New;
        }
        ReviewHorizon::from_days(self.days_until_review(exercise))
    }

    /// Human readable next-review label ("Nouveau", "Demain", ...).
    pub fn human_readable_next_review(&self, exercise: &Exercise) -> &'static str {
        self.review_horizon(exercise).label()
    }

    /// Forget all progress on an exercise.
    pub fn reset(&self, exercise: &mut Exercise) {
        exercise.interval_days = 0;
        exercise.repetitions = 0;
        exercise.completed_steps.clear();
        exercise.last_reviewed = None;
        exercise.ease_factor = clamp_ease(self.algorithm.initial_ease);
        exercise.completed = false;
        exercise.updated_at = self.clock.now();
    }
}
