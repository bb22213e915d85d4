//! Exercise mutations that are not reviews.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::models::{Exercise, DEFAULT_EASE};

/// Forget all progress and put the exercise back to "never done".
///
/// `updated_at` is left alone so that repeating the call changes nothing.
pub fn uncomplete(exercise: &mut Exercise) {
    exercise.completed = false;
    exercise.last_reviewed = None;
    exercise.completed_steps.clear();
    exercise.ease_factor = DEFAULT_EASE;
    exercise.interval_days = 0;
    exercise.repetitions = 0;
}

/// Put an exercise aside for later. Scheduling state is untouched.
pub fn skip(exercise: &mut Exercise, now: DateTime<Utc>) {
    exercise.skipped_count = exercise.skipped_count.saturating_add(1);
    exercise.last_skipped = Some(now);
}

/// Tick or untick a step. Returns whether the step is now completed.
pub fn toggle_step(
    exercise: &mut Exercise,
    index: usize,
    now: DateTime<Utc>,
) -> CoreResult<bool> {
    if index >= exercise.steps.len() {
        return Err(CoreError::InvalidStep {
            index,
            len: exercise.steps.len(),
        });
    }
    let done = if exercise.completed_steps.remove(&index) {
        false
    } else {
        exercise.completed_steps.insert(index);
        true
    };
    exercise.updated_at = now;
    Ok(done)
}

pub fn is_step_completed(exercise: &Exercise, index: usize) -> bool {
    exercise.completed_steps.contains(&index)
}

/// Share of steps ticked (0.0 to 1.0). Exercises without steps count as 0.
pub fn step_completion_rate(exercise: &Exercise) -> f64 {
    if exercise.steps.is_empty() {
        return 0.0;
    }
    exercise.completed_steps.len() as f64 / exercise.steps.len() as f64
}

/// Mark completed with every step ticked, without touching the schedule.
pub fn mark_done(exercise: &mut Exercise, now: DateTime<Utc>) {
    exercise.completed = true;
    exercise.completed_steps = (0..exercise.steps.len()).collect();
    exercise.updated_at = now;
}

/// Move to the trash.
pub fn soft_delete(exercise: &mut Exercise, now: DateTime<Utc>) {
    exercise.deleted = true;
    exercise.deleted_at = Some(now);
    exercise.updated_at = now;
}

/// Take out of the trash.
pub fn restore(exercise: &mut Exercise, now: DateTime<Utc>) {
    exercise.deleted = false;
    exercise.deleted_at = None;
    exercise.updated_at = now;
}
