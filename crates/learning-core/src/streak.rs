//! Consecutive-day activity tracking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::clock::{civil_days_between, Clock};

/// Check marks shown at most by [`StreakTracker::display`].
pub const MAX_DISPLAYED_DAYS: u32 = 30;

/// Streak state. Owned by the host and persisted however it likes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakTracker {
    /// Civil date of the last recorded session.
    pub last_session_date: Option<NaiveDate>,
    /// Current consecutive-day count.
    pub current: u32,
    /// Best streak ever.
    pub best: u32,
}

impl StreakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record activity on `today` and return the updated streak.
    ///
    /// Same day leaves the streak unchanged, the next day extends it, any
    /// other gap (including a date in the past) restarts it at one.
    pub fn update(&mut self, today: NaiveDate) -> u32 {
        let previous = self.current;
        match self.last_session_date {
            None => {
                self.current = 1;
            }
            Some(last) => match civil_days_between(last, today) {
                0 => return self.current,
                1 => self.current = self.current.saturating_add(1),
                _ => self.current = 1,
            },
        }
        self.last_session_date = Some(today);
        self.best = self.best.max(self.current);

        if self.current != previous {
            tracing::info!(streak = self.current, best = self.best, "streak updated");
        }
        self.current
    }

    /// Record activity on the clock's civil today.
    pub fn record(&mut self, clock: &dyn Clock) -> u32 {
        self.update(clock.today())
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn best(&self) -> u32 {
        self.best
    }

    /// One check mark per day, capped at a month.
    pub fn display(&self) -> String {
        "✓".repeat(self.current.min(MAX_DISPLAYED_DAYS) as usize)
    }
}
