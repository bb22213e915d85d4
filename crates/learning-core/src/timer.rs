//! Wall-clock bound for a study session.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Timer state for an elapsed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Active,
    /// Little time left; wrap up the current exercise.
    Warning,
    Ended,
}

impl TimerStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Warning => "Warning",
            Self::Ended => "Ended",
        }
    }
}

/// Session timer. Independent of the energy-level target duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimer {
    duration: Duration,
    warning: Duration,
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new(Duration::minutes(15), Duration::minutes(5))
    }
}

impl SessionTimer {
    /// Timer of `duration`, warning once `warning` or less remains.
    pub fn new(duration: Duration, warning: Duration) -> Self {
        Self { duration, warning }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn warning(&self) -> Duration {
        self.warning
    }

    /// Get remaining time, never negative.
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        let remaining = self.duration - elapsed;
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }

    pub fn status(&self, elapsed: Duration) -> TimerStatus {
        let remaining = self.duration - elapsed;
        if remaining <= Duration::zero() {
            TimerStatus::Ended
        } else if remaining <= self.warning {
            TimerStatus::Warning
        } else {
            TimerStatus::Active
        }
    }

    /// Get progress (0.0 to 1.0).
    pub fn progress(&self, elapsed: Duration) -> f64 {
        let total = self.duration.num_seconds() as f64;
        if total <= 0.0 {
            return 1.0;
        }
        let elapsed = elapsed.num_seconds().max(0) as f64;
        (elapsed / total).min(1.0)
    }

    /// Format remaining time as `MM:SS`.
    pub fn format_remaining(&self, elapsed: Duration) -> String {
        let remaining = self.remaining(elapsed);
        let mins = remaining.num_minutes();
        let secs = remaining.num_seconds() % 60;
        format!("{:02}:{:02}", mins, secs)
    }
}
