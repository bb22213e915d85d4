//! Energy-adaptive study sessions.
//!
//! A [`SessionBuilder`] turns an energy level into a [`SessionPlan`]. The plan
//! is run through a [`SessionHandle`], which owns the process' single active
//! [`Session`] and drives its lifecycle:
//!
//! ```text
//! Planned --start--> Active --end--> Completed
//!                          \--abort--> Aborted
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::models::{Exercise, ExerciseId, Rating};
use crate::recommender::Recommender;
use crate::scheduler::{ReviewSchedule, Scheduler};
use crate::timer::{SessionTimer, TimerStatus};

/// How much the learner feels able to do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

/// Session shape derived from an energy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Micro,
    Standard,
    Deep,
}

impl SessionMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Micro => "micro",
            Self::Standard => "standard",
            Self::Deep => "deep",
        }
    }
}

/// Fixed prescription for one energy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProfile {
    pub mode: SessionMode,
    pub target_minutes: i64,
    pub exercise_count: usize,
    /// Minutes from the session start at which to pause.
    pub break_offsets_minutes: &'static [i64],
    /// Pause after every this many completed exercises; `None` for no pauses.
    pub break_every: Option<usize>,
}

const LOW: SessionProfile = SessionProfile {
    mode: SessionMode::Micro,
    target_minutes: 10,
    exercise_count: 1,
    break_offsets_minutes: &[],
    break_every: None,
};

const MEDIUM: SessionProfile = SessionProfile {
    mode: SessionMode::Standard,
    target_minutes: 25,
    exercise_count: 2,
    break_offsets_minutes: &[12],
    break_every: Some(2),
};

const HIGH: SessionProfile = SessionProfile {
    mode: SessionMode::Deep,
    target_minutes: 50,
    exercise_count: 3,
    break_offsets_minutes: &[17, 34],
    break_every: Some(3),
};

impl SessionProfile {
    pub fn target_duration(&self) -> Duration {
        Duration::minutes(self.target_minutes)
    }

    pub fn break_offsets(&self) -> Vec<Duration> {
        self.break_offsets_minutes
            .iter()
            .map(|&m| Duration::minutes(m))
            .collect()
    }

    /// Target duration spread evenly over the exercise count.
    pub fn estimate_duration(&self, count: usize) -> Duration {
        if count == 0 || self.exercise_count == 0 {
            return Duration::zero();
        }
        let per_exercise = self.target_duration().num_seconds() / self.exercise_count as i64;
        Duration::seconds(per_exercise * count as i64)
    }

    /// Whether to pause after `completed_count` exercises.
    pub fn should_take_break(&self, completed_count: usize) -> bool {
        match self.break_every {
            Some(every) if every > 0 => completed_count > 0 && completed_count % every == 0,
            _ => false,
        }
    }
}

impl EnergyLevel {
    pub const ALL: [EnergyLevel; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn profile(&self) -> SessionProfile {
        match self {
            Self::Low => LOW,
            Self::Medium => MEDIUM,
            Self::High => HIGH,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EnergyLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "1" => Ok(Self::Low),
            "medium" | "2" => Ok(Self::Medium),
            "high" | "3" => Ok(Self::High),
            _ => Err(CoreError::InvalidEnergy(s.to_string())),
        }
    }
}

/// A bounded, ordered selection of exercises to work through.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub id: Uuid,
    pub energy: EnergyLevel,
    pub mode: SessionMode,
    pub exercise_ids: Vec<ExerciseId>,
    pub estimated_duration: Duration,
    pub breaks: Vec<Duration>,
    pub created_at: DateTime<Utc>,
}

impl SessionPlan {
    pub fn len(&self) -> usize {
        self.exercise_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercise_ids.is_empty()
    }

    pub fn contains(&self, id: &ExerciseId) -> bool {
        self.exercise_ids.contains(id)
    }
}

/// Builds session plans from a pool of exercises.
#[derive(Clone)]
pub struct SessionBuilder {
    recommender: Recommender,
}

impl SessionBuilder {
    pub fn new(recommender: Recommender) -> Self {
        Self { recommender }
    }

    /// Plan a session for `energy`.
    ///
    /// Due reviews come first in recommender order. Remaining slots are filled
    /// with the earliest created unfinished exercises. Fails with
    /// [`CoreError::NothingToStudy`] when nothing qualifies.
    pub fn build(&self, pool: &[Exercise], energy: EnergyLevel) -> CoreResult<SessionPlan> {
        let profile = energy.profile();
        let scheduler = self.recommender.scheduler();
        let k = profile.exercise_count;

        let mut selected: Vec<&Exercise> = self
            .recommender
            .recommend(pool, pool.len())
            .into_iter()
            .filter(|ex| self.recommender.is_due_review(ex))
            .take(k)
            .collect();

        if selected.len() < k {
            let mut fillers: Vec<&Exercise> = pool
                .iter()
                .filter(|ex| !ex.deleted && !ex.completed)
                .filter(|ex| !selected.iter().any(|s| s.id == ex.id))
                .collect();
            fillers.sort_by_key(|ex| ex.created_at);
            let missing = k - selected.len();
            selected.extend(fillers.into_iter().take(missing));
        }

        if selected.is_empty() {
            let next_review_at = pool
                .iter()
                .filter(|ex| !ex.deleted)
                .filter_map(Exercise::next_review_at)
                .min();
            return Err(CoreError::NothingToStudy { next_review_at });
        }

        let plan = SessionPlan {
            id: Uuid::new_v4(),
            energy,
            mode: profile.mode,
            estimated_duration: profile.estimate_duration(selected.len()),
            breaks: profile.break_offsets(),
            exercise_ids: selected.into_iter().map(|ex| ex.id.clone()).collect(),
            created_at: scheduler.now(),
        };
        tracing::debug!(
            session = %plan.id,
            energy = %energy,
            exercises = plan.len(),
            "session planned"
        );
        Ok(plan)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Planned,
    Active,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// A rating given during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRating {
    pub exercise_id: ExerciseId,
    pub rating: Rating,
}

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub energy: EnergyLevel,
    pub status: SessionStatus,
    pub completed: Vec<ExerciseId>,
    pub ratings: Vec<SessionRating>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    pub elapsed_seconds: i64,
    /// Share of ratings that were Good or Easy (0.0 to 1.0).
    pub accuracy: f64,
}

impl SessionSummary {
    pub fn elapsed(&self) -> Duration {
        Duration::seconds(self.elapsed_seconds)
    }
}

/// One run of a plan.
#[derive(Debug, Clone)]
pub struct Session {
    plan: SessionPlan,
    status: SessionStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    cursor: usize,
    completed: Vec<ExerciseId>,
    ratings: Vec<SessionRating>,
}

impl Session {
    pub fn new(plan: SessionPlan) -> Self {
        Self {
            plan,
            status: SessionStatus::Planned,
            started_at: None,
            ended_at: None,
            cursor: 0,
            completed: Vec::new(),
            ratings: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.plan.id
    }

    pub fn plan(&self) -> &SessionPlan {
        &self.plan
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed(&self) -> &[ExerciseId] {
        &self.completed
    }

    fn require(&self, expected: SessionStatus) -> CoreResult<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(CoreError::SessionState {
                expected: expected.name(),
                actual: self.status.name(),
            })
        }
    }

    /// Planned -> Active.
    pub fn start(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.require(SessionStatus::Planned)?;
        self.status = SessionStatus::Active;
        self.started_at = Some(now);
        tracing::info!(session = %self.id(), energy = %self.plan.energy, "session started");
        Ok(())
    }

    /// Review one of the planned exercises. The session stays active.
    pub fn complete_exercise(
        &mut self,
        scheduler: &Scheduler,
        exercise: &mut Exercise,
        rating: Rating,
    ) -> CoreResult<ReviewSchedule> {
        self.require(SessionStatus::Active)?;
        if !self.plan.contains(&exercise.id) {
            return Err(CoreError::InvalidArgument(format!(
                "exercise {} is not part of session {}",
                exercise.id,
                self.id()
            )));
        }

        let schedule = scheduler.review(exercise, rating);
        if !self.completed.contains(&exercise.id) {
            self.completed.push(exercise.id.clone());
        }
        self.ratings.push(SessionRating {
            exercise_id: exercise.id.clone(),
            rating,
        });
        tracing::debug!(
            session = %self.id(),
            exercise = %exercise.id,
            done = self.completed.len(),
            "session exercise completed"
        );
        Ok(schedule)
    }

    /// Next planned exercise, advancing the cursor. `None` once exhausted.
    pub fn next(&mut self) -> CoreResult<Option<ExerciseId>> {
        self.require(SessionStatus::Active)?;
        let next = self.plan.exercise_ids.get(self.cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        Ok(next)
    }

    /// Planned exercises not handed out by [`Session::next`] yet.
    pub fn remaining(&self) -> usize {
        self.plan.len().saturating_sub(self.cursor)
    }

    /// Whether the plan recommends a pause now.
    pub fn should_take_break(&self) -> bool {
        self.plan
            .energy
            .profile()
            .should_take_break(self.completed.len())
    }

    /// Time since start, zero before it.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        match self.started_at {
            Some(started) if end > started => end - started,
            _ => Duration::zero(),
        }
    }

    /// Active -> Completed.
    pub fn end(&mut self, now: DateTime<Utc>) -> CoreResult<SessionSummary> {
        self.require(SessionStatus::Active)?;
        Ok(self.finish(SessionStatus::Completed, now))
    }

    /// Planned or Active -> Aborted.
    pub fn abort(&mut self, now: DateTime<Utc>) -> CoreResult<SessionSummary> {
        if self.status.is_terminal() {
            return Err(CoreError::SessionState {
                expected: SessionStatus::Active.name(),
                actual: self.status.name(),
            });
        }
        Ok(self.finish(SessionStatus::Aborted, now))
    }

    fn finish(&mut self, status: SessionStatus, now: DateTime<Utc>) -> SessionSummary {
        self.status = status;
        self.ended_at = Some(now);
        let summary = self.summary(now);
        tracing::info!(
            session = %self.id(),
            status = status.name(),
            completed = summary.completed.len(),
            elapsed_seconds = summary.elapsed_seconds,
            "session finished"
        );
        summary
    }

    pub fn summary(&self, now: DateTime<Utc>) -> SessionSummary {
        let successes = self.ratings.iter().filter(|r| r.rating.is_success()).count();
        let accuracy = if self.ratings.is_empty() {
            0.0
        } else {
            successes as f64 / self.ratings.len() as f64
        };
        SessionSummary {
            session_id: self.id(),
            energy: self.plan.energy,
            status: self.status,
            completed: self.completed.clone(),
            ratings: self.ratings.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at.unwrap_or(now),
            elapsed_seconds: self.elapsed(now).num_seconds(),
            accuracy,
        }
    }
}

/// Holder of the single active session.
///
/// Starting a session while another one is active archives the previous one
/// as aborted.
pub struct SessionHandle {
    scheduler: Scheduler,
    timer: SessionTimer,
    current: Option<Session>,
    archived: Vec<SessionSummary>,
}

impl SessionHandle {
    pub fn new(scheduler: Scheduler) -> Self {
        Self::with_timer(scheduler, SessionTimer::default())
    }

    pub fn with_timer(scheduler: Scheduler, timer: SessionTimer) -> Self {
        Self {
            scheduler,
            timer,
            current: None,
            archived: Vec::new(),
        }
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Whether a session is currently active.
    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|s| s.status() == SessionStatus::Active)
    }

    /// Sessions that were replaced while still active.
    pub fn archived(&self) -> &[SessionSummary] {
        &self.archived
    }

    /// Start running `plan`, replacing any active session.
    pub fn start(&mut self, plan: SessionPlan) -> CoreResult<&Session> {
        let now = self.scheduler.now();
        if let Some(mut previous) = self.current.take() {
            if previous.status() == SessionStatus::Active {
                tracing::warn!(
                    replaced = %previous.id(),
                    by = %plan.id,
                    "active session replaced, archiving as aborted"
                );
                let summary = previous.abort(now)?;
                self.archived.push(summary);
            }
        }

        let mut session = Session::new(plan);
        session.start(now)?;
        Ok(&*self.current.insert(session))
    }

    fn active_mut(&mut self) -> CoreResult<&mut Session> {
        self.current.as_mut().ok_or(CoreError::SessionState {
            expected: SessionStatus::Active.name(),
            actual: "none",
        })
    }

    pub fn complete_exercise(
        &mut self,
        exercise: &mut Exercise,
        rating: Rating,
    ) -> CoreResult<ReviewSchedule> {
        let scheduler = self.scheduler.clone();
        self.active_mut()?
            .complete_exercise(&scheduler, exercise, rating)
    }

    pub fn next(&mut self) -> CoreResult<Option<ExerciseId>> {
        self.active_mut()?.next()
    }

    pub fn end(&mut self) -> CoreResult<SessionSummary> {
        let now = self.scheduler.now();
        self.active_mut()?.end(now)
    }

    pub fn abort(&mut self) -> CoreResult<SessionSummary> {
        let now = self.scheduler.now();
        self.active_mut()?.abort(now)
    }

    /// Wall-clock status of the current session.
    pub fn timer_status(&self) -> Option<TimerStatus> {
        let session = self.current.as_ref()?;
        session.started_at()?;
        Some(self.timer.status(session.elapsed(self.scheduler.now())))
    }

    pub fn time_remaining(&self) -> Option<Duration> {
        let session = self.current.as_ref()?;
        session.started_at()?;
        Some(self.timer.remaining(session.elapsed(self.scheduler.now())))
    }
}
