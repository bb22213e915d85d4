//! Request-scoped flows over a repository.
//!
//! Every call loads what it needs, runs the core components and writes the
//! mutated exercise back. Review history is best effort: a failed append is
//! logged and the review still succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::actions;
use crate::analytics::{mastery_percent, Analytics, DomainAnalysis, ExerciseAnalysis, LearningInsights};
use crate::clock::Clock;
use crate::config::LearningConfig;
use crate::error::{CoreError, CoreResult};
use crate::models::{Exercise, ExerciseId, Rating, ReviewHistoryEntry};
use crate::planner::{Planner, PlannerStats};
use crate::recommender::Recommender;
use crate::repository::ExerciseRepository;
use crate::reward::RewardEvent;
use crate::scheduler::{ReviewSchedule, Scheduler};
use crate::session::{EnergyLevel, SessionBuilder, SessionHandle, SessionPlan};
use crate::streak::StreakTracker;
use crate::timer::SessionTimer;
use crate::validation::validate_exercise;

/// Result of a review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub exercise: Exercise,
    pub schedule: ReviewSchedule,
    pub rewards: Vec<RewardEvent>,
}

/// Result of ticking or unticking a step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub exercise: Exercise,
    /// Whether the step is now ticked.
    pub done: bool,
    pub reward: Option<RewardEvent>,
}

pub struct LearningService<R> {
    repo: R,
    clock: Arc<dyn Clock>,
    scheduler: Scheduler,
    recommender: Recommender,
    planner: Planner,
    analytics: Analytics,
    timer: SessionTimer,
}

impl<R: ExerciseRepository> LearningService<R> {
    pub fn new(repo: R, clock: Arc<dyn Clock>) -> Self {
        Self::with_scheduler(
            repo,
            Scheduler::new(clock),
            crate::recommender::DEFAULT_FOCUS_CAP,
            SessionTimer::default(),
        )
    }

    /// Service wired from configuration, on the system clock.
    pub fn from_config(repo: R, config: &LearningConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(config.clock());
        let scheduler = Scheduler::with_algorithm(clock, config.to_algorithm());
        Self::with_scheduler(repo, scheduler, config.recommender.focus_cap, config.to_timer())
    }

    fn with_scheduler(repo: R, scheduler: Scheduler, focus_cap: usize, timer: SessionTimer) -> Self {
        Self {
            repo,
            clock: scheduler.clock().clone(),
            recommender: Recommender::new(scheduler.clone()).with_focus_cap(focus_cap),
            planner: Planner::new(scheduler.clock().clone()),
            analytics: Analytics::new(scheduler.clone()),
            scheduler,
            timer,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn recommender(&self) -> &Recommender {
        &self.recommender
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// A session handle sharing this service's scheduler and timer settings.
    pub fn session_handle(&self) -> SessionHandle {
        SessionHandle::with_timer(self.scheduler.clone(), self.timer)
    }

    /// Count today in the host's streak, returning the milestone reached, if any.
    pub fn record_activity(&self, streak: &mut StreakTracker) -> Option<RewardEvent> {
        if streak.last_session_date == Some(self.clock.today()) {
            return None;
        }
        RewardEvent::for_streak(streak.record(self.clock.as_ref()))
    }

    /// Every exercise that is not in the trash.
    pub fn exercises(&self) -> CoreResult<Vec<Exercise>> {
        let mut all = self.repo.load()?;
        all.retain(|ex| !ex.deleted);
        Ok(all)
    }

    pub fn trash(&self) -> CoreResult<Vec<Exercise>> {
        let mut all = self.repo.load()?;
        all.retain(|ex| ex.deleted);
        Ok(all)
    }

    /// A live exercise; trashed ones are not found.
    pub fn get(&self, id: &ExerciseId) -> CoreResult<Exercise> {
        let ex = self.repo.get_by_id(id)?;
        if ex.deleted {
            return Err(CoreError::NotFound(id.clone()));
        }
        Ok(ex)
    }

    pub fn add_exercise(&self, exercise: Exercise) -> CoreResult<Exercise> {
        validate_exercise(&exercise)?;
        self.repo.insert(&exercise)?;
        tracing::debug!(exercise = %exercise.id, domain = %exercise.domain, "exercise added");
        Ok(exercise)
    }

    fn mutate<T>(
        &self,
        id: &ExerciseId,
        f: impl FnOnce(&mut Exercise) -> CoreResult<T>,
    ) -> CoreResult<(Exercise, T)> {
        let mut exercise = self.get(id)?;
        let out = f(&mut exercise)?;
        self.repo.update(&exercise)?;
        Ok((exercise, out))
    }

    fn log_review(&self, exercise: &Exercise, rating: Rating) {
        let entry = ReviewHistoryEntry::after_review(exercise, rating, self.clock.now());
        if let Err(err) = self.repo.log_review(&entry) {
            tracing::warn!(exercise = %exercise.id, error = %err, "failed to record review history");
        }
    }

    fn rewards(before: &Exercise, after: &Exercise, schedule: &ReviewSchedule) -> Vec<RewardEvent> {
        let mut rewards = Vec::new();
        if schedule.completed {
            rewards.push(RewardEvent::ExerciseCompleted);
        }
        let reached = RewardEvent::for_mastery(mastery_percent(after.ease_factor));
        if reached.is_some() && reached != RewardEvent::for_mastery(mastery_percent(before.ease_factor)) {
            rewards.extend(reached);
        }
        rewards
    }

    pub fn review(&self, id: &ExerciseId, rating: Rating) -> CoreResult<ReviewOutcome> {
        let mut before = None;
        let (exercise, schedule) = self.mutate(id, |ex| {
            before = Some(ex.clone());
            Ok(self.scheduler.review(ex, rating))
        })?;
        self.log_review(&exercise, rating);

        let rewards = before
            .map(|before| Self::rewards(&before, &exercise, &schedule))
            .unwrap_or_default();
        Ok(ReviewOutcome {
            exercise,
            schedule,
            rewards,
        })
    }

    /// Review with a raw 1..=4 value. Out-of-range values change nothing and
    /// return `None`.
    pub fn review_value(&self, id: &ExerciseId, rating: i64) -> CoreResult<Option<ReviewOutcome>> {
        match Rating::from_value(rating) {
            Some(rating) => self.review(id, rating).map(Some),
            None => {
                tracing::warn!(exercise = %id, rating, "ignoring out-of-range rating");
                Ok(None)
            }
        }
    }

    /// Review an exercise as part of the handle's active session.
    pub fn complete_in_session(
        &self,
        handle: &mut SessionHandle,
        id: &ExerciseId,
        rating: Rating,
    ) -> CoreResult<ReviewSchedule> {
        let (exercise, schedule) = self.mutate(id, |ex| handle.complete_exercise(ex, rating))?;
        self.log_review(&exercise, rating);
        Ok(schedule)
    }

    pub fn skip(&self, id: &ExerciseId) -> CoreResult<Exercise> {
        let now = self.clock.now();
        self.mutate(id, |ex| {
            actions::skip(ex, now);
            Ok(())
        })
        .map(|(ex, _)| ex)
    }

    pub fn toggle_step(&self, id: &ExerciseId, index: usize) -> CoreResult<StepOutcome> {
        let now = self.clock.now();
        let (exercise, (done, previously)) = self.mutate(id, |ex| {
            let previously = ex.completed_steps.len();
            actions::toggle_step(ex, index, now).map(|done| (done, previously))
        })?;
        Ok(StepOutcome {
            exercise,
            done,
            reward: done.then(|| RewardEvent::for_step(previously)),
        })
    }

    pub fn uncomplete(&self, id: &ExerciseId) -> CoreResult<Exercise> {
        self.mutate(id, |ex| {
            actions::uncomplete(ex);
            Ok(())
        })
        .map(|(ex, _)| ex)
    }

    pub fn mark_done(&self, id: &ExerciseId) -> CoreResult<Exercise> {
        let now = self.clock.now();
        self.mutate(id, |ex| {
            actions::mark_done(ex, now);
            Ok(())
        })
        .map(|(ex, _)| ex)
    }

    /// Forget all spaced-repetition progress.
    pub fn reset(&self, id: &ExerciseId) -> CoreResult<Exercise> {
        self.mutate(id, |ex| {
            self.scheduler.reset(ex);
            Ok(())
        })
        .map(|(ex, _)| ex)
    }

    pub fn soft_delete(&self, id: &ExerciseId) -> CoreResult<Exercise> {
        let now = self.clock.now();
        self.mutate(id, |ex| {
            actions::soft_delete(ex, now);
            Ok(())
        })
        .map(|(ex, _)| ex)
    }

    /// Take an exercise out of the trash.
    pub fn restore(&self, id: &ExerciseId) -> CoreResult<Exercise> {
        let mut exercise = self.repo.get_by_id(id)?;
        actions::restore(&mut exercise, self.clock.now());
        self.repo.update(&exercise)?;
        Ok(exercise)
    }

    pub fn recommend(&self, limit: usize) -> CoreResult<Vec<Exercise>> {
        let pool = self.repo.load()?;
        Ok(self.recommender.recommend(&pool, limit).into_iter().cloned().collect())
    }

    /// Focus mode: at most one exercise.
    pub fn focus(&self, limit: usize) -> CoreResult<Vec<Exercise>> {
        let pool = self.repo.load()?;
        Ok(self.recommender.focus(&pool, limit).into_iter().cloned().collect())
    }

    pub fn build_session(&self, energy: EnergyLevel) -> CoreResult<SessionPlan> {
        let pool = self.repo.load()?;
        SessionBuilder::new(self.recommender.clone()).build(&pool, energy)
    }

    /// Parse an energy level and plan a session for it.
    pub fn build_session_for(&self, energy: &str) -> CoreResult<SessionPlan> {
        self.build_session(energy.parse()?)
    }

    pub fn reviews_for(&self, date: NaiveDate) -> CoreResult<Vec<Exercise>> {
        let pool = self.repo.load()?;
        Ok(self.planner.reviews_for(&pool, date).into_iter().cloned().collect())
    }

    pub fn overdue(&self) -> CoreResult<Vec<Exercise>> {
        let pool = self.repo.load()?;
        Ok(self.planner.overdue(&pool).into_iter().cloned().collect())
    }

    pub fn upcoming(&self, limit: usize) -> CoreResult<Vec<Exercise>> {
        let pool = self.repo.load()?;
        Ok(self.planner.upcoming(&pool, limit).into_iter().cloned().collect())
    }

    /// Due counts per day of a month.
    pub fn month_schedule(&self, year: i32, month: u32) -> CoreResult<BTreeMap<u32, usize>> {
        let pool = self.repo.load()?;
        self.planner.monthly_plan(&pool, year, month)
    }

    pub fn planner_stats(&self) -> CoreResult<PlannerStats> {
        let pool = self.repo.load()?;
        Ok(self.planner.stats(&pool))
    }

    pub fn analyze(&self, id: &ExerciseId) -> CoreResult<ExerciseAnalysis> {
        Ok(self.analytics.analyze(&self.get(id)?))
    }

    pub fn analyze_domain(&self, domain: &str) -> CoreResult<DomainAnalysis> {
        let pool = self.repo.load()?;
        Ok(self.analytics.analyze_domain(domain, &pool))
    }

    pub fn analyze_all_domains(&self) -> CoreResult<Vec<DomainAnalysis>> {
        let pool = self.repo.load()?;
        Ok(self.analytics.analyze_all_domains(&pool))
    }

    pub fn insights(&self) -> CoreResult<LearningInsights> {
        let pool = self.repo.load()?;
        Ok(self.analytics.insights(&pool))
    }

    /// Latest reviews of an exercise, newest first.
    pub fn history(&self, id: &ExerciseId, limit: usize) -> CoreResult<Vec<ReviewHistoryEntry>> {
        Ok(self.repo.review_history(id, limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::{StoreError, StoreResult};
    use crate::repository::InMemoryRepository;
    use crate::session::SessionStatus;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 30, 0).unwrap()
    }

    fn new_ex(id: i64, difficulty: u8, created_days_ago: i64) -> Exercise {
        Exercise::new(format!("ex {id}"), "Go", difficulty)
            .with_id(id)
            .with_steps(["read", "write"])
            .created_at(now() - Duration::days(created_days_ago))
    }

    fn due_ex(id: i64) -> Exercise {
        let mut ex = new_ex(id, 2, 30);
        ex.last_reviewed = Some(now() - Duration::days(4));
        ex.interval_days = 2;
        ex.repetitions = 2;
        ex.completed = true;
        ex
    }

    fn not_due_ex(id: i64) -> Exercise {
        let mut ex = new_ex(id, 1, 30);
        ex.last_reviewed = Some(now() - Duration::days(1));
        ex.interval_days = 7;
        ex.repetitions = 3;
        ex.completed = true;
        ex
    }

    fn service(pool: Vec<Exercise>) -> (Arc<FixedClock>, LearningService<InMemoryRepository>) {
        let clock = Arc::new(FixedClock::at(now()));
        let service = LearningService::new(InMemoryRepository::with_exercises(pool), clock.clone());
        (clock, service)
    }

    fn ids(list: &[Exercise]) -> Vec<ExerciseId> {
        list.iter().map(|ex| ex.id.clone()).collect()
    }

    #[test]
    fn test_recommender_priority() {
        let mut a = due_ex(1);
        a.difficulty = 4;
        let (_, service) = service(vec![not_due_ex(4), new_ex(2, 3, 5), a, new_ex(3, 1, 6)]);
        let picked = service.recommend(3).unwrap();
        assert_eq!(ids(&picked), [1, 3, 2].map(ExerciseId::Int));
    }

    #[test]
    fn test_medium_session() {
        let mut pool: Vec<Exercise> = (1..=5).map(|id| new_ex(id, 1, 10 + id)).collect();
        pool.push(due_ex(42));
        let (_, service) = service(pool);

        let plan = service.build_session_for("medium").unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.exercise_ids[0], ExerciseId::Int(42));
        assert_eq!(plan.estimated_duration, Duration::minutes(25));
        assert_eq!(plan.breaks, vec![Duration::minutes(12)]);

        assert!(matches!(
            service.build_session_for("sleepy"),
            Err(CoreError::InvalidEnergy(_))
        ));
    }

    #[test]
    fn test_review_persists_and_logs() {
        let (clock, service) = service(vec![new_ex(1, 2, 3)]);
        let id = ExerciseId::Int(1);

        let outcome = service.review(&id, Rating::Easy).unwrap();
        assert_eq!(outcome.exercise.interval_days, 1);
        assert!(outcome.rewards.contains(&RewardEvent::ExerciseCompleted));

        let stored = service.get(&id).unwrap();
        assert_eq!(stored, outcome.exercise);
        assert_eq!(stored.next_review_at(), Some(clock.now() + Duration::days(1)));

        clock.advance(Duration::days(2));
        service.review(&id, Rating::Forgotten).unwrap();
        let history = service.history(&id, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].rating, Rating::Forgotten);
        assert_eq!(history[0].state.interval_days, 0);
        assert_eq!(history[1].rating, Rating::Easy);
    }

    #[test]
    fn test_mastery_reward_on_crossing() {
        let mut ex = due_ex(1);
        ex.ease_factor = 2.45;
        let (_, service) = service(vec![ex]);
        // 2.45 -> 67%, 2.60 -> 76%.
        let outcome = service.review(&ExerciseId::Int(1), Rating::Easy).unwrap();
        assert_eq!(
            outcome.rewards,
            vec![RewardEvent::ExerciseCompleted, RewardEvent::Mastery70]
        );
    }

    #[test]
    fn test_invalid_rating_is_noop() {
        let (_, service) = service(vec![due_ex(1)]);
        let id = ExerciseId::Int(1);
        let before = service.get(&id).unwrap();
        assert_eq!(service.review_value(&id, 7).unwrap(), None);
        assert_eq!(service.get(&id).unwrap(), before);
        assert!(service.history(&id, 5).unwrap().is_empty());
    }

    #[test]
    fn test_missing_exercise_is_not_found() {
        let (_, service) = service(vec![]);
        assert!(matches!(
            service.review(&ExerciseId::from("nope"), Rating::Good),
            Err(CoreError::NotFound(ExerciseId::Text(_)))
        ));
    }

    struct BrokenHistory(InMemoryRepository);

    impl ExerciseRepository for BrokenHistory {
        fn load(&self) -> StoreResult<Vec<Exercise>> {
            self.0.load()
        }

        fn save(&self, exercises: &[Exercise]) -> StoreResult<()> {
            self.0.save(exercises)
        }

        fn log_review(&self, _entry: &ReviewHistoryEntry) -> StoreResult<()> {
            Err(StoreError::backend(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        fn review_history(&self, id: &ExerciseId, limit: usize) -> StoreResult<Vec<ReviewHistoryEntry>> {
            self.0.review_history(id, limit)
        }
    }

    #[test]
    fn test_history_failure_does_not_fail_review() {
        let clock = Arc::new(FixedClock::at(now()));
        let repo = BrokenHistory(InMemoryRepository::with_exercises(vec![new_ex(1, 1, 1)]));
        let service = LearningService::new(repo, clock);

        let outcome = service.review(&ExerciseId::Int(1), Rating::Good).unwrap();
        assert!(outcome.exercise.completed);
        assert_eq!(service.get(&ExerciseId::Int(1)).unwrap().repetitions, 1);
    }

    #[test]
    fn test_trash_flow() {
        let (_, service) = service(vec![new_ex(1, 1, 2), new_ex(2, 1, 1)]);
        let id = ExerciseId::Int(1);
        service.soft_delete(&id).unwrap();

        assert_eq!(ids(&service.exercises().unwrap()), [ExerciseId::Int(2)]);
        assert_eq!(ids(&service.trash().unwrap()), [id.clone()]);
        assert!(matches!(service.get(&id), Err(CoreError::NotFound(_))));
        assert!(matches!(service.skip(&id), Err(CoreError::NotFound(_))));
        assert_eq!(ids(&service.recommend(5).unwrap()), [ExerciseId::Int(2)]);

        service.restore(&id).unwrap();
        assert!(service.trash().unwrap().is_empty());
        assert_eq!(service.exercises().unwrap().len(), 2);
    }

    #[test]
    fn test_step_flow() {
        let (_, service) = service(vec![new_ex(1, 1, 2)]);
        let id = ExerciseId::Int(1);

        let first = service.toggle_step(&id, 0).unwrap();
        assert!(first.done);
        assert_eq!(first.reward, Some(RewardEvent::FirstStep));

        let second = service.toggle_step(&id, 1).unwrap();
        assert_eq!(second.reward, Some(RewardEvent::StepCompleted));

        let undone = service.toggle_step(&id, 1).unwrap();
        assert!(!undone.done);
        assert_eq!(undone.reward, None);

        assert!(matches!(
            service.toggle_step(&id, 2),
            Err(CoreError::InvalidStep { index: 2, len: 2 })
        ));
        assert_eq!(service.get(&id).unwrap().completed_steps.len(), 1);
    }

    #[test]
    fn test_skip_uncomplete_and_reset() {
        let (_, service) = service(vec![due_ex(1)]);
        let id = ExerciseId::Int(1);

        let skipped = service.skip(&id).unwrap();
        assert_eq!(skipped.skipped_count, 1);
        assert_eq!(skipped.interval_days, 2);

        let fresh = service.uncomplete(&id).unwrap();
        assert!(fresh.is_new());
        assert_eq!(service.uncomplete(&id).unwrap(), fresh);

        let done = service.mark_done(&id).unwrap();
        assert!(done.completed);
        assert_eq!(done.completed_steps.len(), 2);
        let reset = service.reset(&id).unwrap();
        assert!(!reset.completed);
        assert!(reset.completed_steps.is_empty());
    }

    #[test]
    fn test_add_exercise_validates() {
        let (_, service) = service(vec![]);
        assert!(service.add_exercise(new_ex(1, 9, 0)).is_err());
        service.add_exercise(new_ex(1, 3, 0)).unwrap();
        assert_eq!(service.exercises().unwrap().len(), 1);
    }

    #[test]
    fn test_session_through_service() {
        let (clock, service) = service(vec![due_ex(1), new_ex(2, 1, 3)]);
        let plan = service.build_session(EnergyLevel::Medium).unwrap();
        let mut handle = service.session_handle();
        handle.start(plan).unwrap();

        while let Some(id) = handle.next().unwrap() {
            clock.advance(Duration::minutes(4));
            service.complete_in_session(&mut handle, &id, Rating::Good).unwrap();
        }
        let summary = handle.end().unwrap();
        assert_eq!(summary.status, SessionStatus::Completed);
        assert_eq!(summary.completed.len(), 2);
        assert_eq!(summary.accuracy, 1.0);

        // Reviews went through the repository.
        assert_eq!(service.get(&ExerciseId::Int(2)).unwrap().repetitions, 1);
        assert_eq!(service.history(&ExerciseId::Int(1), 5).unwrap().len(), 1);
    }

    #[test]
    fn test_record_activity() {
        let (clock, service) = service(vec![]);
        let mut streak = StreakTracker::new();
        assert_eq!(service.record_activity(&mut streak), Some(RewardEvent::StreakDay));
        assert_eq!(service.record_activity(&mut streak), None);

        for _ in 0..6 {
            clock.advance(Duration::days(1));
            service.record_activity(&mut streak);
        }
        assert_eq!(streak.current(), 7);

        clock.advance(Duration::days(1));
        assert_eq!(service.record_activity(&mut streak), None);
        clock.advance(Duration::days(3));
        assert_eq!(service.record_activity(&mut streak), Some(RewardEvent::StreakDay));
        assert_eq!(streak.best(), 8);
    }

    #[test]
    fn test_planner_and_analytics_views() {
        let (_, service) = service(vec![due_ex(1), not_due_ex(2), new_ex(3, 1, 1)]);
        let today = now().date_naive();
        assert!(service.reviews_for(today).unwrap().is_empty());
        assert_eq!(ids(&service.upcoming(5).unwrap()), [ExerciseId::Int(2)]);
        assert!(service.overdue().unwrap().is_empty());
        assert_eq!(
            service.month_schedule(2024, 6).unwrap(),
            BTreeMap::from([(1, 1), (9, 1)])
        );

        let insights = service.insights().unwrap();
        assert_eq!(insights.overdue, 1);
        let go = service.analyze_domain("Go").unwrap();
        assert_eq!(go.total, 3);
        assert_eq!(service.analyze_all_domains().unwrap().len(), 1);
        assert_eq!(service.analyze(&ExerciseId::Int(2)).unwrap().interval_days, 7);
        assert_eq!(service.planner_stats().unwrap().week_due, 1);
    }

    #[test]
    fn test_from_config_uses_timer_settings() {
        let config: LearningConfig = toml::from_str(
            r#"
            [timer]
            session_minutes = 30
            "#,
        )
        .unwrap();
        let service = LearningService::from_config(InMemoryRepository::default(), &config);
        let handle = service.session_handle();
        assert_eq!(handle.timer().duration(), Duration::minutes(30));
        assert_eq!(handle.timer().warning(), Duration::minutes(5));

        let default = LearningService::new(InMemoryRepository::default(), Arc::new(FixedClock::at(now())));
        assert_eq!(default.session_handle().timer(), &SessionTimer::default());
    }
}
