//! Picks what to study next.

use serde::{Deserialize, Serialize};

use crate::models::Exercise;
use crate::scheduler::Scheduler;

/// Default cap applied to a focus-mode limit.
pub const DEFAULT_FOCUS_CAP: usize = 3;

/// Display priority of a single exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Overdue,
    DueToday,
    New,
    Upcoming,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Overdue => "🔴 En retard",
            Self::DueToday => "🟡 Aujourd'hui",
            Self::New => "🆕 Nouveau",
            Self::Upcoming => "🟢 À venir",
        }
    }
}

/// Orders a pool of exercises into "what next".
#[derive(Clone)]
pub struct Recommender {
    scheduler: Scheduler,
    focus_cap: usize,
}

impl Recommender {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            focus_cap: DEFAULT_FOCUS_CAP,
        }
    }

    pub fn with_focus_cap(mut self, focus_cap: usize) -> Self {
        self.focus_cap = focus_cap;
        self
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Class of an exercise, `None` when it should not be recommended.
    ///
    /// Class 0 holds reviews that are due, class 1 exercises that were never
    /// finished. Completed exercises that are not due are left out.
    fn class(&self, exercise: &Exercise) -> Option<u8> {
        if exercise.deleted {
            return None;
        }
        if self.is_due_review(exercise) {
            Some(0)
        } else if !exercise.completed {
            Some(1)
        } else {
            None
        }
    }

    /// A due exercise that has been worked on before (reviewed or completed).
    pub fn is_due_review(&self, exercise: &Exercise) -> bool {
        !exercise.deleted
            && self.scheduler.is_due(exercise)
            && (!exercise.is_new() || exercise.completed)
    }

    /// Up to `limit` exercises: due reviews first, then unfinished ones, the
    /// easiest first within each class. Pool order breaks remaining ties.
    pub fn recommend<'a>(&self, pool: &'a [Exercise], limit: usize) -> Vec<&'a Exercise> {
        let mut ranked: Vec<(u8, &Exercise)> = pool
            .iter()
            .filter_map(|ex| self.class(ex).map(|class| (class, ex)))
            .collect();
        ranked.sort_by_key(|(class, ex)| (*class, ex.difficulty));
        ranked.into_iter().take(limit).map(|(_, ex)| ex).collect()
    }

    /// The single exercise to do right now, if any.
    ///
    /// Scans the pool in order for an overdue review, then one due today,
    /// then anything unfinished.
    pub fn next_focus<'a>(&self, pool: &'a [Exercise]) -> Option<&'a Exercise> {
        let now = self.scheduler.now();
        let clock = self.scheduler.clock();
        let today = clock.today();
        let live = || pool.iter().filter(|ex| !ex.deleted);

        live()
            .find(|ex| ex.next_review_at().is_some_and(|next| next < now))
            .or_else(|| {
                live().find(|ex| {
                    ex.next_review_at()
                        .is_some_and(|next| clock.civil_date(next) == today)
                })
            })
            .or_else(|| live().find(|ex| !ex.completed))
    }

    /// Focus mode: never more than one exercise, whatever the limit.
    pub fn focus<'a>(&self, pool: &'a [Exercise], limit: usize) -> Vec<&'a Exercise> {
        let limit = limit.min(self.focus_cap).min(1);
        self.next_focus(pool).into_iter().take(limit).collect()
    }

    pub fn priority(&self, exercise: &Exercise) -> Priority {
        let Some(next) = exercise.next_review_at() else {
            return Priority::New;
        };
        let clock = self.scheduler.clock();
        let due_date = clock.civil_date(next);
        let today = clock.today();
        if due_date < today {
            Priority::Overdue
        } else if due_date == today {
            Priority::DueToday
        } else {
            Priority::Upcoming
        }
    }

    pub fn priority_label(&self, exercise: &Exercise) -> &'static str {
        self.priority(exercise).label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 14, 0, 0).unwrap()
    }

    fn recommender() -> Recommender {
        Recommender::new(Scheduler::new(Arc::new(FixedClock::at(now()))))
    }

    fn new_ex(id: i64, difficulty: u8) -> Exercise {
        Exercise::new(format!("ex {id}"), "Go", difficulty)
            .with_id(id)
            .created_at(now() - Duration::days(10))
    }

    fn reviewed_ex(id: i64, difficulty: u8, days_ago: i64, interval: u32) -> Exercise {
        let mut ex = new_ex(id, difficulty);
        ex.last_reviewed = Some(now() - Duration::days(days_ago));
        ex.interval_days = interval;
        ex.repetitions = 1;
        ex.completed = true;
        ex
    }

    fn ids(list: &[&Exercise]) -> Vec<String> {
        list.iter().map(|ex| ex.id.to_string()).collect()
    }

    #[test]
    fn test_priority_order() {
        let a = reviewed_ex(1, 4, 5, 2);
        let b = new_ex(2, 3);
        let c = new_ex(3, 1);
        let d = reviewed_ex(4, 1, 1, 10);
        let pool = vec![d, b, a, c];

        let picked = recommender().recommend(&pool, 3);
        assert_eq!(ids(&picked), ["1", "3", "2"]);
    }

    #[test]
    fn test_due_sorted_by_difficulty_and_truncated() {
        let pool = vec![
            reviewed_ex(1, 5, 9, 1),
            reviewed_ex(2, 2, 9, 1),
            new_ex(3, 1),
            reviewed_ex(4, 2, 9, 1),
        ];
        let picked = recommender().recommend(&pool, 2);
        // Stable: id 2 stays ahead of id 4.
        assert_eq!(ids(&picked), ["2", "4"]);
        assert!(recommender().recommend(&pool, 0).is_empty());
    }

    #[test]
    fn test_deleted_never_recommended() {
        let mut gone = new_ex(1, 1);
        gone.deleted = true;
        let pool = vec![gone, new_ex(2, 5)];
        assert_eq!(ids(&recommender().recommend(&pool, 5)), ["2"]);
        assert_eq!(ids(&recommender().focus(&pool, 3)), ["2"]);
    }

    #[test]
    fn test_focus_order() {
        let rec = recommender();
        let fresh = new_ex(1, 1);
        let mut due_today = reviewed_ex(2, 1, 1, 1);
        due_today.last_reviewed = Some(now() - Duration::days(1) + Duration::hours(2));
        let overdue = reviewed_ex(3, 1, 4, 2);

        let pool = vec![fresh.clone(), due_today.clone(), overdue];
        assert_eq!(ids(&rec.focus(&pool, 3)), ["3"]);

        let pool = vec![fresh.clone(), due_today];
        assert_eq!(ids(&rec.focus(&pool, 3)), ["2"]);

        let pool = vec![reviewed_ex(4, 1, 0, 20), fresh];
        assert_eq!(ids(&rec.focus(&pool, 3)), ["1"]);
    }

    #[test]
    fn test_focus_returns_at_most_one() {
        let pool: Vec<_> = (1..=5).map(|id| new_ex(id, 2)).collect();
        let rec = recommender();
        assert_eq!(rec.focus(&pool, 10).len(), 1);
        assert!(rec.focus(&pool, 0).is_empty());
        assert!(rec.focus(&[reviewed_ex(1, 1, 0, 30)], 3).is_empty());
    }

    #[test]
    fn test_priority_labels() {
        let rec = recommender();
        assert_eq!(rec.priority(&new_ex(1, 1)), Priority::New);
        assert_eq!(rec.priority(&reviewed_ex(2, 1, 3, 1)), Priority::Overdue);
        assert_eq!(rec.priority(&reviewed_ex(3, 1, 1, 1)), Priority::DueToday);
        assert_eq!(rec.priority(&reviewed_ex(4, 1, 1, 5)), Priority::Upcoming);
        assert_eq!(rec.priority_label(&reviewed_ex(4, 1, 1, 5)), "🟢 À venir");
    }
}
