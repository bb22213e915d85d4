//! Calendar views over due reviews.
//!
//! Exercises are bucketed by the civil date of their next review. New
//! exercises have no next review and never appear in a bucket; deleted ones
//! are skipped everywhere.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::models::Exercise;

/// Reviews falling on one civil date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPlan<'a> {
    pub date: NaiveDate,
    /// Hardest first.
    pub exercises: Vec<&'a Exercise>,
    pub total: usize,
    /// Exercises reviewed on that date.
    pub completed: usize,
}

/// Seven daily plans starting on a Monday.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyPlan<'a> {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<DailyPlan<'a>>,
    pub total: usize,
    pub completed: usize,
}

/// Headline numbers for a dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlannerStats {
    pub today_due: usize,
    pub overdue: usize,
    pub week_due: usize,
    pub week_completed: usize,
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub struct Planner {
    clock: Arc<dyn Clock>,
}

impl Planner {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn due_date(&self, exercise: &Exercise) -> Option<NaiveDate> {
        if exercise.deleted {
            return None;
        }
        exercise.next_review_at().map(|next| self.clock.civil_date(next))
    }

    fn reviewed_on(&self, exercise: &Exercise, date: NaiveDate) -> bool {
        !exercise.deleted
            && exercise
                .last_reviewed
                .is_some_and(|at| self.clock.civil_date(at) == date)
    }

    /// Exercises due on `date`, hardest first.
    pub fn reviews_for<'a>(&self, pool: &'a [Exercise], date: NaiveDate) -> Vec<&'a Exercise> {
        let mut reviews: Vec<&Exercise> = pool
            .iter()
            .filter(|ex| self.due_date(ex) == Some(date))
            .collect();
        reviews.sort_by(|a, b| b.difficulty.cmp(&a.difficulty));
        reviews
    }

    /// Unfinished exercises whose review time has passed, oldest first.
    pub fn overdue<'a>(&self, pool: &'a [Exercise]) -> Vec<&'a Exercise> {
        let now = self.clock.now();
        let mut overdue: Vec<(_, &Exercise)> = pool
            .iter()
            .filter(|ex| !ex.deleted && !ex.completed)
            .filter_map(|ex| ex.next_review_at().map(|next| (next, ex)))
            .filter(|(next, _)| *next < now)
            .collect();
        overdue.sort_by_key(|(next, _)| *next);
        overdue.into_iter().map(|(_, ex)| ex).collect()
    }

    /// The next `limit` reviews still ahead, soonest first.
    pub fn upcoming<'a>(&self, pool: &'a [Exercise], limit: usize) -> Vec<&'a Exercise> {
        let now = self.clock.now();
        let mut upcoming: Vec<(_, &Exercise)> = pool
            .iter()
            .filter(|ex| !ex.deleted)
            .filter_map(|ex| ex.next_review_at().map(|next| (next, ex)))
            .filter(|(next, _)| *next > now)
            .collect();
        upcoming.sort_by_key(|(next, _)| *next);
        upcoming.into_iter().take(limit).map(|(_, ex)| ex).collect()
    }

    pub fn daily_plan<'a>(&self, pool: &'a [Exercise], date: NaiveDate) -> DailyPlan<'a> {
        let exercises = self.reviews_for(pool, date);
        let completed = pool.iter().filter(|ex| self.reviewed_on(ex, date)).count();
        DailyPlan {
            date,
            total: exercises.len(),
            exercises,
            completed,
        }
    }

    /// Week containing `date`, Monday to Sunday.
    pub fn weekly_plan<'a>(&self, pool: &'a [Exercise], date: NaiveDate) -> WeeklyPlan<'a> {
        let start = week_start(date);
        let days: Vec<DailyPlan<'a>> = (0..7)
            .map(|offset| self.daily_plan(pool, start + Duration::days(offset)))
            .collect();
        WeeklyPlan {
            start,
            end: start + Duration::days(6),
            total: days.iter().map(|d| d.total).sum(),
            completed: days.iter().map(|d| d.completed).sum(),
            days,
        }
    }

    /// Number of reviews per day of the month. Days without reviews are absent.
    pub fn monthly_plan(
        &self,
        pool: &[Exercise],
        year: i32,
        month: u32,
    ) -> CoreResult<BTreeMap<u32, usize>> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(CoreError::InvalidArgument(format!(
                "invalid month {year}-{month:02}"
            )));
        }
        let mut counts = BTreeMap::new();
        for date in pool.iter().filter_map(|ex| self.due_date(ex)) {
            if date.year() == year && date.month() == month {
                *counts.entry(date.day()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    pub fn stats(&self, pool: &[Exercise]) -> PlannerStats {
        let today = self.clock.today();
        let week = self.weekly_plan(pool, today);
        PlannerStats {
            today_due: self.reviews_for(pool, today).len(),
            overdue: self.overdue(pool).len(),
            week_due: week.total,
            week_completed: week.completed,
        }
    }
}
