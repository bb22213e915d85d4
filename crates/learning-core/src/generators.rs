//! Proptest strategies for exercises and ratings, with the properties the
//! scheduling and mutation code must hold for any input.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use crate::actions;
use crate::clock::{Clock, FixedClock};
use crate::models::{Exercise, Rating, MAX_EASE, MIN_EASE};
use crate::scheduler::Scheduler;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub fn rating() -> impl Strategy<Value = Rating> {
    prop::sample::select(Rating::ALL.to_vec())
}

/// Exercises in any reachable scheduling state, including out-of-range ease.
pub fn exercise() -> impl Strategy<Value = Exercise> {
    (
        0.5f64..4.0,
        0u32..400,
        0u32..50,
        prop::option::of(0i64..365),
        1usize..6,
        any::<bool>(),
    )
        .prop_map(|(ease, interval, reps, reviewed_days_ago, steps, completed)| {
            let mut ex = Exercise::new("prop", "Go", 3)
                .with_id(1)
                .with_steps((0..steps).map(|i| format!("step {i}")))
                .created_at(base_time() - Duration::days(400));
            ex.ease_factor = ease;
            ex.interval_days = interval;
            ex.repetitions = reps;
            ex.completed = completed;
            ex.last_reviewed = reviewed_days_ago.map(|d| base_time() - Duration::days(d));
            ex
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> Scheduler {
        Scheduler::new(Arc::new(FixedClock::at(base_time())))
    }

    proptest! {
        #[test]
        fn test_review_keeps_ease_in_range(mut ex in exercise(), ratings in prop::collection::vec(rating(), 1..20)) {
            let scheduler = scheduler();
            for rating in ratings {
                let schedule = scheduler.review(&mut ex, rating);
                prop_assert!(schedule.ease_factor >= MIN_EASE && schedule.ease_factor <= MAX_EASE);
                prop_assert_eq!(schedule.interval_days == 0, rating == Rating::Forgotten);
                prop_assert_eq!(ex.completed, rating != Rating::Forgotten);
            }
        }

        #[test]
        fn test_next_review_follows_last_review(mut ex in exercise(), rating in rating()) {
            let scheduler = scheduler();
            let reps = ex.repetitions;
            scheduler.review(&mut ex, rating);
            let now = scheduler.clock().now();
            prop_assert_eq!(ex.last_reviewed, Some(now));
            prop_assert_eq!(
                ex.next_review_at(),
                Some(now + Duration::days(i64::from(ex.interval_days)))
            );
            prop_assert_eq!(ex.repetitions, reps + 1);
        }

        #[test]
        fn test_toggle_twice_is_identity(mut ex in exercise(), index in 0usize..6) {
            let before = ex.completed_steps.clone();
            let first = actions::toggle_step(&mut ex, index, base_time());
            if index >= ex.steps.len() {
                prop_assert!(first.is_err());
            } else {
                actions::toggle_step(&mut ex, index, base_time()).unwrap();
            }
            prop_assert_eq!(ex.completed_steps, before);
        }

        #[test]
        fn test_uncomplete_is_idempotent(mut ex in exercise()) {
            actions::uncomplete(&mut ex);
            let once = ex.clone();
            actions::uncomplete(&mut ex);
            prop_assert!(scheduler().is_due(&once));
            prop_assert_eq!(ex, once);
        }

        #[test]
        fn test_days_until_review_matches_due(ex in exercise()) {
            let scheduler = scheduler();
            if !scheduler.is_due(&ex) {
                prop_assert!(scheduler.days_until_review(&ex) <= ex.interval_days);
            }
        }
    }
}
