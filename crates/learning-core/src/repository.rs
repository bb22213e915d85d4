//! Persistence interface consumed by the core.

use std::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::models::{Exercise, ExerciseId, ReviewHistoryEntry};

/// Storage of exercises and their review log.
///
/// `load` returns every exercise, trashed ones included; filtering is the
/// caller's job. Only `load`, `save`, `log_review` and `review_history` are
/// required; the single-item operations default to a full load and save.
pub trait ExerciseRepository {
    fn load(&self) -> StoreResult<Vec<Exercise>>;

    /// Replace the stored set with `exercises`.
    fn save(&self, exercises: &[Exercise]) -> StoreResult<()>;

    fn get_by_id(&self, id: &ExerciseId) -> StoreResult<Exercise> {
        self.load()?
            .into_iter()
            .find(|ex| &ex.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// Overwrite an existing exercise.
    fn update(&self, exercise: &Exercise) -> StoreResult<()> {
        let mut all = self.load()?;
        let slot = all
            .iter_mut()
            .find(|ex| ex.id == exercise.id)
            .ok_or_else(|| StoreError::NotFound(exercise.id.clone()))?;
        *slot = exercise.clone();
        self.save(&all)
    }

    /// Add a new exercise, replacing any exercise with the same id.
    fn insert(&self, exercise: &Exercise) -> StoreResult<()> {
        let mut all = self.load()?;
        all.retain(|ex| ex.id != exercise.id);
        all.push(exercise.clone());
        self.save(&all)
    }

    /// Append to the review log.
    fn log_review(&self, entry: &ReviewHistoryEntry) -> StoreResult<()>;

    /// Latest `limit` reviews of an exercise, newest first.
    fn review_history(&self, id: &ExerciseId, limit: usize) -> StoreResult<Vec<ReviewHistoryEntry>>;
}

/// Process-local repository.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    exercises: Mutex<Vec<Exercise>>,
    history: Mutex<Vec<ReviewHistoryEntry>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exercises(exercises: Vec<Exercise>) -> Self {
        Self {
            exercises: Mutex::new(exercises),
            history: Mutex::default(),
        }
    }
}

impl ExerciseRepository for InMemoryRepository {
    fn load(&self) -> StoreResult<Vec<Exercise>> {
        Ok(self.exercises.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, exercises: &[Exercise]) -> StoreResult<()> {
        *self.exercises.lock().unwrap_or_else(|e| e.into_inner()) = exercises.to_vec();
        Ok(())
    }

    fn update(&self, exercise: &Exercise) -> StoreResult<()> {
        let mut guard = self.exercises.lock().unwrap_or_else(|e| e.into_inner());
        let slot = guard
            .iter_mut()
            .find(|ex| ex.id == exercise.id)
            .ok_or_else(|| StoreError::NotFound(exercise.id.clone()))?;
        *slot = exercise.clone();
        Ok(())
    }

    fn log_review(&self, entry: &ReviewHistoryEntry) -> StoreResult<()> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        Ok(())
    }

    fn review_history(&self, id: &ExerciseId, limit: usize) -> StoreResult<Vec<ReviewHistoryEntry>> {
        let guard = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<ReviewHistoryEntry> = guard
            .iter()
            .filter(|entry| &entry.exercise_id == id)
            .cloned()
            .collect();
        // Stable sort keeps append order for equal timestamps; reverse puts the
        // most recent append first.
        entries.sort_by_key(|entry| entry.reviewed_at);
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rating;
    use chrono::{Duration, TimeZone, Utc};

    fn sample(id: i64) -> Exercise {
        Exercise::new(format!("ex {id}"), "Go", 1)
            .with_id(id)
            .created_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_get_and_update() {
        let repo = InMemoryRepository::with_exercises(vec![sample(1), sample(2)]);
        let mut ex = repo.get_by_id(&ExerciseId::Int(2)).unwrap();
        ex.title = "renamed".into();
        repo.update(&ex).unwrap();
        assert_eq!(repo.get_by_id(&ExerciseId::Int(2)).unwrap().title, "renamed");

        assert!(matches!(
            repo.get_by_id(&ExerciseId::Int(9)),
            Err(StoreError::NotFound(ExerciseId::Int(9)))
        ));
        assert!(matches!(repo.update(&sample(9)), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let repo = InMemoryRepository::new();
        repo.insert(&sample(1)).unwrap();
        let mut again = sample(1);
        again.difficulty = 4;
        repo.insert(&again).unwrap();
        let all = repo.load().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].difficulty, 4);
    }

    #[test]
    fn test_history_newest_first() {
        let repo = InMemoryRepository::new();
        let ex = sample(1);
        let start = ex.created_at;
        for (offset, rating) in [(0, Rating::Hard), (2, Rating::Good), (1, Rating::Easy)] {
            let entry = ReviewHistoryEntry::after_review(&ex, rating, start + Duration::days(offset));
            repo.log_review(&entry).unwrap();
        }
        repo.log_review(&ReviewHistoryEntry::after_review(&sample(2), Rating::Good, start))
            .unwrap();

        let history = repo.review_history(&ExerciseId::Int(1), 2).unwrap();
        let ratings: Vec<Rating> = history.iter().map(|e| e.rating).collect();
        assert_eq!(ratings, [Rating::Good, Rating::Easy]);
        assert_eq!(repo.review_history(&ExerciseId::Int(1), 10).unwrap().len(), 3);
    }
}
