//! JSON file backend.
//!
//! Exercises live in one pretty-printed array. The review log sits next to it
//! in `<stem>.history.json`. A missing file reads as empty.

use std::fs;
use std::path::{Path, PathBuf};

use learning_core::{Exercise, ExerciseId, ExerciseRepository, ReviewHistoryEntry, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DbResult;

pub struct JsonFileStore {
    path: PathBuf,
    history_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "exercises".to_string());
        let history_path = path.with_file_name(format!("{stem}.history.json"));
        Self { path, history_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    fn read_list<T: DeserializeOwned>(path: &Path) -> DbResult<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    // Written to a sibling temp file first so a crash never leaves half a file.
    fn write_list<T: Serialize>(path: &Path, items: &[T]) -> DbResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(items)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn read_exercises(&self) -> DbResult<Vec<Exercise>> {
        Self::read_list(&self.path)
    }

    pub fn write_exercises(&self, exercises: &[Exercise]) -> DbResult<()> {
        Self::write_list(&self.path, exercises)?;
        tracing::debug!(path = %self.path.display(), count = exercises.len(), "exercises written");
        Ok(())
    }

    pub fn read_history(&self) -> DbResult<Vec<ReviewHistoryEntry>> {
        Self::read_list(&self.history_path)
    }
}

impl ExerciseRepository for JsonFileStore {
    fn load(&self) -> StoreResult<Vec<Exercise>> {
        Ok(self.read_exercises()?)
    }

    fn save(&self, exercises: &[Exercise]) -> StoreResult<()> {
        Ok(self.write_exercises(exercises)?)
    }

    fn log_review(&self, entry: &ReviewHistoryEntry) -> StoreResult<()> {
        let mut history = self.read_history()?;
        history.push(entry.clone());
        Ok(Self::write_list(&self.history_path, &history)?)
    }

    fn review_history(&self, id: &ExerciseId, limit: usize) -> StoreResult<Vec<ReviewHistoryEntry>> {
        let mut entries: Vec<ReviewHistoryEntry> = self
            .read_history()?
            .into_iter()
            .filter(|entry| &entry.exercise_id == id)
            .collect();
        entries.sort_by_key(|entry| entry.reviewed_at);
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use learning_core::{Rating, StoreError};
    use serde_json::Value;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 14, 7, 0, 0).unwrap()
    }

    fn sample(id: i64) -> Exercise {
        Exercise::new(format!("Exercise {id}"), "Algorithmes", 3)
            .with_id(id)
            .with_steps(["lire", "coder"])
            .created_at(now())
    }

    #[test]
    fn test_missing_file_is_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = JsonFileStore::new(dir.path().join("exercises.json"));
        assert!(store.load()?.is_empty());
        assert!(store.review_history(&ExerciseId::Int(1), 5)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_save_load_and_update() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = JsonFileStore::new(dir.path().join("data").join("exercises.json"));
        store.save(&[sample(1), sample(2)])?;

        let mut second = store.get_by_id(&ExerciseId::Int(2))?;
        second.completed = true;
        store.update(&second)?;
        assert!(store.load()?[1].completed);
        assert!(matches!(store.update(&sample(3)), Err(StoreError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_file_uses_wire_format() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("exercises.json");
        let store = JsonFileStore::new(&path);
        let mut ex = sample(1);
        ex.last_reviewed = Some(now());
        ex.interval_days = 2;
        store.save(&[ex])?;

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(raw[0]["id"], 1);
        assert_eq!(raw[0]["intervalDays"], 2);
        assert_eq!(raw[0]["nextReviewAt"], "2024-09-16T07:00:00Z");
        Ok(())
    }

    #[test]
    fn test_history_sibling_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = JsonFileStore::new(dir.path().join("coach.json"));
        assert_eq!(store.history_path(), dir.path().join("coach.history.json"));

        let ex = sample(4);
        store.log_review(&ReviewHistoryEntry::after_review(&ex, Rating::Hard, now()))?;
        store.log_review(&ReviewHistoryEntry::after_review(
            &ex,
            Rating::Easy,
            now() + Duration::days(1),
        ))?;
        let history = store.review_history(&ExerciseId::Int(4), 10)?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].rating, Rating::Easy);
        Ok(())
    }
}
