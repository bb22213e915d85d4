//! SQLite backend.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use learning_core::models::{clamp_ease, MAX_INTERVAL_DAYS};
use learning_core::{
    Exercise, ExerciseId, ExerciseRepository, Rating, ReviewHistoryEntry, SrsState, StoreResult,
};
use rusqlite::types::{Type, Value, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const EXERCISE_COLUMNS: &str = "id, title, description, domain, difficulty, steps, completed_steps, \
     content, completed, ease_factor, interval_days, repetitions, last_reviewed, skipped_count, \
     last_skipped, deleted, deleted_at, created_at, updated_at";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        tracing::debug!(path = %path.display(), "opened exercise database");
        Ok(db)
    }

    pub fn in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    // `id` has no declared type so integer and text ids keep their storage class.
    fn init(&self) -> DbResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS exercises (
                id PRIMARY KEY NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                domain TEXT NOT NULL,
                difficulty INTEGER NOT NULL,
                steps TEXT NOT NULL DEFAULT '[]',
                completed_steps TEXT NOT NULL DEFAULT '[]',
                content TEXT,
                completed INTEGER NOT NULL DEFAULT 0,
                ease_factor REAL NOT NULL,
                interval_days INTEGER NOT NULL DEFAULT 0,
                repetitions INTEGER NOT NULL DEFAULT 0,
                last_reviewed TEXT,
                skipped_count INTEGER NOT NULL DEFAULT 0,
                last_skipped TEXT,
                deleted INTEGER NOT NULL DEFAULT 0,
                deleted_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS review_history (
                id TEXT PRIMARY KEY,
                exercise_id NOT NULL,
                reviewed_at TEXT NOT NULL,
                rating INTEGER NOT NULL,
                ease_factor REAL NOT NULL,
                interval_days INTEGER NOT NULL,
                repetitions INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_exercise
                ON review_history(exercise_id, reviewed_at);
            "#,
        )?;
        Ok(())
    }

    // Exercise operations

    /// Every exercise in insertion order.
    pub fn list_exercises(&self) -> DbResult<Vec<Exercise>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {EXERCISE_COLUMNS} FROM exercises ORDER BY rowid"))?;
        let exercises = stmt
            .query_map([], parse_exercise_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(exercises)
    }

    pub fn get_exercise(&self, id: &ExerciseId) -> DbResult<Option<Exercise>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = ?1"))?;
        let exercise = stmt
            .query_row(params![id_value(id)], parse_exercise_row)
            .optional()?;
        Ok(exercise)
    }

    /// Insert an exercise, replacing any row with the same id.
    pub fn insert_exercise(&self, exercise: &Exercise) -> DbResult<()> {
        insert_row(&self.conn, exercise)
    }

    pub fn update_exercise(&self, exercise: &Exercise) -> DbResult<()> {
        let changed = self.conn.execute(
            "UPDATE exercises SET title = ?2, description = ?3, domain = ?4, difficulty = ?5,
                steps = ?6, completed_steps = ?7, content = ?8, completed = ?9, ease_factor = ?10,
                interval_days = ?11, repetitions = ?12, last_reviewed = ?13, skipped_count = ?14,
                last_skipped = ?15, deleted = ?16, deleted_at = ?17, created_at = ?18,
                updated_at = ?19
             WHERE id = ?1",
            params![
                id_value(&exercise.id),
                exercise.title,
                exercise.description,
                exercise.domain,
                exercise.difficulty,
                serde_json::to_string(&exercise.steps)?,
                serde_json::to_string(&exercise.completed_steps)?,
                exercise.content,
                exercise.completed,
                exercise.ease_factor,
                exercise.interval_days,
                exercise.repetitions,
                exercise.last_reviewed.map(format_time),
                exercise.skipped_count,
                exercise.last_skipped.map(format_time),
                exercise.deleted,
                exercise.deleted_at.map(format_time),
                format_time(exercise.created_at),
                format_time(exercise.updated_at),
            ],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound(exercise.id.clone()));
        }
        Ok(())
    }

    /// Replace the whole table in one transaction.
    pub fn replace_all(&self, exercises: &[Exercise]) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM exercises", [])?;
        for exercise in exercises {
            insert_row(&tx, exercise)?;
        }
        tx.commit()?;
        tracing::debug!(count = exercises.len(), "exercise table rewritten");
        Ok(())
    }

    // History operations

    pub fn insert_review(&self, entry: &ReviewHistoryEntry) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO review_history
                (id, exercise_id, reviewed_at, rating, ease_factor, interval_days, repetitions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id.to_string(),
                id_value(&entry.exercise_id),
                format_time(entry.reviewed_at),
                entry.rating.value(),
                entry.state.ease_factor,
                entry.state.interval_days,
                entry.state.repetitions,
            ],
        )?;
        Ok(())
    }

    /// Latest `limit` reviews of an exercise, newest first.
    pub fn get_reviews(&self, id: &ExerciseId, limit: usize) -> DbResult<Vec<ReviewHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, exercise_id, reviewed_at, rating, ease_factor, interval_days, repetitions
             FROM review_history WHERE exercise_id = ?1
             ORDER BY reviewed_at DESC, rowid DESC LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let reviews = stmt
            .query_map(params![id_value(id), limit], parse_review_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(reviews)
    }
}

impl ExerciseRepository for SqliteStore {
    fn load(&self) -> StoreResult<Vec<Exercise>> {
        Ok(self.list_exercises()?)
    }

    fn save(&self, exercises: &[Exercise]) -> StoreResult<()> {
        Ok(self.replace_all(exercises)?)
    }

    fn get_by_id(&self, id: &ExerciseId) -> StoreResult<Exercise> {
        self.get_exercise(id)?
            .ok_or_else(|| DbError::NotFound(id.clone()).into())
    }

    fn update(&self, exercise: &Exercise) -> StoreResult<()> {
        Ok(self.update_exercise(exercise)?)
    }

    fn insert(&self, exercise: &Exercise) -> StoreResult<()> {
        Ok(self.insert_exercise(exercise)?)
    }

    fn log_review(&self, entry: &ReviewHistoryEntry) -> StoreResult<()> {
        Ok(self.insert_review(entry)?)
    }

    fn review_history(&self, id: &ExerciseId, limit: usize) -> StoreResult<Vec<ReviewHistoryEntry>> {
        Ok(self.get_reviews(id, limit)?)
    }
}

fn insert_row(conn: &Connection, exercise: &Exercise) -> DbResult<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO exercises ({EXERCISE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
        ),
        params![
            id_value(&exercise.id),
            exercise.title,
            exercise.description,
            exercise.domain,
            exercise.difficulty,
            serde_json::to_string(&exercise.steps)?,
            serde_json::to_string(&exercise.completed_steps)?,
            exercise.content,
            exercise.completed,
            exercise.ease_factor,
            exercise.interval_days,
            exercise.repetitions,
            exercise.last_reviewed.map(format_time),
            exercise.skipped_count,
            exercise.last_skipped.map(format_time),
            exercise.deleted,
            exercise.deleted_at.map(format_time),
            format_time(exercise.created_at),
            format_time(exercise.updated_at),
        ],
    )?;
    Ok(())
}

// Fixed-width UTC timestamps at full precision so text ordering matches time
// ordering and values read back unchanged.
fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn id_value(id: &ExerciseId) -> Value {
    match id {
        ExerciseId::Int(n) => Value::Integer(*n),
        ExerciseId::Text(s) => Value::Text(s.clone()),
    }
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_id(row: &rusqlite::Row, idx: usize) -> SqlResult<ExerciseId> {
    match row.get_ref(idx)? {
        ValueRef::Integer(n) => Ok(ExerciseId::Int(n)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| ExerciseId::Text(s.to_string()))
            .map_err(|e| conversion_error(idx, e)),
        other => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "id".to_string(),
            other.data_type(),
        )),
    }
}

fn parse_time(row: &rusqlite::Row, idx: usize) -> SqlResult<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_optional_time(row: &rusqlite::Row, idx: usize) -> SqlResult<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(_) => parse_time(row, idx).map(Some),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> SqlResult<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e))
}

fn parse_exercise_row(row: &rusqlite::Row) -> SqlResult<Exercise> {
    let steps: Vec<String> = parse_json(row, 5)?;
    let completed_steps: Vec<usize> = parse_json(row, 6)?;
    let interval_days: u32 = row.get(10)?;

    Ok(Exercise {
        id: parse_id(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        domain: row.get(3)?,
        difficulty: row.get(4)?,
        completed_steps: completed_steps
            .into_iter()
            .filter(|&i| i < steps.len())
            .collect(),
        steps,
        content: row.get(7)?,
        completed: row.get(8)?,
        ease_factor: clamp_ease(row.get(9)?),
        interval_days: interval_days.min(MAX_INTERVAL_DAYS),
        repetitions: row.get(11)?,
        last_reviewed: parse_optional_time(row, 12)?,
        skipped_count: row.get(13)?,
        last_skipped: parse_optional_time(row, 14)?,
        deleted: row.get(15)?,
        deleted_at: parse_optional_time(row, 16)?,
        created_at: parse_time(row, 17)?,
        updated_at: parse_time(row, 18)?,
    })
}

fn parse_review_row(row: &rusqlite::Row) -> SqlResult<ReviewHistoryEntry> {
    let id: String = row.get(0)?;
    let rating: u8 = row.get(3)?;
    Ok(ReviewHistoryEntry {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        exercise_id: parse_id(row, 1)?,
        reviewed_at: parse_time(row, 2)?,
        rating: Rating::try_from(rating).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, e.into())
        })?,
        state: SrsState {
            ease_factor: row.get(4)?,
            interval_days: row.get(5)?,
            repetitions: row.get(6)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use learning_core::{FixedClock, LearningService, StoreError};
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 18, 45, 12).unwrap()
    }

    fn sample(id: impl Into<ExerciseId>) -> Exercise {
        let mut ex = Exercise::new("Channels", "Go", 2)
            .with_id(id)
            .with_description("buffered and unbuffered")
            .with_steps(["make", "send", "close"])
            .with_content("```go\nch := make(chan int)\n```")
            .created_at(now() - Duration::days(3));
        ex.completed_steps.insert(1);
        ex.last_reviewed = Some(now() - Duration::hours(5));
        ex.interval_days = 3;
        ex.repetitions = 2;
        ex.ease_factor = 2.35;
        ex
    }

    #[test]
    fn test_exercise_crud() {
        let db = SqliteStore::in_memory().unwrap();
        let ex = sample(7);
        db.insert(&ex).unwrap();

        let loaded = db.get_by_id(&ExerciseId::Int(7)).unwrap();
        assert_eq!(loaded, ex);

        let mut renamed = loaded.clone();
        renamed.title = "Select".into();
        renamed.deleted = true;
        renamed.deleted_at = Some(now());
        db.update(&renamed).unwrap();
        assert_eq!(db.load().unwrap(), vec![renamed]);

        assert!(matches!(
            db.get_by_id(&ExerciseId::Int(8)),
            Err(StoreError::NotFound(ExerciseId::Int(8)))
        ));
        assert!(matches!(db.update(&sample(8)), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_integer_and_text_ids_are_distinct() {
        let db = SqliteStore::in_memory().unwrap();
        db.save(&[sample(1), sample("1"), sample("abc")]).unwrap();

        let ids: Vec<ExerciseId> = db.load().unwrap().into_iter().map(|ex| ex.id).collect();
        assert_eq!(
            ids,
            vec![ExerciseId::Int(1), ExerciseId::from("1"), ExerciseId::from("abc")]
        );
        assert_eq!(db.get_by_id(&ExerciseId::from("1")).unwrap().id, ExerciseId::from("1"));
    }

    #[test]
    fn test_save_replaces_everything() {
        let db = SqliteStore::in_memory().unwrap();
        db.save(&[sample(1), sample(2)]).unwrap();
        db.save(&[sample(3)]).unwrap();
        let all = db.load().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, ExerciseId::Int(3));
    }

    #[test]
    fn test_review_history_newest_first() {
        let db = SqliteStore::in_memory().unwrap();
        let ex = sample(1);
        for (hours, rating) in [(0, Rating::Hard), (48, Rating::Good), (24, Rating::Easy)] {
            let entry = ReviewHistoryEntry::after_review(&ex, rating, now() + Duration::hours(hours));
            db.log_review(&entry).unwrap();
        }

        let history = db.review_history(&ExerciseId::Int(1), 2).unwrap();
        let ratings: Vec<Rating> = history.iter().map(|e| e.rating).collect();
        assert_eq!(ratings, [Rating::Good, Rating::Easy]);
        assert_eq!(history[0].state.interval_days, 3);
        assert!(db.review_history(&ExerciseId::Int(2), 5).unwrap().is_empty());
    }

    #[test]
    fn test_reopen_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("coach.db");
        {
            let db = SqliteStore::open(&path)?;
            db.insert_exercise(&sample("persisted"))?;
        }
        let db = SqliteStore::open(&path)?;
        assert_eq!(db.list_exercises()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_service_on_sqlite() {
        let clock = Arc::new(FixedClock::at(now()));
        let service = LearningService::new(SqliteStore::in_memory().unwrap(), clock.clone());
        let ex = service.add_exercise(sample(1)).unwrap();
        assert!(!service.scheduler().is_due(&ex));

        clock.advance(Duration::days(3));
        let outcome = service.review(&ExerciseId::Int(1), Rating::Good).unwrap();
        assert_eq!(outcome.exercise.interval_days, 7);
        assert_eq!(service.get(&ExerciseId::Int(1)).unwrap(), outcome.exercise);
        assert_eq!(service.history(&ExerciseId::Int(1), 10).unwrap().len(), 1);
    }

    #[test]
    fn test_timestamps_keep_nanoseconds() {
        let db = SqliteStore::in_memory().unwrap();
        let mut ex = sample(5);
        let precise = now() + Duration::nanoseconds(123_456_789);
        ex.last_reviewed = Some(precise);
        ex.updated_at = precise;
        db.insert(&ex).unwrap();

        let loaded = db.get_by_id(&ExerciseId::Int(5)).unwrap();
        assert_eq!(loaded.last_reviewed, Some(precise));
        assert_eq!(loaded, ex);
    }

    #[test]
    fn test_oversized_interval_is_capped_on_load() {
        let db = SqliteStore::in_memory().unwrap();
        db.insert(&sample(6)).unwrap();
        db.conn
            .execute("UPDATE exercises SET interval_days = ?1 WHERE id = 6", params![u32::MAX])
            .unwrap();

        let loaded = db.get_by_id(&ExerciseId::Int(6)).unwrap();
        assert_eq!(loaded.interval_days, MAX_INTERVAL_DAYS);
        assert!(loaded.next_review_at().is_some());
    }
}
