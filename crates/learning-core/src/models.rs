//! Data models for the learning core.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ease factor given to new and reset exercises.
pub const DEFAULT_EASE: f64 = 2.5;
/// Lowest ease factor an exercise can reach.
pub const MIN_EASE: f64 = 1.3;
/// Highest ease factor an exercise can reach.
pub const MAX_EASE: f64 = 3.0;

/// Longest interval the scheduler hands out, about a century.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Clamp an ease factor into `[MIN_EASE, MAX_EASE]`.
pub fn clamp_ease(ease: f64) -> f64 {
    if ease.is_nan() {
        return DEFAULT_EASE;
    }
    ease.clamp(MIN_EASE, MAX_EASE)
}

/// Exercise identifier. Integer and string ids are both accepted and kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExerciseId {
    Int(i64),
    Text(String),
}

impl ExerciseId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self::Text(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ExerciseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ExerciseId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<i32> for ExerciseId {
    fn from(id: i32) -> Self {
        Self::Int(i64::from(id))
    }
}

impl From<&str> for ExerciseId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for ExerciseId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

/// User rating after working through an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Rating {
    /// Could not recall; review again today.
    Forgotten,
    /// Recalled with real difficulty.
    Hard,
    /// Normal recall.
    Good,
    /// Effortless recall.
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Self::Forgotten, Self::Hard, Self::Good, Self::Easy];

    /// Parse the 1..=4 wire value. Anything else is `None`.
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Forgotten),
            2 => Some(Self::Hard),
            3 => Some(Self::Good),
            4 => Some(Self::Easy),
            _ => None,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Self::Forgotten => 1,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 4,
        }
    }

    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Forgotten => "Forgotten",
            Self::Hard => "Hard",
            Self::Good => "Good",
            Self::Easy => "Easy",
        }
    }

    /// Whether the rating counts as a successful recall.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Good | Self::Easy)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.value()
    }
}

impl TryFrom<u8> for Rating {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_value(i64::from(value)).ok_or_else(|| format!("rating must be 1-4, got {value}"))
    }
}

/// Spaced-repetition fields captured after a review.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsState {
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
}

/// A small learning exercise scheduled with spaced repetition.
///
/// `next_review_at` is not stored: it is always `last_reviewed + interval_days`
/// and is only materialised on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ExerciseRecord", from = "ExerciseRecord")]
pub struct Exercise {
    pub id: ExerciseId,
    pub title: String,
    pub description: String,
    /// Free-form domain label, e.g. "Go" or "Algorithmes".
    pub domain: String,
    /// 1 (easiest) to 5.
    pub difficulty: u8,
    pub steps: Vec<String>,
    pub content: Option<String>,

    pub completed: bool,
    pub completed_steps: BTreeSet<usize>,

    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub last_reviewed: Option<DateTime<Utc>>,

    pub skipped_count: u32,
    pub last_skipped: Option<DateTime<Utc>>,

    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exercise {
    /// Create a new, never reviewed exercise.
    pub fn new(title: impl Into<String>, domain: impl Into<String>, difficulty: u8) -> Self {
        let now = Utc::now();
        Self {
            id: ExerciseId::generate(),
            title: title.into(),
            description: String::new(),
            domain: domain.into(),
            difficulty,
            steps: Vec::new(),
            content: None,
            completed: false,
            completed_steps: BTreeSet::new(),
            ease_factor: DEFAULT_EASE,
            interval_days: 0,
            repetitions: 0,
            last_reviewed: None,
            skipped_count: 0,
            last_skipped: None,
            deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<ExerciseId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps = steps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set both creation and update timestamps.
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self
    }

    /// Never reviewed.
    pub fn is_new(&self) -> bool {
        self.last_reviewed.is_none()
    }

    /// Canonical due instant: `last_reviewed + interval_days`, unset for new exercises.
    ///
    /// Civil days in a fixed offset are always 24 hours long, so adding whole days
    /// to the instant keeps the local wall time. Saturates at the latest
    /// representable instant instead of overflowing.
    pub fn next_review_at(&self) -> Option<DateTime<Utc>> {
        self.last_reviewed.map(|last| {
            last.checked_add_signed(Duration::days(i64::from(self.interval_days)))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }

    /// Current spaced-repetition fields.
    pub fn srs_state(&self) -> SrsState {
        SrsState {
            ease_factor: self.ease_factor,
            interval_days: self.interval_days,
            repetitions: self.repetitions,
        }
    }
}

/// Review log record, appended after every applied rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewHistoryEntry {
    pub id: Uuid,
    pub exercise_id: ExerciseId,
    pub reviewed_at: DateTime<Utc>,
    pub rating: Rating,
    #[serde(flatten)]
    pub state: SrsState,
}

impl ReviewHistoryEntry {
    /// Record the post-review state of an exercise.
    pub fn after_review(exercise: &Exercise, rating: Rating, reviewed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            exercise_id: exercise.id.clone(),
            reviewed_at,
            rating,
            state: exercise.srs_state(),
        }
    }
}

/// Wire shape of an exercise (camelCase, RFC-3339 timestamps).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseRecord {
    pub id: ExerciseId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub domain: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub completed_steps: Vec<usize>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub last_reviewed: Option<DateTime<Utc>>,
    /// Derived on output, ignored on input.
    #[serde(default)]
    pub next_review_at: Option<DateTime<Utc>>,
    #[serde(default = "default_ease")]
    pub ease_factor: f64,
    #[serde(default)]
    pub interval_days: u32,
    #[serde(default)]
    pub repetitions: u32,
    #[serde(default)]
    pub skipped_count: u32,
    #[serde(default)]
    pub last_skipped: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_difficulty() -> u8 {
    1
}

fn default_ease() -> f64 {
    DEFAULT_EASE
}

impl From<Exercise> for ExerciseRecord {
    fn from(ex: Exercise) -> Self {
        let next_review_at = ex.next_review_at();
        Self {
            id: ex.id,
            title: ex.title,
            description: ex.description,
            domain: ex.domain,
            difficulty: ex.difficulty,
            steps: ex.steps,
            completed_steps: ex.completed_steps.into_iter().collect(),
            content: ex.content,
            completed: ex.completed,
            last_reviewed: ex.last_reviewed,
            next_review_at,
            ease_factor: ex.ease_factor,
            interval_days: ex.interval_days,
            repetitions: ex.repetitions,
            skipped_count: ex.skipped_count,
            last_skipped: ex.last_skipped,
            deleted: ex.deleted,
            deleted_at: ex.deleted_at,
            created_at: ex.created_at,
            updated_at: ex.updated_at,
        }
    }
}

impl From<ExerciseRecord> for Exercise {
    /// Out-of-range completed steps are dropped and the ease factor and interval
    /// are clamped, so a loaded exercise always satisfies the model invariants.
    fn from(record: ExerciseRecord) -> Self {
        let step_count = record.steps.len();
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            domain: record.domain,
            difficulty: record.difficulty,
            completed_steps: record
                .completed_steps
                .into_iter()
                .filter(|&i| i < step_count)
                .collect(),
            steps: record.steps,
            content: record.content,
            completed: record.completed,
            last_reviewed: record.last_reviewed,
            ease_factor: clamp_ease(record.ease_factor),
            interval_days: record.interval_days.min(MAX_INTERVAL_DAYS),
            repetitions: record.repetitions,
            skipped_count: record.skipped_count,
            last_skipped: record.last_skipped,
            deleted: record.deleted,
            deleted_at: record.deleted_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
