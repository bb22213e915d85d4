//! Configuration for the learning coach.

use std::path::{Path, PathBuf};

use chrono::{Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{offset_from_minutes, SystemClock};
use crate::error::ConfigError;
use crate::scheduler::AdhdSm2;
use crate::timer::SessionTimer;

const APP_NAME: &str = "learning-coach";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Civil time zone, in minutes east of UTC.
    #[serde(default)]
    pub time_zone_offset_minutes: i32,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub recommender: RecommenderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl LearningConfig {
    /// Load from the platform config dir, falling back to defaults.
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", APP_NAME)
            .map(|d| d.config_dir().join("config.toml"))
    }

    /// Configured database path, or the platform default.
    pub fn db_path(&self) -> Option<PathBuf> {
        self.storage.database.clone().or_else(|| {
            directories::ProjectDirs::from("", "", APP_NAME)
                .map(|d| d.data_dir().join("exercises.db"))
        })
    }

    /// Civil offset, UTC when the configured value is out of range.
    pub fn offset(&self) -> FixedOffset {
        offset_from_minutes(self.time_zone_offset_minutes)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn clock(&self) -> SystemClock {
        SystemClock::with_offset(self.offset())
    }

    pub fn to_algorithm(&self) -> AdhdSm2 {
        AdhdSm2 {
            initial_ease: self.scheduler.initial_ease,
            easy_bonus: self.scheduler.easy_bonus,
            easy_ease_delta: self.scheduler.easy_ease_delta,
            hard_ease_delta: self.scheduler.hard_ease_delta,
            forgotten_ease_delta: self.scheduler.forgotten_ease_delta,
        }
    }

    pub fn to_timer(&self) -> SessionTimer {
        SessionTimer::new(
            Duration::minutes(i64::from(self.timer.session_minutes)),
            Duration::minutes(i64::from(self.timer.warning_minutes)),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_initial_ease")]
    pub initial_ease: f64,
    #[serde(default = "default_easy_bonus")]
    pub easy_bonus: f64,
    #[serde(default = "default_easy_ease_delta")]
    pub easy_ease_delta: f64,
    #[serde(default = "default_hard_ease_delta")]
    pub hard_ease_delta: f64,
    #[serde(default = "default_forgotten_ease_delta")]
    pub forgotten_ease_delta: f64,
}

fn default_initial_ease() -> f64 { 2.5 }
fn default_easy_bonus() -> f64 { 1.1 }
fn default_easy_ease_delta() -> f64 { 0.15 }
fn default_hard_ease_delta() -> f64 { -0.10 }
fn default_forgotten_ease_delta() -> f64 { -0.20 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            easy_bonus: 1.1,
            easy_ease_delta: 0.15,
            hard_ease_delta: -0.10,
            forgotten_ease_delta: -0.20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_session_minutes")]
    pub session_minutes: u32,
    #[serde(default = "default_warning_minutes")]
    pub warning_minutes: u32,
}

fn default_session_minutes() -> u32 { 15 }
fn default_warning_minutes() -> u32 { 5 }

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            session_minutes: 15,
            warning_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Largest limit honoured by focus mode.
    #[serde(default = "default_focus_cap")]
    pub focus_cap: usize,
}

fn default_focus_cap() -> usize { 3 }

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self { focus_cap: 3 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub database: Option<PathBuf>,
}
