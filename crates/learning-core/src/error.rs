//! Error types for the learning core.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::ExerciseId;

/// Failure reported by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("exercise not found: {0}")]
    NotFound(ExerciseId),
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wrap a backend-specific error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("step index {index} out of range (exercise has {len} steps)")]
    InvalidStep { index: usize, len: usize },
    #[error("invalid energy level: {0} (expected low, medium or high)")]
    InvalidEnergy(String),
    #[error("exercise not found: {0}")]
    NotFound(ExerciseId),
    #[error("session is {actual}, expected {expected}")]
    SessionState {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("nothing to study right now")]
    NothingToStudy {
        next_review_at: Option<DateTime<Utc>>,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no config directory available on this platform")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_becomes_core_not_found() {
        let err: CoreError = StoreError::NotFound(ExerciseId::from(7)).into();
        assert!(matches!(err, CoreError::NotFound(ExerciseId::Int(7))));
    }

    #[test]
    fn test_backend_error_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: CoreError = StoreError::backend(io).into();
        match err {
            CoreError::Store(StoreError::Backend(inner)) => {
                assert!(inner.downcast_ref::<std::io::Error>().is_some());
                assert_eq!(inner.to_string(), "disk full");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
