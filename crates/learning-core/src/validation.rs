//! Input checks for exercises created by hosts.

use crate::error::{CoreError, CoreResult};
use crate::models::Exercise;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 5;

/// Check the user-supplied fields of a new or edited exercise.
pub fn validate_exercise(exercise: &Exercise) -> CoreResult<()> {
    let title = exercise.title.trim();
    if title.is_empty() {
        return Err(CoreError::InvalidArgument("title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(CoreError::InvalidArgument(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    if exercise.domain.trim().is_empty() {
        return Err(CoreError::InvalidArgument("domain is required".into()));
    }
    if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&exercise.difficulty) {
        return Err(CoreError::InvalidArgument(format!(
            "difficulty must be between {MIN_DIFFICULTY} and {MAX_DIFFICULTY}, got {}",
            exercise.difficulty
        )));
    }
    if let Some(&index) = exercise
        .completed_steps
        .iter()
        .find(|&&i| i >= exercise.steps.len())
    {
        return Err(CoreError::InvalidStep {
            index,
            len: exercise.steps.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_exercise() {
        let ex = Exercise::new("Two pointers", "Algorithmes", 3).with_steps(["a"]);
        assert!(validate_exercise(&ex).is_ok());
    }

    #[test]
    fn test_rejections() {
        let blank = Exercise::new("   ", "Go", 1);
        assert!(matches!(validate_exercise(&blank), Err(CoreError::InvalidArgument(_))));

        let long = Exercise::new("é".repeat(201), "Go", 1);
        assert!(validate_exercise(&long).is_err());
        let exact = Exercise::new("é".repeat(200), "Go", 1);
        assert!(validate_exercise(&exact).is_ok());

        assert!(validate_exercise(&Exercise::new("t", "", 1)).is_err());
        assert!(validate_exercise(&Exercise::new("t", "Go", 0)).is_err());
        assert!(validate_exercise(&Exercise::new("t", "Go", 6)).is_err());

        let mut bad_step = Exercise::new("t", "Go", 2).with_steps(["only"]);
        bad_step.completed_steps.insert(4);
        assert!(matches!(
            validate_exercise(&bad_step),
            Err(CoreError::InvalidStep { index: 4, len: 1 })
        ));
    }
}
