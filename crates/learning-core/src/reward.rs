//! Encouragement messages shown after small wins.

use serde::{Deserialize, Serialize};

/// Event worth celebrating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardEvent {
    FirstStep,
    StepCompleted,
    ExerciseCompleted,
    StreakDay,
    StreakWeek,
    Mastery50,
    Mastery70,
}

impl RewardEvent {
    pub fn message(&self) -> &'static str {
        match self {
            Self::FirstStep => "💪 C'est parti ! Première étape !",
            Self::StepCompleted => "✓ Étape terminée ! Garde l'élan !",
            Self::ExerciseCompleted => "🔥 Exercice complété !",
            Self::StreakDay => "✓ 1 jour de suite !",
            Self::StreakWeek => "🎯 7 jours ! Inarrêtable !",
            Self::Mastery50 => "📈 50% de maîtrise !",
            Self::Mastery70 => "🏆 Domaine maîtrisé !",
        }
    }

    /// Event for a streak value, if it is a milestone.
    pub fn for_streak(streak: u32) -> Option<Self> {
        match streak {
            1 => Some(Self::StreakDay),
            s if s > 0 && s % 7 == 0 => Some(Self::StreakWeek),
            _ => None,
        }
    }

    /// Highest mastery milestone reached by a percentage.
    pub fn for_mastery(percent: u8) -> Option<Self> {
        match percent {
            70.. => Some(Self::Mastery70),
            50..=69 => Some(Self::Mastery50),
            _ => None,
        }
    }

    /// Event for ticking a step, given how many steps were already done.
    pub fn for_step(previously_completed: usize) -> Self {
        if previously_completed == 0 {
            Self::FirstStep
        } else {
            Self::StepCompleted
        }
    }
}
