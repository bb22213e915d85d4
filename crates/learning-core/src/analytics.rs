//! Mastery and progress analysis.
//!
//! Per-exercise analysis classifies every live exercise as struggling,
//! mastered or needing practice. Domain and global views are aggregates of
//! that classification plus plain ease-factor averages.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::civil_days_between;
use crate::models::{Exercise, ExerciseId, MAX_EASE, MIN_EASE};
use crate::scheduler::Scheduler;

/// Detected difficulty, from ease factor and interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    VeryEasy,
    Easy,
    Medium,
    Hard,
    VeryHard,
}

impl DifficultyLevel {
    /// First matching row wins.
    pub fn detect(ease_factor: f64, interval_days: u32) -> Self {
        match (ease_factor, interval_days) {
            (e, i) if e > 2.8 && i > 30 => Self::VeryEasy,
            (e, i) if e >= 2.5 && i >= 10 => Self::Easy,
            (e, i) if e >= 2.0 && i >= 3 => Self::Medium,
            (e, i) if e >= 1.5 && i >= 1 => Self::Hard,
            _ => Self::VeryHard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn assess(repetitions: u32, ease_factor: f64) -> Self {
        if repetitions < 2 || ease_factor < 1.8 {
            Self::Low
        } else if repetitions >= 5 && ease_factor >= 2.3 {
            Self::High
        } else {
            Self::Medium
        }
    }
}

/// Bucket an analysed exercise falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Struggling,
    Mastered,
    NeedsPractice,
}

/// Ease factor mapped linearly onto 0..=100.
pub fn mastery_percent(ease_factor: f64) -> u8 {
    let pct = (ease_factor - MIN_EASE) / (MAX_EASE - MIN_EASE) * 100.0;
    if pct.is_nan() {
        return 0;
    }
    pct.clamp(0.0, 100.0).floor() as u8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseAnalysis {
    pub exercise_id: ExerciseId,
    pub title: String,
    pub domain: String,
    pub level: DifficultyLevel,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    /// Civil days past the due date; 0 when not overdue.
    pub days_overdue: u32,
    pub mastery: u8,
    pub needs_improvement: bool,
    pub confidence: Confidence,
    pub recommendation: String,
}

impl ExerciseAnalysis {
    pub fn category(&self) -> Category {
        if self.needs_improvement {
            Category::Struggling
        } else if matches!(self.level, DifficultyLevel::VeryEasy | DifficultyLevel::Easy) {
            Category::Mastered
        } else {
            Category::NeedsPractice
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAnalysis {
    pub domain: String,
    pub total: usize,
    pub completed: usize,
    /// Mean ease factor of the domain's exercises.
    pub average_mastery: f64,
    /// `average_mastery` on the 0..=100 scale.
    pub mastery_percent: u8,
    pub average_repetitions: f64,
    pub struggling: usize,
    pub mastered: usize,
    pub needs_practice: usize,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningInsights {
    pub strongest_domain: Option<String>,
    pub weakest_domain: Option<String>,
    pub most_practiced: Option<String>,
    pub overdue: usize,
    /// Fraction (0.0 to 1.0) of exercises with an ease factor above 2.5.
    pub success_rate: f64,
    /// Mean ease factor over live exercises.
    pub average_mastery: f64,
    pub recommend_focus: String,
}

pub struct Analytics {
    scheduler: Scheduler,
}

impl Analytics {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    /// Overdue flag and civil days overdue. Only reviewed exercises with a
    /// non-zero interval can be overdue.
    fn overdue(&self, exercise: &Exercise) -> (bool, u32) {
        if exercise.interval_days == 0 {
            return (false, 0);
        }
        let Some(next) = exercise.next_review_at() else {
            return (false, 0);
        };
        let clock = self.scheduler.clock();
        if clock.now() <= next {
            return (false, 0);
        }
        let days = civil_days_between(clock.civil_date(next), clock.today());
        (true, u32::try_from(days.max(0)).unwrap_or(u32::MAX))
    }

    pub fn analyze(&self, exercise: &Exercise) -> ExerciseAnalysis {
        let ease = exercise.ease_factor;
        let level = DifficultyLevel::detect(ease, exercise.interval_days);
        let (is_overdue, days_overdue) = self.overdue(exercise);
        let needs_improvement = ease < 1.7
            || days_overdue > 5
            || (exercise.repetitions > 15 && ease < 1.8);

        let recommendation = match level {
            DifficultyLevel::VeryEasy => "✓ Bien maîtrisé ! Revoir occasionnellement.".to_string(),
            DifficultyLevel::Easy => {
                "✓ Bon progrès ! Continue à pratiquer occasionnellement.".to_string()
            }
            DifficultyLevel::Medium => "→ Pratique régulière recommandée pour maintenir.".to_string(),
            DifficultyLevel::Hard if exercise.repetitions < 3 => {
                "⚠️ Difficile ! Pratiquer davantage. Continuez !".to_string()
            }
            DifficultyLevel::Hard => "⚠️ Très difficile. Besoin de pratique intensive.".to_string(),
            DifficultyLevel::VeryHard if is_overdue => {
                format!("🔴 URGENT ! En retard de {days_overdue} jours. Revoir MAINTENANT !")
            }
            DifficultyLevel::VeryHard if exercise.repetitions > 10 => format!(
                "🔴 PROBLÉMATIQUE ! Malgré {} révisions, c'est très difficile. \
                 Besoin d'une stratégie différente !",
                exercise.repetitions
            ),
            DifficultyLevel::VeryHard => {
                "🔴 TRÈS DIFFICILE ! Besoin de pratique intensive et d'un rythme plus fréquent."
                    .to_string()
            }
        };

        ExerciseAnalysis {
            exercise_id: exercise.id.clone(),
            title: exercise.title.clone(),
            domain: exercise.domain.clone(),
            level,
            ease_factor: ease,
            interval_days: exercise.interval_days,
            repetitions: exercise.repetitions,
            last_reviewed: exercise.last_reviewed,
            is_overdue,
            days_overdue,
            mastery: mastery_percent(ease),
            needs_improvement,
            confidence: Confidence::assess(exercise.repetitions, ease),
            recommendation,
        }
    }

    fn in_category(&self, pool: &[Exercise], category: Category) -> Vec<ExerciseAnalysis> {
        pool.iter()
            .filter(|ex| !ex.deleted)
            .map(|ex| self.analyze(ex))
            .filter(|a| a.category() == category)
            .collect()
    }

    pub fn struggling(&self, pool: &[Exercise]) -> Vec<ExerciseAnalysis> {
        self.in_category(pool, Category::Struggling)
    }

    pub fn mastered(&self, pool: &[Exercise]) -> Vec<ExerciseAnalysis> {
        self.in_category(pool, Category::Mastered)
    }

    pub fn needs_practice(&self, pool: &[Exercise]) -> Vec<ExerciseAnalysis> {
        self.in_category(pool, Category::NeedsPractice)
    }

    pub fn analyze_domain(&self, domain: &str, pool: &[Exercise]) -> DomainAnalysis {
        let exercises: Vec<&Exercise> = pool
            .iter()
            .filter(|ex| !ex.deleted && ex.domain == domain)
            .collect();

        let mut analysis = DomainAnalysis {
            domain: domain.to_string(),
            total: exercises.len(),
            completed: 0,
            average_mastery: 0.0,
            mastery_percent: 0,
            average_repetitions: 0.0,
            struggling: 0,
            mastered: 0,
            needs_practice: 0,
            recommendation: String::new(),
        };
        if exercises.is_empty() {
            return analysis;
        }

        let mut total_ease = 0.0;
        let mut total_reps = 0.0;
        for ex in &exercises {
            if ex.completed {
                analysis.completed += 1;
            }
            total_ease += ex.ease_factor;
            total_reps += f64::from(ex.repetitions);
            match self.analyze(ex).category() {
                Category::Struggling => analysis.struggling += 1,
                Category::Mastered => analysis.mastered += 1,
                Category::NeedsPractice => analysis.needs_practice += 1,
            }
        }

        let count = exercises.len() as f64;
        analysis.average_mastery = total_ease / count;
        analysis.mastery_percent = mastery_percent(analysis.average_mastery);
        analysis.average_repetitions = total_reps / count;
        analysis.recommendation = if analysis.struggling > 0 {
            format!(
                "⚠️ {} exercices difficiles - Pratiquez plus !",
                analysis.struggling
            )
        } else if analysis.mastered > analysis.total / 2 {
            "✓ Domaine bien maîtrisé !".to_string()
        } else {
            "→ Continuez à pratiquer régulièrement.".to_string()
        };
        analysis
    }

    /// One analysis per live domain, sorted by domain name.
    pub fn analyze_all_domains(&self, pool: &[Exercise]) -> Vec<DomainAnalysis> {
        let domains: BTreeSet<&str> = pool
            .iter()
            .filter(|ex| !ex.deleted)
            .map(|ex| ex.domain.as_str())
            .collect();
        domains
            .into_iter()
            .map(|domain| self.analyze_domain(domain, pool))
            .collect()
    }

    pub fn insights(&self, pool: &[Exercise]) -> LearningInsights {
        let live: Vec<&Exercise> = pool.iter().filter(|ex| !ex.deleted).collect();
        if live.is_empty() {
            return LearningInsights::default();
        }

        let mut insights = LearningInsights::default();
        let mut best = f64::NEG_INFINITY;
        let mut worst = f64::INFINITY;
        let mut most_reps = 0.0;
        for domain in self.analyze_all_domains(pool) {
            if domain.average_mastery > best {
                best = domain.average_mastery;
                insights.strongest_domain = Some(domain.domain.clone());
            }
            if domain.average_mastery < worst {
                worst = domain.average_mastery;
                insights.weakest_domain = Some(domain.domain.clone());
            }
            if domain.average_repetitions > most_reps {
                most_reps = domain.average_repetitions;
                insights.most_practiced = Some(domain.domain.clone());
            }
        }

        let count = live.len() as f64;
        insights.overdue = live
            .iter()
            .filter(|ex| !ex.is_new() && self.scheduler.is_due(ex))
            .count();
        insights.success_rate =
            live.iter().filter(|ex| ex.ease_factor > 2.5).count() as f64 / count;
        insights.average_mastery = live.iter().map(|ex| ex.ease_factor).sum::<f64>() / count;

        insights.recommend_focus = if insights.overdue > 0 {
            format!("🔴 {} exercices en retard - Rattrapez !", insights.overdue)
        } else if let Some(weakest) = &insights.weakest_domain {
            format!(
                "→ Focus sur {} (maîtrise : {}%)",
                weakest,
                mastery_percent(worst)
            )
        } else {
            "✓ Bon travail ! Continuez à pratiquer régulièrement.".to_string()
        };
        insights
    }
}
