//! Common Types and Constants
//!
//! Shared data structures used across all algorithm modules.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Numerical stability epsilon
pub const EPSILON: f64 = 1e-10;

/// Difficulty assumed for questions without enough observations
pub const DEFAULT_DIFFICULTY: f64 = 0.5;

/// Stable external identifier of a question
pub type QuestionId = String;

// ==================== Attempt Types ====================

/// One observed answer event for a question
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub question_id: QuestionId,
    pub is_correct: bool,
    pub timestamp: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn new(
        question_id: impl Into<QuestionId>,
        is_correct: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            is_correct,
            timestamp,
        }
    }
}

/// Attempt record as it arrives from a session log, before validation
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawAttemptRecord {
    pub question_id: QuestionId,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Per-question attempt sequences, ordered by time
pub type AttemptHistory = HashMap<QuestionId, Vec<AttemptRecord>>;

// ==================== Derived State ====================

/// Mastery signal for one question, folded from its attempt sequence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MasteryState {
    /// BKT posterior probability of mastery [0, 1]
    pub mastery_probability: f64,
    /// Correct attempts / total attempts [0, 1]
    pub correct_rate: f64,
    /// Number of attempts folded
    pub attempt_count: u32,
}

/// Spaced-repetition state for one question
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    pub review_count: u32,
    pub last_review_time: Option<DateTime<Utc>>,
    /// Only meaningful once `review_count >= 1`
    pub next_review_time: Option<DateTime<Utc>>,
    /// Memory strength at the moment of the last review [0, 1]
    pub memory_strength: f64,
    pub correct_count: u32,
    pub total_count: u32,
}

/// Review states keyed by question
pub type ReviewBook = HashMap<QuestionId, ReviewState>;

/// Counters the exam UI keeps besides correctness
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub wrong_count: u32,
    pub view_answer_count: u32,
    /// Seconds spent on the question across sessions
    pub total_time: f64,
}

impl UsageStats {
    /// Derive `wrong_count` per question from an attempt history
    pub fn from_history(history: &AttemptHistory) -> HashMap<QuestionId, UsageStats> {
        history
            .iter()
            .filter(|(_, attempts)| !attempts.is_empty())
            .map(|(id, attempts)| {
                let wrong_count = attempts.iter().filter(|a| !a.is_correct).count() as u32;
                (
                    id.clone(),
                    UsageStats {
                        wrong_count,
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    /// Add view-answer and time counters kept elsewhere
    pub fn absorb(&mut self, other: &UsageStats) {
        self.wrong_count += other.wrong_count;
        self.view_answer_count += other.view_answer_count;
        self.total_time += other.total_time;
    }
}

// ==================== Recommendation Types ====================

/// One scored question; higher score means more urgent to practice
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub question_id: QuestionId,
    pub score: f64,
}
