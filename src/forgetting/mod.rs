//! Forgetting Curve - spaced-repetition scheduling
//!
//! Memory model:
//! - Strength decays exponentially with whole days since the last review:
//!   base = e^(−decay_rate × days)
//! - Repeated reviews raise the ceiling:
//!   review_factor = 1 − e^(−0.5 × review_count)
//! - strength = base × (0.7 + 0.3 × review_factor)
//!
//! Scheduling uses a fixed day table indexed by the review count; counts past
//! the end of the table reuse the last interval.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::sanitize::{require_intervals, require_non_negative};
use crate::types::{AttemptHistory, QuestionId, ReviewBook, ReviewState};

// ==================== Constants ====================

/// Default forgetting rate per day
const DEFAULT_DECAY_RATE: f64 = 0.1;

/// Default review intervals in days
const DEFAULT_REVIEW_INTERVALS: [u32; 6] = [1, 2, 4, 7, 15, 30];

/// Weight of review history on the strength ceiling
const REVIEW_FACTOR_RATE: f64 = 0.5;

/// Strength floor contributed by recency alone
const RECENCY_SHARE: f64 = 0.7;

// ==================== Parameters ====================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgettingParams {
    pub decay_rate: f64,
    /// Day intervals indexed by review count
    pub review_intervals: Vec<u32>,
}

impl Default for ForgettingParams {
    fn default() -> Self {
        Self {
            decay_rate: DEFAULT_DECAY_RATE,
            review_intervals: DEFAULT_REVIEW_INTERVALS.to_vec(),
        }
    }
}

impl ForgettingParams {
    pub fn validate(&self) -> Result<()> {
        require_non_negative("decay_rate", self.decay_rate)?;
        require_intervals(&self.review_intervals)
    }
}

// ==================== Scheduler ====================

#[derive(Clone, Debug)]
pub struct ReviewScheduler {
    params: ForgettingParams,
}

impl Default for ReviewScheduler {
    fn default() -> Self {
        Self {
            params: ForgettingParams::default(),
        }
    }
}

impl ReviewScheduler {
    pub fn new(params: ForgettingParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ForgettingParams {
        &self.params
    }

    /// Memory strength in [0, 1]; 0 for questions never reviewed
    pub fn memory_strength(
        &self,
        last_review_time: Option<DateTime<Utc>>,
        review_count: u32,
        now: DateTime<Utc>,
    ) -> f64 {
        let Some(last) = last_review_time else {
            return 0.0;
        };
        if review_count == 0 {
            return 0.0;
        }

        // whole days, a review stamped in the future counts as today
        let days = (now - last).num_days().max(0) as f64;
        let base = (-self.params.decay_rate * days).exp();
        let review_factor = 1.0 - (-(review_count as f64) * REVIEW_FACTOR_RATE).exp();

        (base * (RECENCY_SHARE + (1.0 - RECENCY_SHARE) * review_factor)).clamp(0.0, 1.0)
    }

    /// Interval in days for a given review count
    pub fn interval_days(&self, review_count: u32) -> u32 {
        let intervals = &self.params.review_intervals;
        let index = (review_count as usize).min(intervals.len().saturating_sub(1));
        intervals.get(index).copied().unwrap_or_default()
    }

    /// Saturates at the latest representable instant instead of overflowing
    pub fn next_review_time(&self, review_count: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(Duration::days(i64::from(self.interval_days(review_count))))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Record one review outcome; the only mutator of a [`ReviewBook`]
    pub fn record_review<'a>(
        &self,
        question_id: &str,
        is_correct: bool,
        now: DateTime<Utc>,
        book: &'a mut ReviewBook,
    ) -> &'a ReviewState {
        let state = book.entry(question_id.to_string()).or_default();

        state.review_count += 1;
        state.total_count += 1;
        if is_correct {
            state.correct_count += 1;
        }
        state.last_review_time = Some(now);
        state.next_review_time = Some(self.next_review_time(state.review_count, now));
        state.memory_strength =
            self.memory_strength(state.last_review_time, state.review_count, now);

        debug!(
            question_id = %question_id,
            review_count = state.review_count,
            memory_strength = state.memory_strength,
            "review recorded"
        );
        state
    }

    /// Record one review per attempt, each stamped with the attempt's own time
    pub fn replay(&self, history: &AttemptHistory, book: &mut ReviewBook) {
        for (id, attempts) in history {
            let mut ordered: Vec<_> = attempts.iter().collect();
            ordered.sort_by_key(|a| a.timestamp);
            for attempt in ordered {
                self.record_review(id, attempt.is_correct, attempt.timestamp, book);
            }
        }
    }

    /// Strength of a stored state as of `now`
    pub fn current_strength(&self, state: &ReviewState, now: DateTime<Utc>) -> f64 {
        self.memory_strength(state.last_review_time, state.review_count, now)
    }

    /// Questions whose next review is due, most overdue first
    pub fn due_questions(&self, book: &ReviewBook, now: DateTime<Utc>) -> Vec<QuestionId> {
        let mut due: Vec<(DateTime<Utc>, &QuestionId)> = book
            .iter()
            .filter_map(|(id, state)| match state.next_review_time {
                Some(next) if state.review_count > 0 && next <= now => Some((next, id)),
                _ => None,
            })
            .collect();
        due.sort();
        due.into_iter().map(|(_, id)| id.clone()).collect()
    }
}
