//! Bayesian Knowledge Tracing (BKT) - mastery estimation
//!
//! Core theory:
//! - Each question hides a binary skill state: mastered or not
//! - Every answer is a noisy observation of that state (guess / slip)
//! - Every answer is also a learning opportunity (transit)
//!
//! Update rule, folded over a question's attempts in time order from `p = p_init`:
//! - Correct:   p ← p(1−S) / (p(1−S) + (1−p)G)
//! - Incorrect: p ← pS / (pS + (1−p)(1−G))
//! - Then:      p ← p + (1−p)T
//!
//! References:
//! - Corbett, A. T., & Anderson, J. R. (1994). Knowledge tracing.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AlgoError, Result};
use crate::sanitize::{require_open_probability, require_unit_interval};
use crate::types::{AttemptHistory, AttemptRecord, MasteryState, QuestionId};

// ==================== Constants ====================

/// Default prior probability of mastery
const DEFAULT_P_INIT: f64 = 0.1;

/// Default probability of learning after an opportunity
const DEFAULT_P_TRANSIT: f64 = 0.3;

/// Default probability of a correct guess while unmastered
const DEFAULT_P_GUESS: f64 = 0.1;

/// Default probability of a slip while mastered
const DEFAULT_P_SLIP: f64 = 0.1;

/// Difficulty is only observed after more than this many attempts
pub const DEFAULT_DIFFICULTY_MIN_ATTEMPTS: u32 = 5;

// ==================== Parameters ====================

/// BKT model parameters, fixed at construction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BktParams {
    /// Prior probability of mastery L0
    pub p_init: f64,
    /// Learning probability T
    pub p_transit: f64,
    /// Guess probability G
    pub p_guess: f64,
    /// Slip probability S
    pub p_slip: f64,
}

impl Default for BktParams {
    fn default() -> Self {
        Self {
            p_init: DEFAULT_P_INIT,
            p_transit: DEFAULT_P_TRANSIT,
            p_guess: DEFAULT_P_GUESS,
            p_slip: DEFAULT_P_SLIP,
        }
    }
}

impl BktParams {
    pub fn validate(&self) -> Result<()> {
        require_open_probability("p_init", self.p_init)?;
        require_open_probability("p_transit", self.p_transit)?;
        require_open_probability("p_guess", self.p_guess)?;
        require_open_probability("p_slip", self.p_slip)?;
        Ok(())
    }
}

// ==================== Estimator ====================

/// Stateless BKT estimator
#[derive(Clone, Debug)]
pub struct MasteryEstimator {
    params: BktParams,
}

impl Default for MasteryEstimator {
    fn default() -> Self {
        Self {
            params: BktParams::default(),
        }
    }
}

impl MasteryEstimator {
    pub fn new(params: BktParams) -> Result<Self> {
        params.validate()?;
        if params.p_guess + params.p_slip >= 1.0 {
            warn!(
                p_guess = params.p_guess,
                p_slip = params.p_slip,
                "degenerate BKT parameters: correct answers can lower mastery"
            );
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &BktParams {
        &self.params
    }

    /// One fold step: posterior given the observation, then the learning transition
    pub fn update(&self, p: f64, is_correct: bool) -> f64 {
        let BktParams {
            p_transit,
            p_guess,
            p_slip,
            ..
        } = self.params;

        let posterior = if is_correct {
            let known = p * (1.0 - p_slip);
            known / (known + (1.0 - p) * p_guess)
        } else {
            let known = p * p_slip;
            known / (known + (1.0 - p) * (1.0 - p_guess))
        };

        posterior + (1.0 - posterior) * p_transit
    }

    /// Mastery probability after each attempt, in chronological order
    pub fn trace(&self, attempts: &[AttemptRecord]) -> Vec<f64> {
        let mut p = self.params.p_init;
        chronological(attempts)
            .into_iter()
            .map(|a| {
                p = self.update(p, a.is_correct);
                p
            })
            .collect()
    }

    /// Fold one question's attempts; `None` when there is nothing to fold
    pub fn mastery_state(&self, attempts: &[AttemptRecord]) -> Option<MasteryState> {
        if attempts.is_empty() {
            return None;
        }

        let mastery_probability = chronological(attempts)
            .into_iter()
            .fold(self.params.p_init, |p, a| self.update(p, a.is_correct));

        let attempt_count = attempts.len() as u32;
        let correct = attempts.iter().filter(|a| a.is_correct).count();

        Some(MasteryState {
            mastery_probability,
            correct_rate: correct as f64 / attempts.len() as f64,
            attempt_count,
        })
    }

    /// Compute mastery for every question with at least one attempt
    pub fn compute_mastery(&self, history: &AttemptHistory) -> HashMap<QuestionId, MasteryState> {
        let mastery: HashMap<_, _> = history
            .iter()
            .filter_map(|(id, attempts)| {
                self.mastery_state(attempts)
                    .map(|state| (id.clone(), state))
            })
            .collect();

        debug!(
            questions = history.len(),
            computed = mastery.len(),
            "mastery computed"
        );
        mastery
    }

    /// Parallel version of [`compute_mastery`](Self::compute_mastery) for large banks
    pub fn compute_mastery_par(
        &self,
        history: &AttemptHistory,
    ) -> HashMap<QuestionId, MasteryState> {
        history
            .par_iter()
            .filter_map(|(id, attempts)| {
                self.mastery_state(attempts)
                    .map(|state| (id.clone(), state))
            })
            .collect()
    }

    /// Observed wrong-rate per question, only once `attempt_count > min_attempts`
    pub fn estimate_difficulty(
        history: &AttemptHistory,
        min_attempts: u32,
    ) -> HashMap<QuestionId, f64> {
        history
            .iter()
            .filter(|(_, attempts)| attempts.len() > min_attempts as usize)
            .map(|(id, attempts)| {
                let correct = attempts.iter().filter(|a| a.is_correct).count();
                let difficulty = 1.0 - correct as f64 / attempts.len() as f64;
                (id.clone(), difficulty)
            })
            .collect()
    }
}

/// Attempts in timestamp order; ties keep their input order
fn chronological(attempts: &[AttemptRecord]) -> Vec<&AttemptRecord> {
    let mut ordered: Vec<&AttemptRecord> = attempts.iter().collect();
    ordered.sort_by_key(|a| a.timestamp);
    ordered
}

// ==================== Mastery Policy ====================

/// Accuracy requirement on top of the BKT probability
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "value", rename_all = "snake_case")]
pub enum AccuracyRule {
    /// correct_rate strictly above the cutoff
    AboveRate(f64),
    /// every attempt correct
    NoWrongAnswers,
}

/// Decides when a question counts as mastered
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryPolicy {
    pub probability_cutoff: f64,
    pub accuracy: AccuracyRule,
    /// Minimum number of attempts (K)
    pub min_attempts: u32,
}

impl Default for MasteryPolicy {
    fn default() -> Self {
        Self {
            probability_cutoff: 0.7,
            accuracy: AccuracyRule::AboveRate(0.6),
            min_attempts: 2,
        }
    }
}

impl MasteryPolicy {
    pub fn with_min_attempts(min_attempts: u32) -> Self {
        Self {
            min_attempts,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_unit_interval("probability_cutoff", self.probability_cutoff)?;
        if let AccuracyRule::AboveRate(rate) = self.accuracy {
            require_unit_interval("correct_rate_cutoff", rate)?;
        }
        if self.min_attempts == 0 {
            return Err(AlgoError::InvalidConfiguration(
                "min_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_mastered(&self, state: &MasteryState) -> bool {
        if state.attempt_count == 0 || state.attempt_count < self.min_attempts {
            return false;
        }
        if state.mastery_probability <= self.probability_cutoff {
            return false;
        }
        match self.accuracy {
            AccuracyRule::AboveRate(cutoff) => state.correct_rate > cutoff,
            AccuracyRule::NoWrongAnswers => state.correct_rate >= 1.0,
        }
    }

    /// Mastered question ids, sorted
    pub fn mastered_questions(
        &self,
        mastery: &HashMap<QuestionId, MasteryState>,
    ) -> Vec<QuestionId> {
        let mut ids: Vec<QuestionId> = mastery
            .iter()
            .filter(|(_, state)| self.is_mastered(state))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Default mastery predicate: `p > 0.7 && correct_rate > 0.6 && attempt_count >= k`
pub fn is_mastered(
    mastery_probability: f64,
    correct_rate: f64,
    attempt_count: u32,
    k: u32,
) -> bool {
    MasteryPolicy::with_min_attempts(k).is_mastered(&MasteryState {
        mastery_probability,
        correct_rate,
        attempt_count,
    })
}
