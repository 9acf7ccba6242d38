//! Study progress over a question bank

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::bkt::MasteryPolicy;
use crate::types::{MasteryState, QuestionId};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total: usize,
    /// Questions with at least one attempt
    pub done: usize,
    pub undone: usize,
    pub mastered: usize,
    /// Done but not yet mastered
    pub unmastered: usize,
}

impl ProgressSummary {
    /// Summarize a bank; mastery entries outside `universe` are ignored
    pub fn compute(
        universe: &[QuestionId],
        mastery: &HashMap<QuestionId, MasteryState>,
        policy: &MasteryPolicy,
    ) -> Self {
        let bank: HashSet<&QuestionId> = universe.iter().collect();

        let mut summary = Self {
            total: bank.len(),
            ..Self::default()
        };
        for id in bank {
            match mastery.get(id) {
                Some(state) if state.attempt_count > 0 => {
                    summary.done += 1;
                    if policy.is_mastered(state) {
                        summary.mastered += 1;
                    } else {
                        summary.unmastered += 1;
                    }
                }
                _ => summary.undone += 1,
            }
        }
        summary
    }

    /// Share of the bank mastered, 0 for an empty bank
    pub fn mastered_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.mastered as f64 / self.total as f64
        }
    }
}
