//! Question Recommender
//!
//! Combines mastery (BKT) and review (forgetting curve) signals into the
//! question order for the next practice session.
//!
//! Strategies:
//! - `Weighted`: score = w_m(1 − mastery) + w_d(1 − |target − difficulty|) + w_a / (1 + attempts)
//! - `Quota`: a `new_ratio` share of never-attempted questions sampled at random,
//!   the rest taken from attempted questions ranked by (wrong, viewed, time)
//! - `ErrorRate`: never-attempted first (weight 1.0), then by observed wrong-rate

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bkt::{MasteryEstimator, MasteryPolicy, DEFAULT_DIFFICULTY_MIN_ATTEMPTS};
use crate::error::{AlgoError, Result};
use crate::forgetting::ReviewScheduler;
use crate::sanitize::{require_non_negative, require_unit_interval};
use crate::types::{
    AttemptHistory, MasteryState, QuestionId, RecommendationItem, ReviewBook, UsageStats,
    DEFAULT_DIFFICULTY, EPSILON,
};

// ==================== Configuration ====================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    Weighted,
    Quota,
    ErrorRate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub mastery_weight: f64,
    pub difficulty_weight: f64,
    pub attempt_weight: f64,
    /// Preferred difficulty (wrong-rate)
    pub target_difficulty: f64,
    pub default_difficulty: f64,
    /// Difficulty is observed only when attempts exceed this
    pub difficulty_min_attempts: u32,
    /// Share of the quota reserved for never-attempted questions
    pub new_ratio: f64,
    pub default_num_questions: usize,
    /// Fixed seed for the random source; time-seeded when absent
    pub seed: Option<u64>,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            mastery_weight: 0.5,
            difficulty_weight: 0.3,
            attempt_weight: 0.2,
            target_difficulty: 0.7,
            default_difficulty: DEFAULT_DIFFICULTY,
            difficulty_min_attempts: DEFAULT_DIFFICULTY_MIN_ATTEMPTS,
            new_ratio: 0.6,
            default_num_questions: 50,
            seed: None,
        }
    }
}

impl RecommendationConfig {
    pub fn validate(&self) -> Result<()> {
        require_non_negative("mastery_weight", self.mastery_weight)?;
        require_non_negative("difficulty_weight", self.difficulty_weight)?;
        require_non_negative("attempt_weight", self.attempt_weight)?;
        require_unit_interval("target_difficulty", self.target_difficulty)?;
        require_unit_interval("default_difficulty", self.default_difficulty)?;
        require_unit_interval("new_ratio", self.new_ratio)?;
        if self.default_num_questions == 0 {
            return Err(AlgoError::InvalidConfiguration(
                "default_num_questions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything a recommendation request reads
#[derive(Clone, Copy, Debug)]
pub struct RecommendationInput<'a> {
    /// Full question bank, in bank order
    pub universe: &'a [QuestionId],
    /// Merged attempt history
    pub history: &'a AttemptHistory,
    /// View-answer and time counters kept by the exam UI
    pub usage: &'a HashMap<QuestionId, UsageStats>,
}

// ==================== Recommender ====================

#[derive(Clone, Debug, Default)]
pub struct Recommender {
    config: RecommendationConfig,
    estimator: MasteryEstimator,
}

impl Recommender {
    pub fn new(config: RecommendationConfig, estimator: MasteryEstimator) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, estimator })
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    pub fn estimator(&self) -> &MasteryEstimator {
        &self.estimator
    }

    /// Weighted priority of one question; higher is more urgent
    pub fn score(&self, mastery: &MasteryState, difficulty: f64) -> f64 {
        let c = &self.config;
        let difficulty_factor = 1.0 - (c.target_difficulty - difficulty).abs();
        let attempt_factor = 1.0 / (1.0 + mastery.attempt_count as f64);

        c.mastery_weight * (1.0 - mastery.mastery_probability)
            + c.difficulty_weight * difficulty_factor
            + c.attempt_weight * attempt_factor
    }

    /// Rank questions that have attempts by weighted score, highest first.
    ///
    /// Only questions with a non-empty attempt sequence are scored. With no
    /// attempts at all every question is equally recommendable, so the bank
    /// comes back in bank order at the prior score. Ties break by question id.
    pub fn score_weighted(
        &self,
        universe: &[QuestionId],
        history: &AttemptHistory,
    ) -> Vec<RecommendationItem> {
        let mastery = self.estimator.compute_mastery(history);

        if mastery.is_empty() {
            let prior = MasteryState {
                mastery_probability: self.estimator.params().p_init,
                correct_rate: 0.0,
                attempt_count: 0,
            };
            let score = self.score(&prior, self.config.default_difficulty);
            return dedup(universe)
                .into_iter()
                .map(|id| RecommendationItem {
                    question_id: id.clone(),
                    score,
                })
                .collect();
        }

        let difficulty =
            MasteryEstimator::estimate_difficulty(history, self.config.difficulty_min_attempts);
        let mut items: Vec<RecommendationItem> = mastery
            .iter()
            .map(|(id, state)| {
                let d = difficulty
                    .get(id)
                    .copied()
                    .unwrap_or(self.config.default_difficulty);
                RecommendationItem {
                    question_id: id.clone(),
                    score: self.score(state, d),
                }
            })
            .collect();

        items.sort_by(by_score_desc);
        items
    }

    pub fn select_weighted(
        &self,
        universe: &[QuestionId],
        history: &AttemptHistory,
        num_questions: usize,
    ) -> Vec<QuestionId> {
        self.score_weighted(universe, history)
            .into_iter()
            .take(num_questions)
            .map(|item| item.question_id)
            .collect()
    }

    /// Quota selection: `new_ratio` of the slots go to a random sample of
    /// never-attempted questions, the rest to the most troublesome attempted
    /// ones. Short partitions are topped up from the other; the result is
    /// exactly `num_questions` long unless the universe is smaller.
    pub fn select_quota<R: Rng + ?Sized>(
        &self,
        universe: &[QuestionId],
        usage: &HashMap<QuestionId, UsageStats>,
        num_questions: usize,
        rng: &mut R,
    ) -> Vec<QuestionId> {
        let universe = dedup(universe);
        let (mut attempted, fresh): (Vec<&QuestionId>, Vec<&QuestionId>) =
            universe.iter().copied().partition(|id| usage.contains_key(*id));

        attempted.sort_by(|a, b| {
            let (ua, ub) = (&usage[*a], &usage[*b]);
            ub.wrong_count
                .cmp(&ua.wrong_count)
                .then(ub.view_answer_count.cmp(&ua.view_answer_count))
                .then(ub.total_time.total_cmp(&ua.total_time))
        });

        // epsilon keeps e.g. 0.57 × 100 from truncating to 56
        let num_new = ((num_questions as f64 * self.config.new_ratio) + EPSILON).floor() as usize;
        let num_new = num_new.min(num_questions);
        let num_old = num_questions - num_new;

        let mut order: Vec<&QuestionId> = fresh
            .choose_multiple(rng, num_new.min(fresh.len()))
            .copied()
            .collect();
        order.extend(attempted.iter().take(num_old).copied());
        order.shuffle(rng);

        if order.len() < num_questions {
            let mut chosen: HashSet<&QuestionId> = order.iter().copied().collect();
            for id in attempted.iter().chain(fresh.iter()) {
                if order.len() >= num_questions {
                    break;
                }
                if chosen.insert(*id) {
                    order.push(*id);
                }
            }
        }
        order.truncate(num_questions);

        debug!(
            universe = universe.len(),
            attempted = attempted.len(),
            selected = order.len(),
            "quota selection"
        );
        order.into_iter().cloned().collect()
    }

    /// Never-attempted questions weigh 1.0, others their wrong-rate
    pub fn select_error_rate(
        &self,
        universe: &[QuestionId],
        history: &AttemptHistory,
        num_questions: usize,
    ) -> Vec<QuestionId> {
        let mut weighted: Vec<(&QuestionId, f64)> = dedup(universe)
            .into_iter()
            .map(|id| {
                let weight = match history.get(id) {
                    Some(attempts) if !attempts.is_empty() => {
                        let wrong = attempts.iter().filter(|a| !a.is_correct).count();
                        wrong as f64 / attempts.len() as f64
                    }
                    _ => 1.0,
                };
                (id, weight)
            })
            .collect();

        // stable: equal weights keep bank order
        weighted.sort_by(|a, b| b.1.total_cmp(&a.1));
        weighted
            .into_iter()
            .take(num_questions)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Run the chosen strategy with an injected random source
    pub fn score_and_select<R: Rng + ?Sized>(
        &self,
        strategy: SelectionStrategy,
        input: RecommendationInput<'_>,
        num_questions: usize,
        rng: &mut R,
    ) -> Vec<QuestionId> {
        match strategy {
            SelectionStrategy::Weighted => {
                self.select_weighted(input.universe, input.history, num_questions)
            }
            SelectionStrategy::Quota => {
                let usage = merge_usage(input.history, input.usage);
                self.select_quota(input.universe, &usage, num_questions, rng)
            }
            SelectionStrategy::ErrorRate => {
                self.select_error_rate(input.universe, input.history, num_questions)
            }
        }
    }

    /// [`score_and_select`](Self::score_and_select) with the configured
    /// seed and question count
    pub fn recommend(
        &self,
        strategy: SelectionStrategy,
        input: RecommendationInput<'_>,
    ) -> Vec<QuestionId> {
        let seed = self.config.seed.unwrap_or_else(time_seed);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.score_and_select(strategy, input, self.config.default_num_questions, &mut rng)
    }

    /// Mastered questions that are due again, weakest memory first.
    ///
    /// The score is `1 − current memory strength`.
    pub fn resurface(
        &self,
        scheduler: &ReviewScheduler,
        mastery: &HashMap<QuestionId, MasteryState>,
        book: &ReviewBook,
        policy: &MasteryPolicy,
        now: DateTime<Utc>,
    ) -> Vec<RecommendationItem> {
        let mut items: Vec<RecommendationItem> = scheduler
            .due_questions(book, now)
            .into_iter()
            .filter(|id| mastery.get(id).is_some_and(|state| policy.is_mastered(state)))
            .filter_map(|id| {
                let state = book.get(&id)?;
                let score = 1.0 - scheduler.current_strength(state, now);
                Some(RecommendationItem {
                    question_id: id,
                    score,
                })
            })
            .collect();

        items.sort_by(by_score_desc);
        items
    }
}

fn by_score_desc(a: &RecommendationItem, b: &RecommendationItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.question_id.cmp(&b.question_id))
}

/// Seed from the system clock, mixing seconds and sub-second nanos
fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() ^ u64::from(d.subsec_nanos()).rotate_left(32))
        .unwrap_or(42)
}

/// Bank order with duplicates removed
fn dedup(universe: &[QuestionId]) -> Vec<&QuestionId> {
    let mut seen = HashSet::new();
    universe.iter().filter(|id| seen.insert(*id)).collect()
}

/// Wrong counts from the history plus the caller's counters
fn merge_usage(
    history: &AttemptHistory,
    extra: &HashMap<QuestionId, UsageStats>,
) -> HashMap<QuestionId, UsageStats> {
    let mut usage = UsageStats::from_history(history);
    for (id, stats) in extra {
        usage.entry(id.clone()).or_default().absorb(stats);
    }
    usage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttemptRecord;
    use chrono::{Duration, TimeZone};

    const TOLERANCE: f64 = 1e-9;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn ids(n: usize) -> Vec<QuestionId> {
        (0..n).map(|i| i.to_string()).collect()
    }

    fn record(history: &mut AttemptHistory, id: &str, outcomes: &[bool]) {
        let attempts = outcomes
            .iter()
            .enumerate()
            .map(|(i, &c)| AttemptRecord::new(id, c, t0() + Duration::minutes(i as i64)))
            .collect();
        history.insert(id.to_string(), attempts);
    }

    fn wrongs(pairs: &[(&str, u32)]) -> HashMap<QuestionId, UsageStats> {
        pairs
            .iter()
            .map(|(id, w)| {
                (
                    id.to_string(),
                    UsageStats {
                        wrong_count: *w,
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_config_validation() {
        assert!(RecommendationConfig::default().validate().is_ok());
        let bad = RecommendationConfig {
            new_ratio: 1.5,
            ..Default::default()
        };
        assert!(Recommender::new(bad, MasteryEstimator::default()).is_err());
    }

    #[test]
    fn test_score_formula() {
        let r = Recommender::default();
        let state = MasteryState {
            mastery_probability: 0.4,
            correct_rate: 0.5,
            attempt_count: 3,
        };
        let expected = 0.5 * 0.6 + 0.3 * (1.0 - 0.2) + 0.2 * 0.25;
        assert!((r.score(&state, 0.5) - expected).abs() < TOLERANCE);
    }

    #[test]
    fn test_weighted_prefers_weak_questions() {
        let r = Recommender::default();
        let mut history = AttemptHistory::new();
        record(&mut history, "strong", &[true, true, true, true]);
        record(&mut history, "weak", &[false, false, true, false]);

        let order = r.select_weighted(&[], &history, 2);
        assert_eq!(order, vec!["weak".to_string(), "strong".to_string()]);
    }

    #[test]
    fn test_weighted_empty_history_returns_universe() {
        let r = Recommender::default();
        let universe: Vec<QuestionId> = ["3", "1", "4", "1", "5"].map(String::from).to_vec();
        let items = r.score_weighted(&universe, &AttemptHistory::new());

        let order: Vec<&str> = items.iter().map(|i| i.question_id.as_str()).collect();
        assert_eq!(order, vec!["3", "1", "4", "5"]);
        assert!(items.windows(2).all(|w| w[0].score == w[1].score));
    }

    #[test]
    fn test_weighted_skips_unattempted_questions() {
        let r = Recommender::default();
        let universe = ids(20);
        let mut history = AttemptHistory::new();
        record(&mut history, "0", &[false, false]);
        record(&mut history, "2", &[false]);
        record(&mut history, "5", &[true, false]);
        record(&mut history, "7", &[true, true, true]);
        record(&mut history, "9", &[false]);
        history.insert("11".to_string(), vec![]);

        let order = r.select_weighted(&universe, &history, 5);
        let picked: HashSet<&str> = order.iter().map(String::as_str).collect();
        assert_eq!(picked, HashSet::from(["0", "2", "5", "7", "9"]));
        assert_eq!(order.last().map(String::as_str), Some("7"));

        assert_eq!(r.select_weighted(&universe, &history, 20).len(), 5);
    }

    #[test]
    fn test_weighted_truncates() {
        let r = Recommender::default();
        assert_eq!(r.select_weighted(&ids(30), &AttemptHistory::new(), 10).len(), 10);
        assert_eq!(r.select_weighted(&ids(30), &AttemptHistory::new(), 10)[0], "0");
        assert_eq!(r.select_weighted(&ids(3), &AttemptHistory::new(), 10).len(), 3);
    }

    #[test]
    fn test_weighted_uses_observed_difficulty() {
        let r = Recommender::default();
        let mut history = AttemptHistory::new();
        // 6 attempts, 4 wrong: difficulty 2/3 is observed
        record(&mut history, "q", &[true, false, false, true, false, false]);
        let items = r.score_weighted(&[], &history);
        let state = r.estimator().mastery_state(&history["q"]).unwrap();
        assert!((items[0].score - r.score(&state, 4.0 / 6.0)).abs() < TOLERANCE);
    }

    #[test]
    fn test_quota_splits_new_and_old() {
        let r = Recommender::default();
        let universe = ids(20);
        let usage = wrongs(&[("0", 1), ("1", 5), ("2", 3), ("3", 0), ("4", 2)]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let order = r.select_quota(&universe, &usage, 10, &mut rng);
        assert_eq!(order.len(), 10);
        let old: HashSet<&str> = order
            .iter()
            .filter(|id| usage.contains_key(*id))
            .map(String::as_str)
            .collect();
        assert_eq!(old, HashSet::from(["1", "2", "4", "0"]));
    }

    #[test]
    fn test_quota_tops_up_from_new() {
        let r = Recommender::default();
        let universe = ids(20);
        let usage = wrongs(&[("0", 1), ("1", 2)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let order = r.select_quota(&universe, &usage, 10, &mut rng);
        assert_eq!(order.len(), 10);
        assert!(order.contains(&"0".to_string()));
        assert!(order.contains(&"1".to_string()));
        let unique: HashSet<_> = order.iter().collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn test_quota_tops_up_from_old_when_few_new() {
        let r = Recommender::default();
        let universe = ids(10);
        let usage: HashMap<_, _> = (0..8).map(|i| (i.to_string(), UsageStats::default())).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let order = r.select_quota(&universe, &usage, 10, &mut rng);
        assert_eq!(order.len(), 10);
    }

    #[test]
    fn test_quota_small_universe_returns_all() {
        let r = Recommender::default();
        let universe = ids(4);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut order = r.select_quota(&universe, &HashMap::new(), 10, &mut rng);
        order.sort();
        assert_eq!(order, universe);
    }

    #[test]
    fn test_quota_tie_break_order() {
        let r = Recommender::new(
            RecommendationConfig {
                new_ratio: 0.0,
                ..Default::default()
            },
            MasteryEstimator::default(),
        )
        .unwrap();
        let universe = ids(4);
        let usage: HashMap<QuestionId, UsageStats> = [
            ("0", 2, 0, 5.0),
            ("1", 2, 1, 1.0),
            ("2", 2, 1, 9.0),
            ("3", 3, 0, 0.0),
        ]
        .into_iter()
        .map(|(id, w, v, t)| {
            (
                id.to_string(),
                UsageStats {
                    wrong_count: w,
                    view_answer_count: v,
                    total_time: t,
                },
            )
        })
        .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let order = r.select_quota(&universe, &usage, 2, &mut rng);
        let picked: HashSet<&str> = order.iter().map(String::as_str).collect();
        assert_eq!(picked, HashSet::from(["3", "2"]));
    }

    #[test]
    fn test_quota_deterministic_with_seed() {
        let r = Recommender::default();
        let universe = ids(40);
        let usage = wrongs(&[("3", 1), ("9", 4)]);
        let a = r.select_quota(&universe, &usage, 12, &mut ChaCha8Rng::seed_from_u64(11));
        let b = r.select_quota(&universe, &usage, 12, &mut ChaCha8Rng::seed_from_u64(11));
        assert_eq!(a, b);
    }

    #[test]
    fn test_error_rate_strategy() {
        let r = Recommender::default();
        let mut history = AttemptHistory::new();
        record(&mut history, "0", &[true, true]);
        record(&mut history, "1", &[false, true]);
        record(&mut history, "2", &[false, false]);

        let order = r.select_error_rate(&ids(4), &history, 3);
        assert_eq!(order, vec!["2".to_string(), "3".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_score_and_select_dispatch() {
        let r = Recommender::default();
        let universe = ids(20);
        let mut history = AttemptHistory::new();
        for id in ["0", "1", "2", "3", "4"] {
            record(&mut history, id, &[false]);
        }
        let usage = HashMap::new();
        let input = RecommendationInput {
            universe: &universe,
            history: &history,
            usage: &usage,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        // weighted ranks attempted questions only
        let weighted = r.score_and_select(SelectionStrategy::Weighted, input, 10, &mut rng);
        assert_eq!(weighted.len(), 5);
        for strategy in [SelectionStrategy::Quota, SelectionStrategy::ErrorRate] {
            assert_eq!(r.score_and_select(strategy, input, 10, &mut rng).len(), 10);
        }
    }

    #[test]
    fn test_recommend_uses_configured_seed() {
        let config = RecommendationConfig {
            seed: Some(2024),
            default_num_questions: 8,
            ..Default::default()
        };
        let r = Recommender::new(config, MasteryEstimator::default()).unwrap();
        let universe = ids(30);
        let history = AttemptHistory::new();
        let usage = HashMap::new();
        let input = RecommendationInput {
            universe: &universe,
            history: &history,
            usage: &usage,
        };
        let first = r.recommend(SelectionStrategy::Quota, input);
        assert_eq!(first.len(), 8);
        assert_eq!(first, r.recommend(SelectionStrategy::Quota, input));
    }

    #[test]
    fn test_recommend_time_seeded_without_config_seed() {
        let config = RecommendationConfig {
            default_num_questions: 6,
            ..Default::default()
        };
        let r = Recommender::new(config, MasteryEstimator::default()).unwrap();
        let universe = ids(12);
        let history = AttemptHistory::new();
        let usage = HashMap::new();
        let input = RecommendationInput {
            universe: &universe,
            history: &history,
            usage: &usage,
        };

        assert_ne!(time_seed(), 0);
        let order = r.recommend(SelectionStrategy::Quota, input);
        assert_eq!(order.len(), 6);
        assert_eq!(order.iter().collect::<HashSet<_>>().len(), 6);
    }

    #[test]
    fn test_resurface_only_mastered_and_due() {
        let r = Recommender::default();
        let scheduler = ReviewScheduler::default();
        let policy = MasteryPolicy::default();

        let mut history = AttemptHistory::new();
        record(&mut history, "old", &[true, true, true]);
        record(&mut history, "recent", &[true, true, true]);
        record(&mut history, "shaky", &[false, false]);
        let mastery = r.estimator().compute_mastery(&history);

        let mut book = ReviewBook::new();
        scheduler.record_review("old", true, t0(), &mut book);
        scheduler.record_review("recent", true, t0() + Duration::days(9), &mut book);
        scheduler.record_review("shaky", false, t0(), &mut book);

        let now = t0() + Duration::days(10);
        let items = r.resurface(&scheduler, &mastery, &book, &policy, now);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].question_id, "old");
        let strength = scheduler.current_strength(&book["old"], now);
        assert!((items[0].score - (1.0 - strength)).abs() < TOLERANCE);
    }
}
