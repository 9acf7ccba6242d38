use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bkt::{BktParams, MasteryEstimator, MasteryPolicy};
use crate::error::Result;
use crate::forgetting::{ForgettingParams, ReviewScheduler};
use crate::recommender::{RecommendationConfig, Recommender};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgoConfig {
    pub mastery: BktParams,
    pub forgetting: ForgettingParams,
    pub policy: MasteryPolicy,
    pub recommendation: RecommendationConfig,
}

impl AlgoConfig {
    /// Parse and validate a JSON document; missing fields take defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns; unparsable values are ignored
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = parse(&lookup, "KAOSHI_P_INIT") {
            config.mastery.p_init = val;
        }
        if let Some(val) = parse(&lookup, "KAOSHI_P_TRANSIT") {
            config.mastery.p_transit = val;
        }
        if let Some(val) = parse(&lookup, "KAOSHI_P_GUESS") {
            config.mastery.p_guess = val;
        }
        if let Some(val) = parse(&lookup, "KAOSHI_P_SLIP") {
            config.mastery.p_slip = val;
        }
        if let Some(val) = parse(&lookup, "KAOSHI_DECAY_RATE") {
            config.forgetting.decay_rate = val;
        }
        if let Some(val) = parse(&lookup, "KAOSHI_MIN_ATTEMPTS") {
            config.policy.min_attempts = val;
        }
        if let Some(val) = parse(&lookup, "KAOSHI_NEW_RATIO") {
            config.recommendation.new_ratio = val;
        }
        if let Some(val) = parse(&lookup, "KAOSHI_RECOMMEND_SEED") {
            config.recommendation.seed = Some(val);
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        self.mastery.validate()?;
        self.forgetting.validate()?;
        self.policy.validate()?;
        self.recommendation.validate()
    }

    pub fn estimator(&self) -> Result<MasteryEstimator> {
        MasteryEstimator::new(self.mastery.clone())
    }

    pub fn scheduler(&self) -> Result<ReviewScheduler> {
        ReviewScheduler::new(self.forgetting.clone())
    }

    pub fn recommender(&self) -> Result<Recommender> {
        Recommender::new(self.recommendation.clone(), self.estimator()?)
    }
}

fn parse<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key).and_then(|val| val.trim().parse().ok())
}
