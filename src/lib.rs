//! # kaoshi-algo - Exam Practice Algorithms
//!
//! Pure Rust learning algorithms behind the exam-practice app:
//!
//! - **Bayesian Knowledge Tracing** - per-question mastery from answer history
//! - **Forgetting Curve** - memory strength and review scheduling
//! - **Recommender** - question order for the next session
//!
//! The crate does no I/O of its own. Callers pass attempt histories and review
//! books in and persist whatever comes back.
//!
//! ## Modules
//!
//! - [`bkt`] - mastery probability, mastery policy, difficulty
//! - [`forgetting`] - memory strength, next review time
//! - [`recommender`] - weighted / quota / error-rate strategies
//! - [`progress`] - study progress counts
//! - [`sanitize`] - parameter ranges, raw record ingestion
//! - [`config`] - parameter configuration
//! - [`logging`] - opt-in tracing subscriber for host binaries
//! - [`types`] - shared types and constants
//!
//! ## Usage
//!
//! ```rust
//! use kaoshi_algo::{AttemptHistory, AttemptRecord, MasteryEstimator, MasteryPolicy};
//! use chrono::Utc;
//!
//! let mut history = AttemptHistory::new();
//! history.insert(
//!     "12".to_string(),
//!     vec![
//!         AttemptRecord::new("12", true, Utc::now()),
//!         AttemptRecord::new("12", true, Utc::now()),
//!     ],
//! );
//!
//! let mastery = MasteryEstimator::default().compute_mastery(&history);
//! assert!(MasteryPolicy::default().is_mastered(&mastery["12"]));
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod bkt;
pub mod config;
pub mod error;
pub mod forgetting;
pub mod logging;
pub mod progress;
pub mod recommender;
pub mod sanitize;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

/// Re-export all shared types
pub use types::*;

pub use error::{AlgoError, Result};

/// Re-export the BKT mastery model
pub use bkt::{is_mastered, AccuracyRule, BktParams, MasteryEstimator, MasteryPolicy};

/// Re-export the forgetting curve
pub use forgetting::{ForgettingParams, ReviewScheduler};

/// Re-export the recommender
pub use recommender::{RecommendationConfig, RecommendationInput, Recommender, SelectionStrategy};

pub use config::AlgoConfig;
pub use logging::{init_tracing, LogSettings};
pub use progress::ProgressSummary;
pub use sanitize::{grade_response, ingest_attempts, merge_histories, IngestReport};
