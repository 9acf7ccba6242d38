#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use kaoshi_algo::{AttemptHistory, AttemptRecord, QuestionId};

pub const FIXED_TIMESTAMP: i64 = 1_700_000_000;

pub fn init_logging() {
    kaoshi_algo::logging::init_test_tracing();
}

pub fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(FIXED_TIMESTAMP, 0).unwrap()
}

pub fn question_ids(n: usize) -> Vec<QuestionId> {
    (0..n).map(|i| i.to_string()).collect()
}

/// One attempt per outcome, a minute apart
pub fn attempts(id: &str, outcomes: &[bool]) -> Vec<AttemptRecord> {
    outcomes
        .iter()
        .enumerate()
        .map(|(i, &c)| AttemptRecord::new(id, c, t0() + Duration::minutes(i as i64)))
        .collect()
}

pub fn history_of(entries: &[(&str, &[bool])]) -> AttemptHistory {
    entries
        .iter()
        .map(|(id, outcomes)| (id.to_string(), attempts(id, outcomes)))
        .collect()
}
