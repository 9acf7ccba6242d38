//! Input validation and boundary ingestion
//!
//! Everything that crosses into the algorithms goes through here first:
//! parameter range checks, raw session-log records, and graded responses.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{AlgoError, Result};
use crate::types::{AttemptHistory, AttemptRecord, QuestionId, RawAttemptRecord};

/// Require `value` to lie strictly inside (0, 1)
pub fn require_open_probability(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(AlgoError::InvalidConfiguration(format!(
            "{name} must be in (0, 1), got {value}"
        )))
    }
}

/// Require `value` to lie inside [0, 1]
pub fn require_unit_interval(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AlgoError::InvalidConfiguration(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}

/// Require a finite, non-negative weight
pub fn require_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AlgoError::InvalidConfiguration(format!(
            "{name} must be a finite non-negative number, got {value}"
        )))
    }
}

/// Longest review interval accepted, about a century
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Validate a day-interval schedule: non-empty, every entry in 1..=MAX_INTERVAL_DAYS
pub fn require_intervals(intervals: &[u32]) -> Result<()> {
    if intervals.is_empty() {
        return Err(AlgoError::InvalidConfiguration(
            "review_intervals must not be empty".to_string(),
        ));
    }
    if let Some(bad) = intervals
        .iter()
        .find(|&&days| !(1..=MAX_INTERVAL_DAYS).contains(&days))
    {
        return Err(AlgoError::InvalidConfiguration(format!(
            "review_intervals entries must be in 1..={MAX_INTERVAL_DAYS} days, got {bad}"
        )));
    }
    Ok(())
}

// ==================== Attempt Ingestion ====================

/// Result of ingesting a batch of raw attempt records
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Valid attempts grouped by question, chronologically ordered
    pub history: AttemptHistory,
    /// Rejected records; each error carries the record's batch index
    pub rejected: Vec<AlgoError>,
}

impl IngestReport {
    pub fn accepted_count(&self) -> usize {
        self.history.values().map(Vec::len).sum()
    }
}

/// Validate one raw record
pub fn validate_attempt(index: usize, raw: RawAttemptRecord) -> Result<AttemptRecord> {
    let invalid = |reason: &str| AlgoError::InvalidAttemptRecord {
        index,
        reason: reason.to_string(),
    };

    let question_id = raw.question_id.trim();
    if question_id.is_empty() {
        return Err(invalid("empty question id"));
    }
    let is_correct = raw.is_correct.ok_or_else(|| invalid("missing correctness flag"))?;
    let timestamp = raw.timestamp.ok_or_else(|| invalid("missing timestamp"))?;

    Ok(AttemptRecord {
        question_id: question_id.to_string(),
        is_correct,
        timestamp,
    })
}

/// Ingest raw records, rejecting bad ones individually.
///
/// A malformed record never aborts the batch; it is reported in
/// [`IngestReport::rejected`] and the rest of the history is kept.
pub fn ingest_attempts<I>(records: I) -> IngestReport
where
    I: IntoIterator<Item = RawAttemptRecord>,
{
    let mut report = IngestReport::default();

    for (index, raw) in records.into_iter().enumerate() {
        match validate_attempt(index, raw) {
            Ok(record) => report
                .history
                .entry(record.question_id.clone())
                .or_default()
                .push(record),
            Err(err) => {
                warn!(error = %err, "rejected attempt record");
                report.rejected.push(err);
            }
        }
    }

    sort_chronologically(&mut report.history);
    report
}

/// Stable sort of every sequence by timestamp; equal timestamps keep input order
pub fn sort_chronologically(history: &mut AttemptHistory) {
    for attempts in history.values_mut() {
        attempts.sort_by_key(|a| a.timestamp);
    }
}

/// Merge attempt histories from several session logs.
///
/// Sequences are concatenated per question and then ordered by each
/// attempt's own timestamp, so the order of `logs` does not matter except
/// for attempts sharing a timestamp.
pub fn merge_histories<I>(logs: I) -> AttemptHistory
where
    I: IntoIterator<Item = AttemptHistory>,
{
    let mut merged: AttemptHistory = HashMap::new();
    for log in logs {
        for (id, attempts) in log {
            merged.entry(id).or_default().extend(attempts);
        }
    }
    sort_chronologically(&mut merged);
    merged
}

// ==================== Response Grading ====================

fn normalize_answer(answer: &str) -> String {
    answer.trim().to_uppercase()
}

/// Grade a single exam response into an attempt.
///
/// Unanswered questions and questions whose answer was revealed before
/// submitting count as incorrect.
pub fn grade_response(
    question_id: impl Into<QuestionId>,
    given: Option<&str>,
    expected: &str,
    viewed_answer: bool,
    timestamp: DateTime<Utc>,
) -> AttemptRecord {
    let is_correct = !viewed_answer
        && given
            .map(normalize_answer)
            .is_some_and(|g| !g.is_empty() && g == normalize_answer(expected));
    AttemptRecord::new(question_id, is_correct, timestamp)
}
