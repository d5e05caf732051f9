//! Forecast lead-time sequences.
//!
//! GFS publishes forecast snapshots on a fixed 3-hour step, so a
//! `max_lead_time` of 24 becomes `0, 3, ..., 24`. Each lead is also addressable
//! by its zero-padded archive token (`3` -> `"003"` / `"f003"`).

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ParameterError, ParameterResult};

/// Hours between consecutive forecast snapshots.
pub const LEAD_TIME_STEP_HOURS: u32 = 3;

/// Longest lead GFS publishes; anything above is accepted with a warning.
pub const HIGH_LEAD_TIME_WARNING_HOURS: u32 = 384;

/// Hard upper bound on any lead. Archive tokens are three digits, so nothing
/// above 999 h can be addressed.
pub const MAX_LEAD_TIME_HOURS: u32 = 999;

/// Default `max_lead_time` when none is given.
pub const DEFAULT_MAX_LEAD_TIME: u32 = 24;

/// Caller-facing form of the `max_lead_time` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadTimeInput {
    /// Upper bound in hours; expands into a stepped sequence.
    Hours(i64),
    /// A single encoded lead such as `"f003"`.
    Token(String),
    /// Something that is not an integer (rendered for error reporting).
    Invalid(String),
}

impl LeadTimeInput {
    /// Classify text: integer -> `Hours`, `fNNN` -> `Token`, else `Invalid`.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if let Ok(hours) = trimmed.parse::<i64>() {
            LeadTimeInput::Hours(hours)
        } else if trimmed.starts_with(['f', 'F']) {
            LeadTimeInput::Token(trimmed.to_string())
        } else {
            LeadTimeInput::Invalid(text.to_string())
        }
    }
}

impl Default for LeadTimeInput {
    fn default() -> Self {
        LeadTimeInput::Hours(DEFAULT_MAX_LEAD_TIME as i64)
    }
}

impl From<i64> for LeadTimeInput {
    fn from(hours: i64) -> Self {
        LeadTimeInput::Hours(hours)
    }
}

impl fmt::Display for LeadTimeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeadTimeInput::Hours(h) => write!(f, "{}", h),
            LeadTimeInput::Token(t) => f.write_str(t),
            LeadTimeInput::Invalid(v) => f.write_str(v),
        }
    }
}

/// Ordered, duplicate-free forecast lead times in hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadTimeSequence(Vec<u32>);

impl LeadTimeSequence {
    /// `0, step, 2*step, ...` up to and including `max` when it lands on the step.
    pub fn stepped(max: u32, step: u32) -> Self {
        Self((0..=max).step_by(step.max(1) as usize).collect())
    }

    pub fn single(lead: u32) -> Self {
        Self(vec![lead])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.0.get(index).copied()
    }

    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Zero-padded token for the lead at `index`, e.g. `"003"`.
    pub fn token(&self, index: usize) -> Option<String> {
        self.get(index).map(|lead| format!("{:03}", lead))
    }

    /// Archive-style token for the lead at `index`, e.g. `"f003"`.
    pub fn file_token(&self, index: usize) -> Option<String> {
        self.get(index).map(|lead| format!("f{:03}", lead))
    }
}

/// Expand `max_lead_time` into the 3-hourly lead sequence.
///
/// Fails for zero or negative values and for anything above
/// [`MAX_LEAD_TIME_HOURS`]. Values between the longest published GFS lead and
/// that cap are still accepted but logged.
pub fn resolve_lead_times(max_lead_time: i64) -> ParameterResult<LeadTimeSequence> {
    if max_lead_time <= 0 {
        return Err(ParameterError::invalid_max_lead_time(
            max_lead_time,
            "must be a positive integer number of hours",
        ));
    }
    if max_lead_time > i64::from(MAX_LEAD_TIME_HOURS) {
        return Err(ParameterError::invalid_max_lead_time(
            max_lead_time,
            format!("must not exceed {} hours", MAX_LEAD_TIME_HOURS),
        ));
    }
    let max = max_lead_time as u32;

    if max > HIGH_LEAD_TIME_WARNING_HOURS {
        warn!(
            max_lead_time = max,
            threshold = HIGH_LEAD_TIME_WARNING_HOURS,
            "max_lead_time exceeds the longest published GFS lead; later partitions may not exist"
        );
    }

    Ok(LeadTimeSequence::stepped(max, LEAD_TIME_STEP_HOURS))
}

/// Parse a single lead token: `f003`, `F120` or bare digits.
pub fn parse_lead_token(token: &str) -> ParameterResult<u32> {
    let trimmed = token.trim();
    let digits = trimmed
        .strip_prefix(['f', 'F'])
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParameterError::invalid_max_lead_time(
            token,
            "expected a lead token like 'f003'",
        ));
    }

    match digits.parse::<u32>() {
        Ok(lead) if lead <= MAX_LEAD_TIME_HOURS => Ok(lead),
        _ => Err(ParameterError::invalid_max_lead_time(
            token,
            "lead token out of range",
        )),
    }
}

/// Resolve either input form into `(max_lead_time, sequence)`.
///
/// A token bypasses sequence generation and yields exactly one lead.
pub fn resolve_lead_input(input: &LeadTimeInput) -> ParameterResult<(u32, LeadTimeSequence)> {
    match input {
        LeadTimeInput::Hours(hours) => {
            let sequence = resolve_lead_times(*hours)?;
            // resolve_lead_times rejects anything that does not fit
            Ok((*hours as u32, sequence))
        }
        LeadTimeInput::Token(token) => {
            let lead = parse_lead_token(token)?;
            Ok((lead, LeadTimeSequence::single(lead)))
        }
        LeadTimeInput::Invalid(value) => Err(ParameterError::invalid_max_lead_time(
            value,
            "must be an integer number of hours",
        )),
    }
}
