//! Forecast cycle resolution.
//!
//! A GFS cycle is a calendar date plus one of the four synoptic run hours
//! (00/06/12/18 UTC). Callers hand us anything from a real timestamp to the
//! aliases `"today"` and `"latest"`; [`resolve_cycle`] turns that into a
//! [`ForecastCycle`] as a pure function of the input and an injected `now`.

use std::fmt;

use chrono::{
    DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};

use crate::error::{ParameterError, ParameterResult};

/// Hours after its nominal time a cycle is assumed to be fully published.
///
/// Applied before choosing the run hour for `"today"`/`"latest"`. Sources
/// expose this as `publication_latency_hours`.
pub const DEFAULT_PUBLICATION_LATENCY_HOURS: u32 = 6;

/// [`DEFAULT_PUBLICATION_LATENCY_HOURS`] as a duration.
pub fn default_publication_latency() -> Duration {
    Duration::hours(DEFAULT_PUBLICATION_LATENCY_HOURS as i64)
}

const CYCLE_LABEL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Model run cycles (GFS runs 4x daily).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelCycle {
    /// 00Z run
    Z00,
    /// 06Z run
    Z06,
    /// 12Z run
    Z12,
    /// 18Z run
    Z18,
}

impl ModelCycle {
    pub fn from_hour(hour: u32) -> Option<Self> {
        match hour {
            0 => Some(ModelCycle::Z00),
            6 => Some(ModelCycle::Z06),
            12 => Some(ModelCycle::Z12),
            18 => Some(ModelCycle::Z18),
            _ => None,
        }
    }

    pub fn hour(&self) -> u32 {
        match self {
            ModelCycle::Z00 => 0,
            ModelCycle::Z06 => 6,
            ModelCycle::Z12 => 12,
            ModelCycle::Z18 => 18,
        }
    }

    /// Two-digit hour plus `Z`, e.g. `"06Z"`.
    pub fn token(&self) -> String {
        format!("{:02}Z", self.hour())
    }

    pub fn all() -> &'static [ModelCycle] {
        &[ModelCycle::Z00, ModelCycle::Z06, ModelCycle::Z12, ModelCycle::Z18]
    }
}

impl fmt::Display for ModelCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// A resolved model run: calendar date and run hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForecastCycle {
    pub date: NaiveDate,
    pub run: ModelCycle,
}

impl ForecastCycle {
    pub fn new(date: NaiveDate, run: ModelCycle) -> Self {
        Self { date, run }
    }

    /// Nominal run time of the cycle.
    pub fn reference_time(&self) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(self.run.hour(), 0, 0).unwrap_or(NaiveTime::MIN);
        Utc.from_utc_datetime(&self.date.and_time(time))
    }

    /// Time a forecast `lead_hours` into this cycle is valid for.
    pub fn valid_time(&self, lead_hours: u32) -> DateTime<Utc> {
        self.reference_time() + Duration::hours(lead_hours as i64)
    }

    /// `YYYY-MM-DD`
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// `YYYYMMDD`, the form used in archive paths.
    pub fn compact_date(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// `YYYY-MM-DDTHH:00:00`
    pub fn iso_label(&self) -> String {
        self.reference_time().format(CYCLE_LABEL_FORMAT).to_string()
    }

    pub fn hour(&self) -> u32 {
        self.run.hour()
    }
}

impl fmt::Display for ForecastCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date_string(), self.run)
    }
}

/// Caller-facing form of the `cycle` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleInput {
    /// Most recent cycle that should already be published.
    Today,
    /// Same resolution as [`CycleInput::Today`].
    Latest,
    /// ISO-8601 text, echoed verbatim in metadata.
    Iso(String),
    /// Timestamp without zone, taken as UTC.
    Naive(NaiveDateTime),
    /// Zone-aware timestamp.
    Aware(DateTime<Utc>),
}

impl CycleInput {
    /// Interpret free text: the two aliases, or an ISO string to parse later.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("today") {
            CycleInput::Today
        } else if trimmed.eq_ignore_ascii_case("latest") {
            CycleInput::Latest
        } else {
            CycleInput::Iso(text.to_string())
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, CycleInput::Today | CycleInput::Latest)
    }
}

impl Default for CycleInput {
    fn default() -> Self {
        CycleInput::Today
    }
}

impl fmt::Display for CycleInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleInput::Today => f.write_str("today"),
            CycleInput::Latest => f.write_str("latest"),
            CycleInput::Iso(s) => f.write_str(s),
            CycleInput::Naive(ndt) => write!(f, "{}", ndt.format(CYCLE_LABEL_FORMAT)),
            CycleInput::Aware(dt) => f.write_str(&dt.to_rfc3339()),
        }
    }
}

impl From<DateTime<Utc>> for CycleInput {
    fn from(dt: DateTime<Utc>) -> Self {
        CycleInput::Aware(dt)
    }
}

impl From<NaiveDateTime> for CycleInput {
    fn from(ndt: NaiveDateTime) -> Self {
        CycleInput::Naive(ndt)
    }
}

impl From<&str> for CycleInput {
    fn from(s: &str) -> Self {
        CycleInput::from_text(s)
    }
}

/// Outcome of cycle resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCycle {
    pub cycle: ForecastCycle,
    /// Value reported as `cycle` in source metadata.
    pub label: String,
}

/// Round a UTC instant down to the most recent synoptic hour.
pub fn floor_to_cycle(instant: DateTime<Utc>) -> ForecastCycle {
    let hour = instant.hour() - instant.hour() % 6;
    let run = ModelCycle::from_hour(hour).unwrap_or(ModelCycle::Z00);
    ForecastCycle::new(instant.date_naive(), run)
}

/// Resolve a `cycle` parameter into a canonical forecast cycle.
///
/// `now` is only consulted for the aliases, after stepping back by
/// `latency`. Explicit timestamps are truncated to the hour, and that hour
/// must be exactly 0, 6, 12 or 18.
pub fn resolve_cycle(
    input: &CycleInput,
    now: DateTime<Utc>,
    latency: Duration,
) -> ParameterResult<ResolvedCycle> {
    match input {
        CycleInput::Today | CycleInput::Latest => {
            let cycle = floor_to_cycle(now - latency);
            Ok(ResolvedCycle {
                label: cycle.iso_label(),
                cycle,
            })
        }
        CycleInput::Iso(text) => {
            let instant = parse_iso8601(text)?;
            let cycle = cycle_from_instant(&instant, text)?;
            Ok(ResolvedCycle {
                cycle,
                label: text.clone(),
            })
        }
        CycleInput::Naive(ndt) => {
            let instant = Utc.from_utc_datetime(ndt);
            let cycle = cycle_from_instant(&instant, &input.to_string())?;
            Ok(ResolvedCycle {
                label: cycle.iso_label(),
                cycle,
            })
        }
        CycleInput::Aware(dt) => {
            let cycle = cycle_from_instant(dt, &input.to_string())?;
            Ok(ResolvedCycle {
                label: cycle.iso_label(),
                cycle,
            })
        }
    }
}

fn cycle_from_instant(instant: &DateTime<Utc>, original: &str) -> ParameterResult<ForecastCycle> {
    let hour = instant.hour();
    let run = ModelCycle::from_hour(hour).ok_or_else(|| {
        ParameterError::invalid_cycle(
            original,
            format!("hour {:02} is not a GFS cycle hour (expected 00, 06, 12 or 18)", hour),
        )
    })?;
    Ok(ForecastCycle::new(instant.date_naive(), run))
}

/// Parse an ISO-8601 timestamp, assuming UTC when no offset is given.
fn parse_iso8601(s: &str) -> ParameterResult<DateTime<Utc>> {
    let trimmed = s.trim();

    // Full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Hour only, e.g. 2024-01-15T06
    if let Ok(ndt) = NaiveDateTime::parse_from_str(&format!("{}:00", trimmed), "%Y-%m-%dT%H:%M") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    // Date only
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    Err(ParameterError::invalid_cycle(
        s,
        "expected an ISO-8601 date-time, \"today\" or \"latest\"",
    ))
}

/// Parse a legacy `date_str` (`YYYYMMDD`, or `YYYY-MM-DD`).
pub fn parse_compact_date(s: &str) -> ParameterResult<NaiveDate> {
    let trimmed = s.trim();
    NaiveDate::parse_from_str(trimmed, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .map_err(|_| ParameterError::invalid_cycle(s, "expected a date as YYYYMMDD"))
}

/// Parse a legacy run-hour string such as `"00"`, `"6"` or `"18Z"`.
pub fn parse_run_hour(s: &str) -> ParameterResult<ModelCycle> {
    let digits = s.trim().trim_end_matches(['Z', 'z']);
    let hour: u32 = digits
        .parse()
        .map_err(|_| ParameterError::invalid_cycle(s, "run hour must be numeric"))?;
    ModelCycle::from_hour(hour).ok_or_else(|| {
        ParameterError::invalid_cycle(
            s,
            format!("hour {:02} is not a GFS cycle hour (expected 00, 06, 12 or 18)", hour),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_model_cycle_from_hour() {
        assert_eq!(ModelCycle::from_hour(18), Some(ModelCycle::Z18));
        assert_eq!(ModelCycle::from_hour(3), None);
        assert_eq!(ModelCycle::Z06.token(), "06Z");
        assert_eq!(ModelCycle::all().len(), 4);
    }

    #[test]
    fn test_floor_to_cycle() {
        let cycle = floor_to_cycle(at(2024, 1, 15, 17, 59));
        assert_eq!(cycle.run, ModelCycle::Z12);
        assert_eq!(cycle.date_string(), "2024-01-15");

        let cycle = floor_to_cycle(at(2024, 1, 15, 0, 0));
        assert_eq!(cycle.run, ModelCycle::Z00);
    }

    #[test]
    fn test_iso_cycle_echoes_input() {
        let input = CycleInput::from_text("2024-01-15T18:00:00");
        let resolved = resolve_cycle(&input, Utc::now(), default_publication_latency()).unwrap();
        assert_eq!(resolved.cycle.hour(), 18);
        assert_eq!(resolved.cycle.date.day(), 15);
        assert_eq!(resolved.label, "2024-01-15T18:00:00");
    }

    #[test]
    fn test_iso_variants() {
        let now = Utc::now();
        for text in [
            "2024-06-01T06:00:00Z",
            "2024-06-01T06:00:00+00:00",
            "2024-06-01 06:00:00",
            "2024-06-01T06:00",
            "2024-06-01T06",
            "2024-06-01T06:00:00.000",
        ] {
            let resolved = resolve_cycle(&CycleInput::from_text(text), now, Duration::zero())
                .unwrap_or_else(|e| panic!("{text}: {e}"));
            assert_eq!(resolved.cycle.run, ModelCycle::Z06, "{text}");
        }

        let resolved =
            resolve_cycle(&CycleInput::from_text("2024-06-01"), now, Duration::zero()).unwrap();
        assert_eq!(resolved.cycle.run, ModelCycle::Z00);
    }

    #[test]
    fn test_offset_converted_to_utc() {
        // 13:00 at -05:00 is 18Z
        let input = CycleInput::from_text("2024-01-15T13:00:00-05:00");
        let resolved = resolve_cycle(&input, Utc::now(), Duration::zero()).unwrap();
        assert_eq!(resolved.cycle.run, ModelCycle::Z18);
    }

    #[test]
    fn test_minutes_truncated() {
        let input = CycleInput::from_text("2024-01-15T12:45:00");
        let resolved = resolve_cycle(&input, Utc::now(), Duration::zero()).unwrap();
        assert_eq!(resolved.cycle.run, ModelCycle::Z12);
    }

    #[test]
    fn test_non_cycle_hour_rejected() {
        let input = CycleInput::from_text("2024-01-15T13:00:00");
        let err = resolve_cycle(&input, Utc::now(), Duration::zero()).unwrap_err();
        match err {
            ParameterError::InvalidCycleFormat { input, reason } => {
                assert_eq!(input, "2024-01-15T13:00:00");
                assert!(reason.contains("hour 13"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_garbage_rejected() {
        let err = resolve_cycle(
            &CycleInput::from_text("invalid-date-string"),
            Utc::now(),
            Duration::zero(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid cycle format"));
        assert!(err.to_string().contains("invalid-date-string"));
    }

    #[test]
    fn test_alias_applies_latency() {
        let now = at(2024, 3, 10, 7, 30);
        let resolved = resolve_cycle(&CycleInput::Latest, now, Duration::hours(6)).unwrap();
        // 01:30 -> 00Z same day
        assert_eq!(resolved.cycle.run, ModelCycle::Z00);
        assert_eq!(resolved.cycle.date_string(), "2024-03-10");
        assert_eq!(resolved.label, "2024-03-10T00:00:00");

        let now = at(2024, 3, 10, 2, 0);
        let resolved = resolve_cycle(&CycleInput::Today, now, Duration::hours(6)).unwrap();
        // crosses midnight: 20:00 previous day -> 18Z
        assert_eq!(resolved.cycle.run, ModelCycle::Z18);
        assert_eq!(resolved.cycle.date_string(), "2024-03-09");
    }

    #[test]
    fn test_aware_and_naive_inputs() {
        let dt = at(2024, 1, 15, 12, 0);
        let resolved =
            resolve_cycle(&CycleInput::Aware(dt), Utc::now(), Duration::zero()).unwrap();
        assert_eq!(resolved.cycle.run, ModelCycle::Z12);
        assert_eq!(resolved.label, "2024-01-15T12:00:00");

        let resolved = resolve_cycle(
            &CycleInput::Naive(dt.naive_utc()),
            Utc::now(),
            Duration::zero(),
        )
        .unwrap();
        assert_eq!(resolved.cycle.reference_time(), dt);

        let bad = at(2024, 1, 15, 9, 0);
        assert!(resolve_cycle(&CycleInput::Aware(bad), Utc::now(), Duration::zero()).is_err());
    }

    #[test]
    fn test_legacy_parsers() {
        let date = parse_compact_date("20240115").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(parse_compact_date("2024-01-15").unwrap(), date);
        assert!(parse_compact_date("15/01/2024").is_err());

        assert_eq!(parse_run_hour("00").unwrap(), ModelCycle::Z00);
        assert_eq!(parse_run_hour("18Z").unwrap(), ModelCycle::Z18);
        assert_eq!(parse_run_hour("6").unwrap(), ModelCycle::Z06);
        assert!(parse_run_hour("03").is_err());
        assert!(parse_run_hour("noon").is_err());
    }

    #[test]
    fn test_cycle_strings() {
        let cycle = ForecastCycle::new(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(), ModelCycle::Z06);
        assert_eq!(cycle.compact_date(), "20240615");
        assert_eq!(cycle.iso_label(), "2024-06-15T06:00:00");
        assert_eq!(cycle.valid_time(30), at(2024, 6, 16, 12, 0));
        assert_eq!(cycle.to_string(), "2024-06-15 06Z");
    }
}
