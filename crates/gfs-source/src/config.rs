//! Source configuration.
//!
//! Everything a source needs is declared here with its default. Catalog
//! entries and callers only supply override maps, which are checked against
//! these fields before use; an unknown key is an error, not a passthrough.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use gfs_common::{
    floor_to_cycle, parse_compact_date, parse_run_hour, resolve_cycle, resolve_lead_input,
    CycleInput, ForecastCycle, LeadTimeInput, LeadTimeSequence, ModelCycle, ResolvedCycle,
    DEFAULT_MAX_LEAD_TIME, DEFAULT_PUBLICATION_LATENCY_HOURS,
};
use gfs_decode::{FilterByKeys, FilterKey};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::url::UrlTemplate;

/// RDA THREDDS server hosting the GFS 0.25 degree archive.
pub const DEFAULT_BASE_URL: &str = "https://thredds.rda.ucar.edu/thredds";

pub const DEFAULT_MAX_CONCURRENT_READS: usize = 4;

/// Keys of the high-level construction path.
const CYCLE_KEYS: [&str; 2] = ["cycle", "max_lead_time"];

/// Keys of the legacy construction path. `max_lead_time_fxxx` is a
/// lowercase alias of `max_lead_time_fXXX`.
const LEGACY_KEYS: [&str; 4] = [
    "date_str",
    "max_lead_time_fXXX",
    "max_lead_time_fxxx",
    "model_run_time",
];

/// The only filter key NCSS partitions can honour: NetCDF variables carry no
/// GRIB level or code-table keys.
const NCSS_FILTER_KEYS: [FilterKey; 1] = [FilterKey::ShortName];

/// How partitions are served by the THREDDS server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AccessMethod {
    /// Whole GRIB2 files (`fileServer`).
    #[default]
    FileServer,
    /// NetCDF Subset Service subsets (`ncss/grid`).
    Ncss,
}

impl AccessMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMethod::FileServer => "fileServer",
            AccessMethod::Ncss => "ncss",
        }
    }

    /// Path segment between the base URL and the dataset path.
    pub fn path_segment(&self) -> &'static str {
        match self {
            AccessMethod::FileServer => "fileServer",
            AccessMethod::Ncss => "ncss/grid",
        }
    }
}

impl FromStr for AccessMethod {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fileserver" | "file_server" | "http" => Ok(AccessMethod::FileServer),
            "ncss" => Ok(AccessMethod::Ncss),
            other => Err(SourceError::invalid_config(
                "access_method",
                format!("unknown access method '{}' (expected fileServer or ncss)", other),
            )),
        }
    }
}

impl TryFrom<String> for AccessMethod {
    type Error = SourceError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<AccessMethod> for String {
    fn from(method: AccessMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Low-level construction keywords: explicit date, run hour and lead token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyParameters {
    /// `YYYYMMDD`
    pub date_str: Option<String>,
    /// A single lead token such as `f003` (keyword `max_lead_time_fXXX`).
    pub max_lead_time_fxxx: Option<String>,
    /// `"00"`, `"06"`, `"12"` or `"18"` (a trailing `Z` is allowed).
    pub model_run_time: Option<String>,
}

/// Declared configuration of a GFS forecast source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub cycle: CycleInput,
    pub max_lead_time: LeadTimeInput,
    pub base_url: String,
    pub access_method: AccessMethod,
    pub url_template: UrlTemplate,
    /// Extra query parameters (NCSS variable/subset selection).
    pub query: BTreeMap<String, String>,
    pub filter_by_keys: FilterByKeys,
    pub publication_latency_hours: u32,
    pub max_concurrent_reads: usize,
    pub description: String,
    /// Set when built from legacy keywords; takes precedence over
    /// `cycle`/`max_lead_time`.
    pub legacy: Option<LegacyParameters>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            cycle: CycleInput::default(),
            max_lead_time: LeadTimeInput::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            access_method: AccessMethod::default(),
            url_template: UrlTemplate::default(),
            query: BTreeMap::new(),
            filter_by_keys: FilterByKeys::default(),
            publication_latency_hours: DEFAULT_PUBLICATION_LATENCY_HOURS,
            max_concurrent_reads: DEFAULT_MAX_CONCURRENT_READS,
            description: String::new(),
            legacy: None,
        }
    }
}

/// A user-facing parameter, as listed in catalog introspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub default: Value,
    #[serde(default)]
    pub description: String,
}

/// Output of parameter resolution: what every construction path converges on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameters {
    pub cycle: ResolvedCycle,
    pub max_lead_time: u32,
    pub lead_times: LeadTimeSequence,
}

impl SourceConfig {
    /// High-level construction from `cycle` and `max_lead_time`.
    pub fn new(cycle: impl Into<CycleInput>, max_lead_time: impl Into<LeadTimeInput>) -> Self {
        Self {
            cycle: cycle.into(),
            max_lead_time: max_lead_time.into(),
            ..Self::default()
        }
    }

    /// Legacy construction from explicit date, run hour and lead token.
    pub fn legacy(legacy: LegacyParameters) -> Self {
        Self {
            legacy: Some(legacy),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_access_method(mut self, access_method: AccessMethod) -> Self {
        self.access_method = access_method;
        self
    }

    pub fn with_filter(mut self, filter: FilterByKeys) -> Self {
        self.filter_by_keys = filter;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn publication_latency(&self) -> Duration {
        Duration::hours(i64::from(self.publication_latency_hours))
    }

    /// The user parameters every source declares.
    pub fn parameters() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec {
                name: "cycle".into(),
                kind: "datetime".into(),
                default: Value::String("today".into()),
                description: "Forecast cycle: ISO-8601 timestamp, \"today\" or \"latest\"".into(),
            },
            ParameterSpec {
                name: "max_lead_time".into(),
                kind: "int".into(),
                default: Value::Number(u64::from(DEFAULT_MAX_LEAD_TIME).into()),
                description: "Maximum forecast lead time in hours (3-hourly steps)".into(),
            },
        ]
    }

    /// Build a configuration from an override map, validating every key.
    pub fn from_overrides(overrides: &BTreeMap<String, Value>) -> Result<Self> {
        let has_legacy = LEGACY_KEYS.iter().any(|k| overrides.contains_key(*k));
        if has_legacy {
            if let Some(key) = CYCLE_KEYS.iter().find(|k| overrides.contains_key(**k)) {
                return Err(SourceError::invalid_config(
                    *key,
                    format!(
                        "cannot be combined with legacy parameters ({})",
                        LEGACY_KEYS.join(", ")
                    ),
                ));
            }
        }
        if overrides.contains_key("max_lead_time_fXXX")
            && overrides.contains_key("max_lead_time_fxxx")
        {
            return Err(SourceError::invalid_config(
                "max_lead_time_fxxx",
                "alias of max_lead_time_fXXX; give only one of them",
            ));
        }
        if overrides.contains_key("filter_by_keys")
            && overrides.contains_key("cfgrib_filter_by_keys")
        {
            return Err(SourceError::invalid_config(
                "cfgrib_filter_by_keys",
                "alias of filter_by_keys; give only one of them",
            ));
        }

        let mut config = Self::default();
        let mut legacy = LegacyParameters::default();

        for (key, value) in overrides {
            match key.as_str() {
                "cycle" => config.cycle = cycle_input(key, value)?,
                "max_lead_time" => config.max_lead_time = lead_time_input(value),
                "base_url" => config.base_url = expect_string(key, value)?,
                "access_method" => config.access_method = expect_string(key, value)?.parse()?,
                "url_template" => config.url_template = UrlTemplate::new(expect_string(key, value)?)?,
                "query" => config.query = string_map(key, value)?,
                "filter_by_keys" | "cfgrib_filter_by_keys" => {
                    config.filter_by_keys = serde_yaml::from_value(value.clone())
                        .map_err(|e| SourceError::invalid_config(key.as_str(), e.to_string()))?
                }
                "publication_latency_hours" => {
                    config.publication_latency_hours = expect_u32(key, value)?
                }
                "max_concurrent_reads" => {
                    let n = expect_u32(key, value)?;
                    if n == 0 {
                        return Err(SourceError::invalid_config(key.as_str(), "must be at least 1"));
                    }
                    config.max_concurrent_reads = n as usize;
                }
                "description" => config.description = expect_string(key, value)?,
                "date_str" => legacy.date_str = Some(expect_scalar(key, value)?),
                "max_lead_time_fXXX" | "max_lead_time_fxxx" => {
                    legacy.max_lead_time_fxxx = Some(expect_scalar(key, value)?)
                }
                "model_run_time" => legacy.model_run_time = Some(expect_scalar(key, value)?),
                other => {
                    return Err(SourceError::invalid_config(other, "unknown parameter"));
                }
            }
        }

        if has_legacy {
            config.legacy = Some(legacy);
        }

        config.validate()?;

        debug!(
            keys = overrides.len(),
            legacy = has_legacy,
            "Built source configuration from overrides"
        );
        Ok(config)
    }

    /// Layer `overrides` on top of `base` and validate the result.
    ///
    /// `overrides` always wins. When `overrides` switches to the legacy
    /// keywords, `cycle`/`max_lead_time` inherited from `base` are dropped.
    pub fn merged(base: &BTreeMap<String, Value>, overrides: &BTreeMap<String, Value>) -> Result<Self> {
        Self::from_overrides(&merge_layers(base, overrides))
    }

    /// Check the settings that depend on each other: the URL template against
    /// the base URL, and the filter against what the access method can apply.
    pub fn validate(&self) -> Result<()> {
        self.url_template.validate(&self.base_url, self.access_method)?;

        if self.access_method == AccessMethod::Ncss {
            if let Some(key) = self
                .filter_by_keys
                .keys()
                .find(|key| !NCSS_FILTER_KEYS.contains(key))
            {
                return Err(SourceError::invalid_config(
                    "filter_by_keys",
                    format!(
                        "'{}' cannot be applied to ncss partitions (only shortName); \
                         select levels through the query parameters",
                        key
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Resolve cycle and lead times against `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<ResolvedParameters> {
        match &self.legacy {
            Some(legacy) => from_legacy(legacy, now, self.publication_latency()),
            None => from_cycle_params(
                &self.cycle,
                &self.max_lead_time,
                now,
                self.publication_latency(),
            ),
        }
    }
}

/// Merge two override layers; see [`SourceConfig::merged`].
pub fn merge_layers(
    base: &BTreeMap<String, Value>,
    overrides: &BTreeMap<String, Value>,
) -> BTreeMap<String, Value> {
    let legacy_override = LEGACY_KEYS.iter().any(|k| overrides.contains_key(*k));
    let mut merged: BTreeMap<String, Value> = base
        .iter()
        .filter(|(k, _)| !(legacy_override && CYCLE_KEYS.contains(&k.as_str())))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if overrides.contains_key("filter_by_keys") {
        merged.remove("cfgrib_filter_by_keys");
    }
    if overrides.contains_key("cfgrib_filter_by_keys") {
        merged.remove("filter_by_keys");
    }
    for (k, v) in overrides {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// High-level path: `cycle` + `max_lead_time`.
pub fn from_cycle_params(
    cycle: &CycleInput,
    max_lead_time: &LeadTimeInput,
    now: DateTime<Utc>,
    latency: Duration,
) -> Result<ResolvedParameters> {
    let cycle = resolve_cycle(cycle, now, latency)?;
    let (max_lead_time, lead_times) = resolve_lead_input(max_lead_time)?;
    Ok(ResolvedParameters {
        cycle,
        max_lead_time,
        lead_times,
    })
}

/// Legacy path: explicit date, run hour and lead token.
///
/// Without a date the cycle falls back to the latest published one (or to
/// today's date when only the run hour is given). Without a token the
/// default lead range applies.
pub fn from_legacy(
    legacy: &LegacyParameters,
    now: DateTime<Utc>,
    latency: Duration,
) -> Result<ResolvedParameters> {
    let run = legacy
        .model_run_time
        .as_deref()
        .map(parse_run_hour)
        .transpose()?;
    let date = legacy
        .date_str
        .as_deref()
        .map(parse_compact_date)
        .transpose()?;

    let cycle = match (date, run) {
        (Some(date), Some(run)) => ForecastCycle::new(date, run),
        (Some(date), None) => ForecastCycle::new(date, ModelCycle::Z00),
        (None, Some(run)) => ForecastCycle::new(now.date_naive(), run),
        (None, None) => floor_to_cycle(now - latency),
    };

    let lead_input = match &legacy.max_lead_time_fxxx {
        Some(token) => LeadTimeInput::Token(token.clone()),
        None => LeadTimeInput::default(),
    };
    let (max_lead_time, lead_times) = resolve_lead_input(&lead_input)?;

    Ok(ResolvedParameters {
        cycle: ResolvedCycle {
            label: cycle.iso_label(),
            cycle,
        },
        max_lead_time,
        lead_times,
    })
}

fn cycle_input(key: &str, value: &Value) -> Result<CycleInput> {
    match value {
        Value::Null => Ok(CycleInput::default()),
        Value::String(s) => Ok(CycleInput::from_text(s)),
        other => Err(SourceError::invalid_config(
            key,
            format!("expected a timestamp string, got {}", describe(other)),
        )),
    }
}

fn lead_time_input(value: &Value) -> LeadTimeInput {
    match value {
        Value::Null => LeadTimeInput::default(),
        Value::Number(n) => match n.as_i64() {
            Some(hours) => LeadTimeInput::Hours(hours),
            None => LeadTimeInput::Invalid(n.to_string()),
        },
        Value::String(s) => LeadTimeInput::from_text(s),
        other => LeadTimeInput::Invalid(describe(other)),
    }
}

fn expect_string(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(SourceError::invalid_config(
            key,
            format!("expected a string, got {}", describe(other)),
        )),
    }
}

/// Strings and numbers, rendered as text (`date_str: 20240115` is a number in YAML).
fn expect_scalar(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(SourceError::invalid_config(
            key,
            format!("expected a string, got {}", describe(other)),
        )),
    }
}

fn expect_u32(key: &str, value: &Value) -> Result<u32> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            SourceError::invalid_config(
                key,
                format!("expected a non-negative integer, got {}", describe(value)),
            )
        })
}

fn string_map(key: &str, value: &Value) -> Result<BTreeMap<String, String>> {
    let mapping = value.as_mapping().ok_or_else(|| {
        SourceError::invalid_config(key, format!("expected a mapping, got {}", describe(value)))
    })?;
    mapping
        .iter()
        .map(|(k, v)| {
            let k = expect_scalar(key, k)?;
            let v = match v {
                Value::Bool(b) => b.to_string(),
                other => expect_scalar(key, other)?,
            };
            Ok((k, v))
        })
        .collect()
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s),
        Value::Sequence(_) => "a list".into(),
        Value::Mapping(_) => "a mapping".into(),
        Value::Tagged(t) => format!("tagged value {}", t.tag),
    }
}
