//! Field selection by GRIB message keys.
//!
//! A GFS file mixes fields on incompatible vertical levels, so most sources
//! restrict decoding with a key -> value(s) map such as
//! `{typeOfLevel: heightAboveGround, level: 10}`. A message is kept when every
//! configured key matches one of its listed values.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Message keys understood by the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKey {
    TypeOfLevel,
    ShortName,
    Level,
    Discipline,
    ParameterCategory,
    ParameterNumber,
    /// `instant`, or the statistical process of the field (`accum`, `avg`, ...).
    StepType,
}

impl FilterKey {
    pub const ALL: [FilterKey; 7] = [
        FilterKey::TypeOfLevel,
        FilterKey::ShortName,
        FilterKey::Level,
        FilterKey::Discipline,
        FilterKey::ParameterCategory,
        FilterKey::ParameterNumber,
        FilterKey::StepType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::TypeOfLevel => "typeOfLevel",
            FilterKey::ShortName => "shortName",
            FilterKey::Level => "level",
            FilterKey::Discipline => "discipline",
            FilterKey::ParameterCategory => "parameterCategory",
            FilterKey::ParameterNumber => "parameterNumber",
            FilterKey::StepType => "stepType",
        }
    }
}

impl FromStr for FilterKey {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                DecodeError::InvalidFilter(format!(
                    "unknown key '{}' (expected one of: {})",
                    s,
                    FilterKey::ALL.map(|k| k.as_str()).join(", ")
                ))
            })
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted value for a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
}

impl FilterValue {
    fn matches_text(&self, actual: &str) -> bool {
        match self {
            FilterValue::Text(t) => t.eq_ignore_ascii_case(actual),
            FilterValue::Number(n) => n.to_string() == actual,
        }
    }

    fn matches_number(&self, actual: f64) -> bool {
        match self {
            FilterValue::Number(n) => (n - actual).abs() < 1e-6,
            FilterValue::Text(t) => t
                .trim()
                .parse::<f64>()
                .map(|n| (n - actual).abs() < 1e-6)
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Number(n) => write!(f, "{}", n),
            FilterValue::Text(t) => f.write_str(t),
        }
    }
}

/// Values for one key as written in config: a scalar or a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(FilterValue),
    Many(Vec<FilterValue>),
}

/// Key values of one decoded message, as seen by the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageKeys {
    pub type_of_level: String,
    pub short_name: String,
    pub level: f64,
    pub discipline: u8,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub step_type: String,
}

/// Key -> accepted values map; empty accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, OneOrMany>",
    into = "BTreeMap<String, OneOrMany>"
)]
pub struct FilterByKeys {
    keys: BTreeMap<FilterKey, Vec<FilterValue>>,
}

impl FilterByKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; replaces any values already set for `key`.
    pub fn with(mut self, key: FilterKey, values: Vec<FilterValue>) -> Self {
        self.keys.insert(key, values);
        self
    }

    pub fn with_text(self, key: FilterKey, value: &str) -> Self {
        self.with(key, vec![FilterValue::Text(value.to_string())])
    }

    pub fn with_number(self, key: FilterKey, value: f64) -> Self {
        self.with(key, vec![FilterValue::Number(value)])
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn values(&self, key: FilterKey) -> Option<&[FilterValue]> {
        self.keys.get(&key).map(Vec::as_slice)
    }

    /// Configured keys, in [`FilterKey`] order.
    pub fn keys(&self) -> impl Iterator<Item = FilterKey> + '_ {
        self.keys.keys().copied()
    }

    /// Whether `short_name` passes the shortName key (other keys ignored).
    pub fn accepts_short_name(&self, short_name: &str) -> bool {
        self.values(FilterKey::ShortName)
            .map_or(true, |vals| vals.iter().any(|v| v.matches_text(short_name)))
    }

    /// Whether a message passes every configured key.
    pub fn matches(&self, msg: &MessageKeys) -> bool {
        self.keys.iter().all(|(key, accepted)| {
            accepted.iter().any(|v| match key {
                FilterKey::TypeOfLevel => v.matches_text(&msg.type_of_level),
                FilterKey::ShortName => v.matches_text(&msg.short_name),
                FilterKey::Level => v.matches_number(msg.level),
                FilterKey::Discipline => v.matches_number(f64::from(msg.discipline)),
                FilterKey::ParameterCategory => {
                    v.matches_number(f64::from(msg.parameter_category))
                }
                FilterKey::ParameterNumber => v.matches_number(f64::from(msg.parameter_number)),
                FilterKey::StepType => v.matches_text(&msg.step_type),
            })
        })
    }
}

impl TryFrom<BTreeMap<String, OneOrMany>> for FilterByKeys {
    type Error = DecodeError;

    fn try_from(raw: BTreeMap<String, OneOrMany>) -> Result<Self, Self::Error> {
        let mut keys = BTreeMap::new();
        for (name, value) in raw {
            let key: FilterKey = name.parse()?;
            let values = match value {
                OneOrMany::One(v) => vec![v],
                OneOrMany::Many(vs) => vs,
            };
            if values.is_empty() {
                return Err(DecodeError::InvalidFilter(format!(
                    "key '{}' lists no values",
                    name
                )));
            }
            keys.insert(key, values);
        }
        Ok(Self { keys })
    }
}

impl From<FilterByKeys> for BTreeMap<String, OneOrMany> {
    fn from(filter: FilterByKeys) -> Self {
        filter
            .keys
            .into_iter()
            .map(|(k, mut vs)| {
                let value = if vs.len() == 1 {
                    OneOrMany::One(vs.remove(0))
                } else {
                    OneOrMany::Many(vs)
                };
                (k.as_str().to_string(), value)
            })
            .collect()
    }
}

impl fmt::Display for FilterByKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .keys
            .iter()
            .map(|(k, vs)| {
                let vs: Vec<String> = vs.iter().map(ToString::to_string).collect();
                format!("{}={}", k, vs.join("|"))
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}
