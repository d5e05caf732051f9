//! Partition URL construction.
//!
//! The archive path layout is configuration: a template with placeholders
//! rendered per (cycle, lead) pair.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use gfs_common::{ForecastCycle, ModelCycle};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::AccessMethod;
use crate::error::{Result, SourceError};

/// RDA ds084.1 (GFS 0.25 degree historical archive) layout.
pub const DEFAULT_URL_TEMPLATE: &str =
    "{base_url}/{access_path}/files/g/d084001/{year}/{date}/gfs.0p25.{date}{cycle:02}.f{forecast:03}.grib2";

const PLACEHOLDERS: [&str; 8] = [
    "{base_url}",
    "{access_path}",
    "{year}",
    "{month}",
    "{day}",
    "{date}",
    "{cycle:02}",
    "{forecast:03}",
];

/// Values substituted into a [`UrlTemplate`].
#[derive(Debug, Clone)]
pub struct UrlContext<'a> {
    pub base_url: &'a str,
    pub access_method: AccessMethod,
    pub cycle: &'a ForecastCycle,
    pub lead_time: u32,
    pub query: &'a BTreeMap<String, String>,
}

/// Archive path template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UrlTemplate(String);

impl TryFrom<String> for UrlTemplate {
    type Error = SourceError;

    fn try_from(template: String) -> Result<Self> {
        Self::new(template)
    }
}

impl From<UrlTemplate> for String {
    fn from(template: UrlTemplate) -> Self {
        template.0
    }
}

impl UrlTemplate {
    /// Parse and validate a template; unknown `{...}` placeholders are rejected.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let mut stripped = template.clone();
        for placeholder in PLACEHOLDERS {
            stripped = stripped.replace(placeholder, "");
        }
        if let Some(start) = stripped.find('{') {
            let end = stripped[start..]
                .find('}')
                .map(|e| start + e + 1)
                .unwrap_or(stripped.len());
            return Err(SourceError::invalid_config(
                "url_template",
                format!(
                    "unknown placeholder '{}' (expected one of: {})",
                    &stripped[start..end],
                    PLACEHOLDERS.join(", ")
                ),
            ));
        }
        Ok(Self(template))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the URL for one partition.
    ///
    /// Query parameters are appended in key order so identical inputs always
    /// produce the same string. NCSS access requests NetCDF-3 unless the
    /// caller supplied `accept`.
    pub fn render(&self, ctx: &UrlContext<'_>) -> Result<String> {
        let date = ctx.cycle.date;
        let rendered = self
            .0
            .replace("{base_url}", ctx.base_url.trim_end_matches('/'))
            .replace("{access_path}", ctx.access_method.path_segment())
            .replace("{year}", &format!("{:04}", date.year()))
            .replace("{month}", &format!("{:02}", date.month()))
            .replace("{day}", &format!("{:02}", date.day()))
            .replace("{date}", &ctx.cycle.compact_date())
            .replace("{cycle:02}", &format!("{:02}", ctx.cycle.hour()))
            .replace("{forecast:03}", &format!("{:03}", ctx.lead_time));

        let mut query = ctx.query.clone();
        if ctx.access_method == AccessMethod::Ncss {
            query
                .entry("accept".to_string())
                .or_insert_with(|| "netcdf3".to_string());
        }
        if query.is_empty() {
            return Ok(rendered);
        }

        let mut url = Url::parse(&rendered)
            .map_err(|e| SourceError::invalid_config("base_url", format!("{}: {}", rendered, e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }

    /// Check that the template renders to a parseable URL.
    pub fn validate(&self, base_url: &str, access_method: AccessMethod) -> Result<()> {
        let probe = ForecastCycle::new(
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN),
            ModelCycle::Z00,
        );
        let query = BTreeMap::new();
        let rendered = self.render(&UrlContext {
            base_url,
            access_method,
            cycle: &probe,
            lead_time: 0,
            query: &query,
        })?;
        if rendered.contains("://") {
            Url::parse(&rendered).map_err(|e| {
                SourceError::invalid_config("base_url", format!("{}: {}", rendered, e))
            })?;
        }
        Ok(())
    }
}

impl Default for UrlTemplate {
    fn default() -> Self {
        Self(DEFAULT_URL_TEMPLATE.to_string())
    }
}
