//! YAML catalog binding.
//!
//! A catalog maps logical dataset names to source arguments and documented
//! parameter defaults:
//!
//! ```yaml
//! metadata:
//!   version: 1
//! sources:
//!   gfs_surface_winds:
//!     description: 10 m wind components
//!     driver: gfs_forecast
//!     parameters:
//!       cycle: {type: datetime, default: today}
//!       max_lead_time: {type: int, default: 24}
//!     args:
//!       filter_by_keys: {typeOfLevel: heightAboveGround, level: 10}
//! ```
//!
//! Values are layered as parameter defaults, then `args`, then the caller's
//! overrides, so a catalog never overrides what the caller passed.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gfs_decode::PartitionDecoder;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{debug, info};

use crate::config::{merge_layers, ParameterSpec, SourceConfig};
use crate::error::{Result, SourceError};
use crate::fetch::PartitionFetcher;
use crate::source::GfsForecastSource;

/// Driver name for [`GfsForecastSource`] entries.
pub const GFS_FORECAST_DRIVER: &str = "gfs_forecast";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogMetadata {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub description: String,
}

/// A user parameter declared by a catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDecl {
    #[serde(rename = "type")]
    pub kind: String,
    pub default: Value,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub description: String,
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterDecl>,
    #[serde(default)]
    pub args: BTreeMap<String, Value>,
}

fn default_driver() -> String {
    GFS_FORECAST_DRIVER.to_string()
}

impl CatalogEntry {
    /// Declared parameters, falling back to the source's own declarations
    /// for any the entry leaves out.
    pub fn parameter_specs(&self) -> Vec<ParameterSpec> {
        let mut specs = SourceConfig::parameters();
        for spec in &mut specs {
            if let Some(decl) = self.parameters.get(&spec.name) {
                spec.kind = decl.kind.clone();
                spec.default = decl.default.clone();
                if !decl.description.is_empty() {
                    spec.description = decl.description.clone();
                }
            }
        }
        for (name, decl) in &self.parameters {
            if !specs.iter().any(|s| &s.name == name) {
                specs.push(ParameterSpec {
                    name: name.clone(),
                    kind: decl.kind.clone(),
                    default: decl.default.clone(),
                    description: decl.description.clone(),
                });
            }
        }
        specs
    }

    /// Catalog-supplied layer: parameter defaults under `args`, plus the
    /// entry description.
    fn base_layer(&self) -> BTreeMap<String, Value> {
        let defaults = self
            .parameters
            .iter()
            .map(|(name, decl)| (name.clone(), decl.default.clone()))
            .collect();
        let mut base = merge_layers(&defaults, &self.args);
        base.entry("description".to_string())
            .or_insert_with(|| Value::String(self.description.clone()));
        base
    }
}

/// A set of named GFS sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub metadata: CatalogMetadata,
    #[serde(default)]
    pub sources: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Catalog(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::from_yaml(&text)?;
        info!(
            path = %path.display(),
            sources = catalog.sources.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| SourceError::Catalog(e.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    pub fn entry(&self, name: &str) -> Result<&CatalogEntry> {
        self.sources
            .get(name)
            .ok_or_else(|| SourceError::UnknownSource(name.to_string()))
    }

    pub fn description(&self, name: &str) -> Result<&str> {
        Ok(self.entry(name)?.description.as_str())
    }

    /// Validated configuration for `name` with the caller's overrides applied.
    pub fn config(&self, name: &str, overrides: &BTreeMap<String, Value>) -> Result<SourceConfig> {
        let entry = self.entry(name)?;
        if entry.driver != GFS_FORECAST_DRIVER {
            return Err(SourceError::invalid_config(
                "driver",
                format!(
                    "source {} uses driver '{}', expected '{}'",
                    name, entry.driver, GFS_FORECAST_DRIVER
                ),
            ));
        }
        debug!(source = name, overrides = overrides.len(), "Building source configuration");
        SourceConfig::merged(&entry.base_layer(), overrides)
    }

    pub fn open(&self, name: &str, overrides: &BTreeMap<String, Value>) -> Result<GfsForecastSource> {
        self.open_at(name, overrides, Utc::now())
    }

    pub fn open_at(
        &self,
        name: &str,
        overrides: &BTreeMap<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<GfsForecastSource> {
        GfsForecastSource::new_at(self.config(name, overrides)?, now)
    }

    /// Open `name` with explicit transport and decoding collaborators.
    pub fn open_with(
        &self,
        name: &str,
        overrides: &BTreeMap<String, Value>,
        now: DateTime<Utc>,
        fetcher: Arc<dyn PartitionFetcher>,
        decoder: Arc<dyn PartitionDecoder>,
    ) -> Result<GfsForecastSource> {
        GfsForecastSource::with_collaborators(self.config(name, overrides)?, now, fetcher, decoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gfs_common::LeadTimeInput;
    use gfs_decode::FilterKey;

    const SHIPPED: &str = include_str!("../../../config/gfs_catalog.yaml");

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap()
    }

    fn overrides(yaml: &str) -> BTreeMap<String, Value> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_shipped_catalog() {
        let catalog = Catalog::from_yaml(SHIPPED).unwrap();
        assert_eq!(
            catalog.names(),
            vec!["gfs_forecast", "gfs_ice_concentration", "gfs_surface_winds"]
        );
        for name in catalog.names() {
            assert!(!catalog.description(name).unwrap().is_empty(), "{name}");
            catalog.config(name, &BTreeMap::new()).unwrap();
        }

        let winds = catalog.config("gfs_surface_winds", &BTreeMap::new()).unwrap();
        assert!(winds.filter_by_keys.values(FilterKey::ShortName).is_some());
        assert_eq!(winds.description, catalog.description("gfs_surface_winds").unwrap());
    }

    #[test]
    fn test_caller_overrides_win() {
        let catalog = Catalog::from_yaml(SHIPPED).unwrap();
        let source = catalog
            .open_at(
                "gfs_forecast",
                &overrides("cycle: '2024-01-15T18:00:00'\nmax_lead_time: 6"),
                now(),
            )
            .unwrap();
        assert_eq!(source.max_lead_time(), 6);
        assert_eq!(source.npartitions(), 3);
        assert_eq!(source.metadata().cycle, "2024-01-15T18:00:00");
    }

    #[test]
    fn test_parameter_defaults_apply() {
        let catalog = Catalog::from_yaml(
            r#"
sources:
  short_range:
    description: First six hours
    parameters:
      max_lead_time: {type: int, default: 6}
"#,
        )
        .unwrap();
        let config = catalog.config("short_range", &BTreeMap::new()).unwrap();
        assert_eq!(config.max_lead_time, LeadTimeInput::Hours(6));

        let specs = catalog.entry("short_range").unwrap().parameter_specs();
        assert_eq!(specs[0].name, "cycle");
        assert_eq!(specs[1].default.as_u64(), Some(6));
    }

    #[test]
    fn test_unknown_source_and_driver() {
        let catalog = Catalog::from_yaml(
            r#"
sources:
  radar:
    description: Not a GFS product
    driver: mrms
"#,
        )
        .unwrap();
        assert!(matches!(
            catalog.open_at("nope", &BTreeMap::new(), now()).unwrap_err(),
            SourceError::UnknownSource(name) if name == "nope"
        ));
        assert!(matches!(
            catalog.open_at("radar", &BTreeMap::new(), now()).unwrap_err(),
            SourceError::InvalidConfig { key, .. } if key == "driver"
        ));
    }

    #[test]
    fn test_bad_args_rejected() {
        let catalog = Catalog::from_yaml(
            r#"
sources:
  broken:
    description: Misspelled argument
    args:
      baseurl: https://example.test
"#,
        )
        .unwrap();
        let err = catalog.config("broken", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, SourceError::InvalidConfig { key, .. } if key == "baseurl"));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            Catalog::from_yaml("sources: [1, 2").unwrap_err(),
            SourceError::Catalog(_)
        ));
        assert!(matches!(
            Catalog::load("/nonexistent/catalog.yaml").unwrap_err(),
            SourceError::Catalog(_)
        ));
    }
}
