//! The partitioned GFS forecast source.
//!
//! A source is built from a [`SourceConfig`], resolves its cycle and lead
//! times once at construction, and maps each lead time to one partition URL.
//! Partitions are fetched and decoded independently; the merged dataset is
//! only assembled by [`GfsForecastSource::read`].

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use gfs_common::{ForecastCycle, LeadTimeSequence};
use gfs_decode::{Coordinate, GridDataset, PartitionDecoder};
use metrics::counter;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::config::{AccessMethod, ResolvedParameters, SourceConfig};
use crate::error::{PartitionCause, Result, SourceError};
use crate::fetch::{DefaultFetcher, FetchConfig, PartitionFetcher};
use crate::schema::{Schema, LEAD_DIMENSION};
use crate::url::UrlContext;

/// One independently retrievable unit: a single lead time of the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub index: usize,
    pub lead_time: u32,
    pub url: String,
}

/// Read-only description of a constructed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceMetadata {
    /// The ISO input as given, or the canonical label for aliases.
    pub cycle: String,
    pub max_lead_time: u32,
    /// Two-digit hour plus `Z`, e.g. `18Z`.
    pub model_run_time: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub description: String,
    pub lead_times: Vec<u32>,
    pub access_method: String,
    pub base_url: String,
}

/// GFS forecast source over one cycle.
pub struct GfsForecastSource {
    config: SourceConfig,
    resolved: ResolvedParameters,
    urls: Vec<String>,
    fetcher: Arc<dyn PartitionFetcher>,
    decoder: Arc<dyn PartitionDecoder>,
    schema: OnceCell<Schema>,
}

impl std::fmt::Debug for GfsForecastSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GfsForecastSource")
            .field("cycle", &self.resolved.cycle.label)
            .field("max_lead_time", &self.resolved.max_lead_time)
            .field("npartitions", &self.urls.len())
            .field("decoder", &self.decoder.format_name())
            .field("schema_discovered", &self.schema.initialized())
            .finish()
    }
}

impl GfsForecastSource {
    /// Build a source, reading the wall clock once for `today`/`latest`.
    pub fn new(config: SourceConfig) -> Result<Self> {
        Self::new_at(config, Utc::now())
    }

    /// Build a source with default transport and decoder, resolving aliases
    /// against `now`.
    pub fn new_at(config: SourceConfig, now: DateTime<Utc>) -> Result<Self> {
        let fetcher = DefaultFetcher::new(FetchConfig::default())
            .map_err(|e| SourceError::invalid_config("transport", e.to_string()))?;
        let decoder = default_decoder(config.access_method);
        Self::with_collaborators(config, now, Arc::new(fetcher), decoder)
    }

    /// Build a source with explicit transport and decoding collaborators.
    pub fn with_collaborators(
        config: SourceConfig,
        now: DateTime<Utc>,
        fetcher: Arc<dyn PartitionFetcher>,
        decoder: Arc<dyn PartitionDecoder>,
    ) -> Result<Self> {
        config.validate()?;
        let resolved = config.resolve(now)?;

        let urls = resolved
            .lead_times
            .iter()
            .map(|lead_time| {
                config.url_template.render(&UrlContext {
                    base_url: &config.base_url,
                    access_method: config.access_method,
                    cycle: &resolved.cycle.cycle,
                    lead_time,
                    query: &config.query,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            cycle = %resolved.cycle.label,
            max_lead_time = resolved.max_lead_time,
            partitions = urls.len(),
            access_method = %config.access_method,
            decoder = decoder.format_name(),
            "Configured GFS forecast source"
        );

        Ok(Self {
            config,
            resolved,
            urls,
            fetcher,
            decoder,
            schema: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn cycle(&self) -> &ForecastCycle {
        &self.resolved.cycle.cycle
    }

    pub fn date(&self) -> NaiveDate {
        self.resolved.cycle.cycle.date
    }

    /// Run hour of the resolved cycle (0, 6, 12 or 18).
    pub fn model_run_time(&self) -> u32 {
        self.resolved.cycle.cycle.hour()
    }

    pub fn max_lead_time(&self) -> u32 {
        self.resolved.max_lead_time
    }

    pub fn lead_times(&self) -> &LeadTimeSequence {
        &self.resolved.lead_times
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn access_method(&self) -> AccessMethod {
        self.config.access_method
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn metadata(&self) -> SourceMetadata {
        let cycle = self.cycle();
        SourceMetadata {
            cycle: self.resolved.cycle.label.clone(),
            max_lead_time: self.resolved.max_lead_time,
            model_run_time: cycle.run.token(),
            date: cycle.date_string(),
            description: self.config.description.clone(),
            lead_times: self.resolved.lead_times.as_slice().to_vec(),
            access_method: self.config.access_method.to_string(),
            base_url: self.config.base_url.clone(),
        }
    }

    pub fn npartitions(&self) -> usize {
        self.urls.len()
    }

    pub fn partition_url(&self, index: usize) -> Result<&str> {
        self.urls
            .get(index)
            .map(String::as_str)
            .ok_or(SourceError::PartitionIndexOutOfRange {
                index,
                count: self.urls.len(),
            })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Partition descriptors in lead-time order, for external schedulers.
    pub fn partitions(&self) -> Vec<Partition> {
        self.resolved
            .lead_times
            .iter()
            .zip(&self.urls)
            .enumerate()
            .map(|(index, (lead_time, url))| Partition {
                index,
                lead_time,
                url: url.clone(),
            })
            .collect()
    }

    /// The schema, if it has already been discovered.
    pub fn cached_schema(&self) -> Option<&Schema> {
        self.schema.get()
    }

    /// Probe partition 0 and cache its schema for the life of the source.
    ///
    /// A failed probe is not cached; the next call probes again.
    #[instrument(skip(self), fields(cycle = %self.resolved.cycle.label))]
    pub async fn discover_schema(&self) -> Result<&Schema> {
        let (schema, _) = self.schema_and_probe().await?;
        Ok(schema)
    }

    /// The schema, plus the tagged probe dataset when this call did the probing.
    async fn schema_and_probe(&self) -> Result<(&Schema, Option<GridDataset>)> {
        let mut probed = None;
        let slot = &mut probed;
        let schema = self
            .schema
            .get_or_try_init(|| async move {
                let url = self.partition_url(0)?;
                counter!("gfs_schema_discoveries_total").increment(1);

                let probe = self.load(0, url).await.map_err(|cause| {
                    warn!(url = %url, error = %cause, "Schema discovery failed");
                    SourceError::SchemaDiscovery {
                        url: url.to_string(),
                        cause,
                    }
                })?;

                let schema = Schema::from_probe(&probe, &self.resolved.lead_times);
                info!(
                    variables = ?schema.variable_names(),
                    partitions = schema.npartitions,
                    "Discovered schema"
                );
                *slot = Some(probe);
                Ok::<_, SourceError>(schema)
            })
            .await?;
        Ok((schema, probed))
    }

    /// Fetch and decode partition `index`, tagged with its lead time.
    #[instrument(skip(self), fields(cycle = %self.resolved.cycle.label))]
    pub async fn read_partition(&self, index: usize) -> Result<GridDataset> {
        let url = self.partition_url(index)?;
        counter!("gfs_partition_reads_total").increment(1);

        self.load(index, url).await.map_err(|cause| {
            counter!("gfs_partition_read_failures_total").increment(1);
            warn!(index, url = %url, error = %cause, "Partition read failed");
            SourceError::PartitionRead {
                index,
                url: url.to_string(),
                cause,
            }
        })
    }

    /// Read every partition and stack them along the lead-time dimension.
    ///
    /// Partitions are read with bounded concurrency but merged in lead-time
    /// order. Each must conform to the discovered schema. When this call
    /// discovers the schema, the probed partition 0 is reused, not refetched.
    #[instrument(skip(self), fields(cycle = %self.resolved.cycle.label))]
    pub async fn read(&self) -> Result<GridDataset> {
        let (schema, mut probe) = self.schema_and_probe().await?;

        let parts: Vec<GridDataset> = stream::iter(0..self.npartitions())
            .map(|index| {
                let reused = if index == 0 { probe.take() } else { None };
                async move {
                    match reused {
                        Some(dataset) => Ok(dataset),
                        None => self.read_partition(index).await,
                    }
                }
            })
            .buffered(self.config.max_concurrent_reads.max(1))
            .try_collect()
            .await?;

        for (index, part) in parts.iter().enumerate() {
            schema
                .conform(part)
                .map_err(|details| SourceError::SchemaMismatch {
                    index,
                    url: self.urls[index].clone(),
                    details,
                })?;
        }

        let mut merged = GridDataset::concat(&parts, LEAD_DIMENSION)
            .map_err(|e| SourceError::Assembly(e.to_string()))?;

        let cycle = self.cycle();
        merged.attrs.remove("valid_time");
        merged.set_attr("cycle", self.resolved.cycle.label.clone());
        merged.set_attr("reference_time", cycle.reference_time().to_rfc3339());
        merged.set_attr("model_run_time", cycle.run.token());
        if !self.config.description.is_empty() {
            merged.set_attr("description", self.config.description.clone());
        }

        info!(
            partitions = parts.len(),
            variables = merged.variables.len(),
            "Assembled dataset"
        );
        Ok(merged)
    }

    async fn load(&self, index: usize, url: &str) -> std::result::Result<GridDataset, PartitionCause> {
        let lead_time = self.resolved.lead_times.get(index).unwrap_or_default();

        let bytes = self.fetcher.fetch(url).await?;
        counter!("gfs_partition_bytes_total").increment(bytes.len() as u64);

        let dataset = self.decoder.decode(&bytes, &self.config.filter_by_keys)?;
        debug!(
            index,
            lead_time,
            bytes = bytes.len(),
            variables = dataset.variables.len(),
            "Decoded partition"
        );

        let mut tagged = dataset.insert_leading_dim(
            Coordinate::new(LEAD_DIMENSION, vec![f64::from(lead_time)]).with_units("hours"),
        )?;
        tagged.set_attr(
            "valid_time",
            self.cycle().valid_time(lead_time).to_rfc3339(),
        );
        Ok(tagged)
    }
}

/// Decoder matching what the access method serves.
pub fn default_decoder(access_method: AccessMethod) -> Arc<dyn PartitionDecoder> {
    match access_method {
        AccessMethod::FileServer => Arc::new(gfs_decode::Grib2Decoder::default()),
        #[cfg(feature = "netcdf")]
        AccessMethod::Ncss => Arc::new(gfs_decode::NetcdfDecoder::new()),
        #[cfg(not(feature = "netcdf"))]
        AccessMethod::Ncss => Arc::new(gfs_decode::UnsupportedDecoder { format: "netcdf" }),
    }
}
