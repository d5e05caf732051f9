//! Partitioned GFS forecast source.
//!
//! A [`GfsForecastSource`] covers one forecast cycle. Each lead time is one
//! partition, a single remote file whose URL is rendered from a configurable
//! template. Partitions are fetched through a [`PartitionFetcher`], decoded
//! by a [`gfs_decode::PartitionDecoder`] and stacked along the `step`
//! dimension.
//!
//! Sources are usually opened by name from a YAML [`Catalog`]:
//!
//! ```no_run
//! # async fn example() -> gfs_source::Result<()> {
//! use std::collections::BTreeMap;
//! use gfs_source::Catalog;
//!
//! let catalog = Catalog::load("config/gfs_catalog.yaml")?;
//! let source = catalog.open("gfs_surface_winds", &BTreeMap::new())?;
//! let dataset = source.read().await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod schema;
pub mod source;
pub mod url;

pub use catalog::{Catalog, CatalogEntry, CatalogMetadata, ParameterDecl, GFS_FORECAST_DRIVER};
pub use config::{
    from_cycle_params, from_legacy, merge_layers, AccessMethod, LegacyParameters, ParameterSpec,
    ResolvedParameters, SourceConfig, DEFAULT_BASE_URL,
};
pub use error::{PartitionCause, Result, SourceError};
pub use fetch::{
    DefaultFetcher, FetchConfig, FetchError, FetchResult, HttpFetcher, LocalFetcher,
    PartitionFetcher,
};
pub use schema::{Schema, VariableSchema, LEAD_DIMENSION};
pub use source::{default_decoder, GfsForecastSource, Partition, SourceMetadata};
pub use url::{UrlContext, UrlTemplate, DEFAULT_URL_TEMPLATE};
