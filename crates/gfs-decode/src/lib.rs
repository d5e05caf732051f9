//! Decoding of GFS forecast partitions.
//!
//! A partition is one remote file for a single (cycle, lead time) pair. This
//! crate turns its bytes into a [`GridDataset`]: named variables over named
//! dimensions with coordinate values, the shape every downstream consumer
//! works with.
//!
//! # Decoders
//!
//! - [`Grib2Decoder`] for files served as-is by the archive (`fileServer`)
//! - `NetcdfDecoder` for NCSS subsets (behind the `netcdf` feature, since it
//!   links against libnetcdf)

pub mod dataset;
pub mod error;
pub mod filter;
pub mod grib2;
#[cfg(feature = "netcdf")]
pub mod ncss;
pub mod tables;

pub use dataset::{Coordinate, DType, DataVariable, GridDataset, VariableData};
pub use error::{DecodeError, DecodeResult};
pub use filter::{FilterByKeys, FilterKey, FilterValue, MessageKeys};
pub use grib2::Grib2Decoder;
#[cfg(feature = "netcdf")]
pub use ncss::NetcdfDecoder;
pub use tables::{Grib2Tables, LevelDescription};

/// Turns the raw bytes of one partition into a labeled dataset.
///
/// Implementations must be stateless with respect to the bytes they are given
/// so that partitions can be decoded concurrently.
pub trait PartitionDecoder: Send + Sync {
    /// Decode a partition, keeping only fields accepted by `filter`.
    fn decode(&self, bytes: &[u8], filter: &FilterByKeys) -> DecodeResult<GridDataset>;

    /// Short format name for logs.
    fn format_name(&self) -> &'static str;
}

/// Decoder used when a source is configured for NCSS access but the crate
/// was built without NetCDF support.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedDecoder {
    pub format: &'static str,
}

impl PartitionDecoder for UnsupportedDecoder {
    fn decode(&self, _bytes: &[u8], _filter: &FilterByKeys) -> DecodeResult<GridDataset> {
        Err(DecodeError::Unsupported(format!(
            "{} decoding is not available in this build",
            self.format
        )))
    }

    fn format_name(&self) -> &'static str {
        self.format
    }
}
