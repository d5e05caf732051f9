//! Error types for the GFS source.

use gfs_common::ParameterError;
use gfs_decode::DecodeError;
use thiserror::Error;

use crate::fetch::FetchError;

/// Underlying failure of a probe or partition read.
#[derive(Error, Debug)]
pub enum PartitionCause {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Errors raised by source construction, schema discovery and reads.
#[derive(Error, Debug)]
pub enum SourceError {
    /// `InvalidCycleFormat` / `InvalidMaxLeadTime`
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("Invalid configuration for '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("Schema discovery failed for {url}: {cause}")]
    SchemaDiscovery {
        url: String,
        #[source]
        cause: PartitionCause,
    },

    #[error("Failed to read partition {index} ({url}): {cause}")]
    PartitionRead {
        index: usize,
        url: String,
        #[source]
        cause: PartitionCause,
    },

    #[error("Partition {index} ({url}) does not match the discovered schema: {details}")]
    SchemaMismatch {
        index: usize,
        url: String,
        details: String,
    },

    #[error("Partition index {index} out of range (source has {count} partitions)")]
    PartitionIndexOutOfRange { index: usize, count: usize },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Unknown catalog source: {0}")]
    UnknownSource(String),

    #[error("Failed to assemble dataset: {0}")]
    Assembly(String),
}

impl SourceError {
    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn is_invalid_cycle(&self) -> bool {
        matches!(
            self,
            SourceError::Parameter(ParameterError::InvalidCycleFormat { .. })
        )
    }

    pub fn is_invalid_max_lead_time(&self) -> bool {
        matches!(
            self,
            SourceError::Parameter(ParameterError::InvalidMaxLeadTime { .. })
        )
    }
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
