//! Dataset schema discovered from the probe partition.
//!
//! Every partition of a source is assumed to decode to the same variables
//! with the same dtypes, dims and per-partition shapes. The schema records
//! what partition 0 looked like; [`Schema::conform`] checks that assumption
//! for every later partition before they are merged.

use std::collections::BTreeMap;

use gfs_common::LeadTimeSequence;
use gfs_decode::{DType, GridDataset};
use serde::Serialize;

/// Lead-time dimension partitions are tagged with and merged along.
pub const LEAD_DIMENSION: &str = "step";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableSchema {
    pub dtype: DType,
    pub dims: Vec<String>,
    /// Per-partition shape, including the singleton lead axis.
    pub shape: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub variables: BTreeMap<String, VariableSchema>,
    /// Dimension lengths of the assembled dataset.
    pub coords: BTreeMap<String, usize>,
    pub npartitions: usize,
    pub lead_times: Vec<u32>,
}

impl Schema {
    /// Describe the source from its tagged probe partition.
    pub fn from_probe(probe: &GridDataset, lead_times: &LeadTimeSequence) -> Self {
        let variables = probe
            .variables
            .iter()
            .map(|(name, variable)| {
                (
                    name.clone(),
                    VariableSchema {
                        dtype: variable.dtype(),
                        dims: variable.dims.clone(),
                        shape: variable.shape().to_vec(),
                    },
                )
            })
            .collect();

        let coords = probe
            .coords
            .iter()
            .map(|(name, coord)| {
                let len = if name == LEAD_DIMENSION {
                    lead_times.len()
                } else {
                    coord.len()
                };
                (name.clone(), len)
            })
            .collect();

        Self {
            variables,
            coords,
            npartitions: lead_times.len(),
            lead_times: lead_times.as_slice().to_vec(),
        }
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.keys().map(String::as_str).collect()
    }

    /// Shape of `variable` once all partitions are stacked.
    pub fn dataset_shape(&self, variable: &str) -> Option<Vec<usize>> {
        let schema = self.variables.get(variable)?;
        Some(
            schema
                .dims
                .iter()
                .zip(&schema.shape)
                .map(|(dim, len)| {
                    if dim == LEAD_DIMENSION {
                        self.npartitions
                    } else {
                        *len
                    }
                })
                .collect(),
        )
    }

    /// Check a tagged partition against the schema, describing the first
    /// difference found.
    pub fn conform(&self, partition: &GridDataset) -> Result<(), String> {
        for name in self.variables.keys() {
            if partition.variable(name).is_none() {
                return Err(format!("variable {} is missing", name));
            }
        }
        for (name, variable) in &partition.variables {
            let expected = self
                .variables
                .get(name)
                .ok_or_else(|| format!("unexpected variable {}", name))?;

            if variable.dtype() != expected.dtype {
                return Err(format!(
                    "variable {} has dtype {}, expected {}",
                    name,
                    variable.dtype(),
                    expected.dtype
                ));
            }
            if variable.dims != expected.dims {
                return Err(format!(
                    "variable {} has dims {:?}, expected {:?}",
                    name, variable.dims, expected.dims
                ));
            }
            if variable.shape() != expected.shape.as_slice() {
                return Err(format!(
                    "variable {} has shape {:?}, expected {:?}",
                    name,
                    variable.shape(),
                    expected.shape
                ));
            }
        }
        for (name, coord) in &partition.coords {
            if name == LEAD_DIMENSION {
                continue;
            }
            match self.coords.get(name) {
                Some(len) if *len == coord.len() => {}
                Some(len) => {
                    return Err(format!(
                        "coordinate {} has {} values, expected {}",
                        name,
                        coord.len(),
                        len
                    ))
                }
                None => return Err(format!("unexpected coordinate {}", name)),
            }
        }
        Ok(())
    }
}
