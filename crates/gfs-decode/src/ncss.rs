//! NetCDF decoding for NCSS subset responses.
//!
//! The netcdf library needs a file path, so the response body is written to a
//! temp file first.

use std::io::Write;

use tracing::debug;

use crate::dataset::{Coordinate, DataVariable, GridDataset, VariableData};
use crate::error::{DecodeError, DecodeResult};
use crate::filter::{FilterByKeys, FilterKey};
use crate::PartitionDecoder;

/// Decoder for NetCDF-3/4 bodies returned by the NCSS grid endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfDecoder;

impl NetcdfDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl PartitionDecoder for NetcdfDecoder {
    fn decode(&self, bytes: &[u8], filter: &FilterByKeys) -> DecodeResult<GridDataset> {
        // NetCDF variables are selected by name only
        if let Some(key) = filter.keys().find(|k| *k != FilterKey::ShortName) {
            return Err(DecodeError::InvalidFilter(format!(
                "'{}' cannot be applied to NetCDF partitions",
                key
            )));
        }

        let mut temp = tempfile::Builder::new()
            .prefix("gfs_ncss_")
            .suffix(".nc")
            .tempfile()?;
        temp.write_all(bytes)?;
        temp.flush()?;

        let file = ::netcdf::open(temp.path())
            .map_err(|e| DecodeError::Netcdf(format!("Failed to open NetCDF: {}", e)))?;

        let mut dataset = GridDataset::new();
        let mut data_vars = Vec::new();

        for var in file.variables() {
            let name = var.name();
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
            let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

            if dims.len() == 1 && dims[0] == name {
                let values: Vec<f64> = var
                    .get_values(..)
                    .map_err(|e| DecodeError::Netcdf(format!("Failed to read {}: {}", name, e)))?;
                let mut coord = Coordinate::new(name.clone(), values);
                if let Some(units) = string_attr(&var, "units") {
                    coord = coord.with_units(units);
                }
                dataset.add_coord(coord);
                continue;
            }

            if !filter.accepts_short_name(&name) {
                debug!(variable = %name, "Filtered out NetCDF variable");
                continue;
            }

            let data = if dims.len() >= 2 {
                let values: Vec<f32> = var
                    .get_values(..)
                    .map_err(|e| DecodeError::Netcdf(format!("Failed to read {}: {}", name, e)))?;
                VariableData::f32_from_vec(&shape, values)?
            } else {
                let values: Vec<f64> = var
                    .get_values(..)
                    .map_err(|e| DecodeError::Netcdf(format!("Failed to read {}: {}", name, e)))?;
                VariableData::f64_from_vec(&shape, values)?
            };

            let mut variable = DataVariable::new(name.clone(), dims, data)?;
            for key in ["units", "long_name"] {
                if let Some(value) = string_attr(&var, key) {
                    variable = variable.with_attr(key, value);
                }
            }
            data_vars.push(variable);
        }

        for variable in data_vars {
            dataset.add_variable(variable)?;
        }

        if dataset.is_empty() {
            return Err(DecodeError::Empty(format!("filter_by_keys {}", filter)));
        }

        dataset.set_attr("format", self.format_name());
        Ok(dataset)
    }

    fn format_name(&self) -> &'static str {
        "netcdf"
    }
}

fn string_attr(var: &::netcdf::Variable, name: &str) -> Option<String> {
    if !var.attributes().any(|attr| attr.name() == name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        ::netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
