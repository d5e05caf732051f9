//! JSON summaries of decoded datasets.

use std::collections::BTreeMap;

use gfs_decode::{GridDataset, VariableData};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct VariableSummary {
    pub dtype: String,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub nan_count: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct CoordSummary {
    pub len: usize,
    pub first: Option<f64>,
    pub last: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DatasetSummary {
    pub dims: BTreeMap<String, usize>,
    pub coords: BTreeMap<String, CoordSummary>,
    pub variables: BTreeMap<String, VariableSummary>,
    pub attrs: BTreeMap<String, String>,
}

impl DatasetSummary {
    pub fn from_dataset(dataset: &GridDataset) -> Self {
        let coords = dataset
            .coords
            .iter()
            .map(|(name, coord)| {
                (
                    name.clone(),
                    CoordSummary {
                        len: coord.len(),
                        first: coord.values.first().copied(),
                        last: coord.values.last().copied(),
                        units: coord.units.clone(),
                    },
                )
            })
            .collect();

        let variables = dataset
            .variables
            .iter()
            .map(|(name, variable)| {
                let stats = match &variable.data {
                    VariableData::Float32(a) => Stats::collect(a.iter().map(|v| f64::from(*v))),
                    VariableData::Float64(a) => Stats::collect(a.iter().copied()),
                };
                (
                    name.clone(),
                    VariableSummary {
                        dtype: variable.dtype().to_string(),
                        dims: variable.dims.clone(),
                        shape: variable.shape().to_vec(),
                        min: stats.min,
                        max: stats.max,
                        mean: stats.mean(),
                        nan_count: stats.nan_count,
                        attrs: variable.attrs.clone(),
                    },
                )
            })
            .collect();

        Self {
            dims: dataset.dims(),
            coords,
            variables,
            attrs: dataset.attrs.clone(),
        }
    }
}

/// Running min/max/mean over the finite values; NaNs are counted.
#[derive(Debug, Default)]
struct Stats {
    min: Option<f64>,
    max: Option<f64>,
    sum: f64,
    count: usize,
    nan_count: usize,
}

impl Stats {
    fn collect(values: impl Iterator<Item = f64>) -> Self {
        let mut stats = Stats::default();
        for v in values {
            if v.is_nan() {
                stats.nan_count += 1;
                continue;
            }
            stats.min = Some(stats.min.map_or(v, |m| m.min(v)));
            stats.max = Some(stats.max.map_or(v, |m| m.max(v)));
            stats.sum += v;
            stats.count += 1;
        }
        stats
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gfs_decode::{Coordinate, DataVariable};

    #[test]
    fn test_summary() {
        let mut ds = GridDataset::new();
        ds.add_coord(Coordinate::new("latitude", vec![90.0, 89.75]).with_units("degrees_north"));
        let data = VariableData::f32_from_vec(&[2], vec![1.0, f32::NAN]).unwrap();
        ds.add_variable(DataVariable::new("TMP", vec!["latitude".into()], data).unwrap())
            .unwrap();

        let summary = DatasetSummary::from_dataset(&ds);
        let tmp = &summary.variables["TMP"];
        assert_eq!(tmp.dtype, "float32");
        assert_eq!(tmp.min, Some(1.0));
        assert_eq!(tmp.mean, Some(1.0));
        assert_eq!(tmp.nan_count, 1);
        assert_eq!(summary.coords["latitude"].last, Some(89.75));
        assert_eq!(summary.dims["latitude"], 2);
    }

    #[test]
    fn test_all_nan_has_no_stats() {
        let stats = Stats::collect([f64::NAN, f64::NAN].into_iter());
        assert_eq!(stats.min, None);
        assert_eq!(stats.mean(), None);
        assert_eq!(stats.nan_count, 2);
    }
}
