//! Labeled multi-dimensional grid datasets.
//!
//! A [`GridDataset`] is a set of named variables, each an n-dimensional array
//! whose axes are named dimensions, plus 1-D coordinate values for those
//! dimensions. Decoded partitions and the assembled multi-lead dataset share
//! this representation.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArrayD, ArrayView, Axis, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, DecodeResult};

/// Element type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float32,
    Float64,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Array payload of a variable.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableData {
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

impl VariableData {
    pub fn dtype(&self) -> DType {
        match self {
            VariableData::Float32(_) => DType::Float32,
            VariableData::Float64(_) => DType::Float64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            VariableData::Float32(a) => a.shape(),
            VariableData::Float64(a) => a.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build a float32 array from row-major values.
    pub fn f32_from_vec(shape: &[usize], values: Vec<f32>) -> DecodeResult<Self> {
        Ok(VariableData::Float32(ArrayD::from_shape_vec(
            IxDyn(shape),
            values,
        )?))
    }

    /// Build a float64 array from row-major values.
    pub fn f64_from_vec(shape: &[usize], values: Vec<f64>) -> DecodeResult<Self> {
        Ok(VariableData::Float64(ArrayD::from_shape_vec(
            IxDyn(shape),
            values,
        )?))
    }

    fn with_leading_axis(self) -> Self {
        match self {
            VariableData::Float32(a) => VariableData::Float32(a.insert_axis(Axis(0))),
            VariableData::Float64(a) => VariableData::Float64(a.insert_axis(Axis(0))),
        }
    }

    /// Concatenate same-typed arrays along `axis`.
    fn concat(parts: &[&VariableData], axis: usize) -> DecodeResult<Self> {
        let first = parts
            .first()
            .ok_or_else(|| DecodeError::shape("nothing to concatenate"))?;

        match first {
            VariableData::Float32(_) => {
                let views = parts
                    .iter()
                    .map(|p| match p {
                        VariableData::Float32(a) => Ok(a.view()),
                        other => Err(DecodeError::shape(format!(
                            "cannot concatenate float32 with {}",
                            other.dtype()
                        ))),
                    })
                    .collect::<DecodeResult<Vec<ArrayView<f32, IxDyn>>>>()?;
                Ok(VariableData::Float32(ndarray::concatenate(
                    Axis(axis),
                    &views,
                )?))
            }
            VariableData::Float64(_) => {
                let views = parts
                    .iter()
                    .map(|p| match p {
                        VariableData::Float64(a) => Ok(a.view()),
                        other => Err(DecodeError::shape(format!(
                            "cannot concatenate float64 with {}",
                            other.dtype()
                        ))),
                    })
                    .collect::<DecodeResult<Vec<ArrayView<f64, IxDyn>>>>()?;
                Ok(VariableData::Float64(ndarray::concatenate(
                    Axis(axis),
                    &views,
                )?))
            }
        }
    }
}

/// 1-D coordinate values for a dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub name: String,
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl Coordinate {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
            units: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A named array over named dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct DataVariable {
    pub name: String,
    pub dims: Vec<String>,
    pub data: VariableData,
    pub attrs: BTreeMap<String, String>,
}

impl DataVariable {
    /// Create a variable; `dims` must name every axis of `data`.
    pub fn new(
        name: impl Into<String>,
        dims: Vec<String>,
        data: VariableData,
    ) -> DecodeResult<Self> {
        let name = name.into();
        if dims.len() != data.ndim() {
            return Err(DecodeError::shape(format!(
                "variable {} has {} dims for a {}-d array",
                name,
                dims.len(),
                data.ndim()
            )));
        }
        Ok(Self {
            name,
            dims,
            data,
            attrs: BTreeMap::new(),
        })
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }
}

/// Variables and coordinates decoded from one or more partitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridDataset {
    pub coords: BTreeMap<String, Coordinate>,
    pub variables: BTreeMap<String, DataVariable>,
    pub attrs: BTreeMap<String, String>,
}

impl GridDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_coord(&mut self, coord: Coordinate) {
        self.coords.insert(coord.name.clone(), coord);
    }

    /// Add a variable, checking its axis lengths against known coordinates.
    pub fn add_variable(&mut self, variable: DataVariable) -> DecodeResult<()> {
        for (dim, len) in variable.dims.iter().zip(variable.shape()) {
            if let Some(coord) = self.coords.get(dim) {
                if coord.len() != *len {
                    return Err(DecodeError::shape(format!(
                        "variable {} has {} = {} but coordinate has {} values",
                        variable.name,
                        dim,
                        len,
                        coord.len()
                    )));
                }
            }
        }
        self.variables.insert(variable.name.clone(), variable);
        Ok(())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn variable(&self, name: &str) -> Option<&DataVariable> {
        self.variables.get(name)
    }

    pub fn coord(&self, name: &str) -> Option<&Coordinate> {
        self.coords.get(name)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn shape_of(&self, name: &str) -> Option<&[usize]> {
        self.variables.get(name).map(DataVariable::shape)
    }

    /// Dimension name -> length, across all variables.
    pub fn dims(&self) -> BTreeMap<String, usize> {
        let mut dims = BTreeMap::new();
        for variable in self.variables.values() {
            for (dim, len) in variable.dims.iter().zip(variable.shape()) {
                dims.insert(dim.clone(), *len);
            }
        }
        dims
    }

    /// Prepend a singleton dimension to every variable.
    ///
    /// Used to tag a single-lead snapshot with its lead-time coordinate
    /// before partitions are stacked.
    pub fn insert_leading_dim(mut self, coord: Coordinate) -> DecodeResult<Self> {
        if coord.len() != 1 {
            return Err(DecodeError::shape(format!(
                "leading coordinate {} must hold exactly one value, got {}",
                coord.name,
                coord.len()
            )));
        }

        let dim = coord.name.clone();
        for variable in self.variables.values_mut() {
            if variable.dims.contains(&dim) {
                return Err(DecodeError::shape(format!(
                    "variable {} already has dimension {}",
                    variable.name, dim
                )));
            }
            let data = std::mem::replace(
                &mut variable.data,
                VariableData::Float32(ArrayD::zeros(IxDyn(&[0]))),
            );
            variable.data = data.with_leading_axis();
            variable.dims.insert(0, dim.clone());
        }
        self.add_coord(coord);
        Ok(self)
    }

    /// Concatenate datasets along an existing dimension.
    ///
    /// Every part must have the same variables, each carrying `dim`; all other
    /// coordinates must be identical. The `dim` coordinate values are joined
    /// in part order. Attributes are taken from the first part.
    pub fn concat(parts: &[GridDataset], dim: &str) -> DecodeResult<GridDataset> {
        let first = parts
            .first()
            .ok_or_else(|| DecodeError::shape("no datasets to concatenate"))?;

        let mut out = GridDataset {
            coords: BTreeMap::new(),
            variables: BTreeMap::new(),
            attrs: first.attrs.clone(),
        };

        for (name, coord) in &first.coords {
            if name == dim {
                let mut values = Vec::new();
                for (i, part) in parts.iter().enumerate() {
                    let c = part.coord(dim).ok_or_else(|| {
                        DecodeError::shape(format!("part {} lacks coordinate {}", i, dim))
                    })?;
                    values.extend_from_slice(&c.values);
                }
                out.add_coord(Coordinate {
                    name: name.clone(),
                    values,
                    units: coord.units.clone(),
                });
            } else {
                for (i, part) in parts.iter().enumerate().skip(1) {
                    if part.coord(name) != Some(coord) {
                        return Err(DecodeError::shape(format!(
                            "coordinate {} differs in part {}",
                            name, i
                        )));
                    }
                }
                out.add_coord(coord.clone());
            }
        }

        for (name, variable) in &first.variables {
            let axis = variable.axis_of(dim).ok_or_else(|| {
                DecodeError::shape(format!("variable {} has no dimension {}", name, dim))
            })?;

            let mut pieces = Vec::with_capacity(parts.len());
            for (i, part) in parts.iter().enumerate() {
                let other = part.variable(name).ok_or_else(|| {
                    DecodeError::shape(format!("variable {} missing from part {}", name, i))
                })?;
                if other.dims != variable.dims {
                    return Err(DecodeError::shape(format!(
                        "variable {} has dims {:?} in part {} but {:?} in part 0",
                        name, other.dims, i, variable.dims
                    )));
                }
                pieces.push(&other.data);
            }

            let data = VariableData::concat(&pieces, axis)?;
            out.variables.insert(
                name.clone(),
                DataVariable {
                    name: name.clone(),
                    dims: variable.dims.clone(),
                    data,
                    attrs: variable.attrs.clone(),
                },
            );
        }

        for (i, part) in parts.iter().enumerate().skip(1) {
            if let Some(extra) = part.variables.keys().find(|k| !first.variables.contains_key(*k)) {
                return Err(DecodeError::shape(format!(
                    "variable {} appears in part {} but not in part 0",
                    extra, i
                )));
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(value: f32) -> GridDataset {
        let mut ds = GridDataset::new();
        ds.add_coord(Coordinate::new("latitude", vec![10.0, 0.0]).with_units("degrees_north"));
        ds.add_coord(Coordinate::new("longitude", vec![0.0, 1.0, 2.0]).with_units("degrees_east"));
        let data = VariableData::f32_from_vec(&[2, 3], vec![value; 6]).unwrap();
        ds.add_variable(
            DataVariable::new("TMP", vec!["latitude".into(), "longitude".into()], data).unwrap(),
        )
        .unwrap();
        ds
    }

    #[test]
    fn test_dims_must_match_rank() {
        let data = VariableData::f32_from_vec(&[2, 3], vec![0.0; 6]).unwrap();
        assert!(DataVariable::new("x", vec!["a".into()], data).is_err());
    }

    #[test]
    fn test_add_variable_checks_coordinate_length() {
        let mut ds = snapshot(1.0);
        let data = VariableData::f32_from_vec(&[3, 3], vec![0.0; 9]).unwrap();
        let var = DataVariable::new("bad", vec!["latitude".into(), "longitude".into()], data)
            .unwrap();
        assert!(ds.add_variable(var).is_err());
    }

    #[test]
    fn test_insert_leading_dim() {
        let ds = snapshot(1.0)
            .insert_leading_dim(Coordinate::new("step", vec![3.0]))
            .unwrap();
        let tmp = ds.variable("TMP").unwrap();
        assert_eq!(tmp.dims, vec!["step", "latitude", "longitude"]);
        assert_eq!(tmp.shape(), &[1, 2, 3]);
        assert_eq!(ds.coord("step").unwrap().values, vec![3.0]);

        let err = snapshot(1.0).insert_leading_dim(Coordinate::new("step", vec![0.0, 3.0]));
        assert!(err.is_err());
    }

    #[test]
    fn test_concat_along_step() {
        let parts: Vec<GridDataset> = [0.0, 3.0, 6.0]
            .iter()
            .enumerate()
            .map(|(i, lead)| {
                snapshot(i as f32)
                    .insert_leading_dim(Coordinate::new("step", vec![*lead]))
                    .unwrap()
            })
            .collect();

        let merged = GridDataset::concat(&parts, "step").unwrap();
        let tmp = merged.variable("TMP").unwrap();
        assert_eq!(tmp.shape(), &[3, 2, 3]);
        assert_eq!(merged.coord("step").unwrap().values, vec![0.0, 3.0, 6.0]);
        match &tmp.data {
            VariableData::Float32(a) => {
                assert_eq!(a[[2, 1, 2]], 2.0);
                assert_eq!(a[[0, 0, 0]], 0.0);
            }
            other => panic!("unexpected dtype {}", other.dtype()),
        }
        assert_eq!(merged.dims().get("step"), Some(&3));
        assert_eq!(merged.shape_of("TMP"), Some(&[3usize, 2, 3][..]));
        assert_eq!(merged.shape_of("UGRD"), None);
    }

    #[test]
    fn test_concat_rejects_mismatched_coords() {
        let a = snapshot(0.0)
            .insert_leading_dim(Coordinate::new("step", vec![0.0]))
            .unwrap();
        let mut b = snapshot(1.0)
            .insert_leading_dim(Coordinate::new("step", vec![3.0]))
            .unwrap();
        b.add_coord(Coordinate::new("longitude", vec![5.0, 6.0, 7.0]).with_units("degrees_east"));

        assert!(GridDataset::concat(&[a, b], "step").is_err());
    }

    #[test]
    fn test_concat_rejects_extra_variable() {
        let a = snapshot(0.0)
            .insert_leading_dim(Coordinate::new("step", vec![0.0]))
            .unwrap();
        let mut b = snapshot(1.0);
        let data = VariableData::f64_from_vec(&[2, 3], vec![0.0; 6]).unwrap();
        b.add_variable(
            DataVariable::new("APCP", vec!["latitude".into(), "longitude".into()], data).unwrap(),
        )
        .unwrap();
        let b = b
            .insert_leading_dim(Coordinate::new("step", vec![3.0]))
            .unwrap();

        let err = GridDataset::concat(&[a, b], "step").unwrap_err();
        assert!(err.to_string().contains("APCP"));
    }
}
