//! Test data generators for creating synthetic weather-like data.
//!
//! These generators create predictable, verifiable patterns so decoded or
//! assembled output can be checked value by value.

use gfs_decode::{Coordinate, DataVariable, GridDataset, VariableData};

use crate::fixtures::grid::GridSpec;

/// Creates a test grid where each cell is `col * 1000 + row`.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);  // col=1, row=0
/// assert_eq!(grid[10], 1.0);    // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Temperature-like values in Kelvin, 250K to 310K.
pub fn create_temperature_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f32 / width.max(1) as f32;
            let y_factor = row as f32 / height.max(1) as f32;
            data.push(250.0 + (x_factor * 30.0) + (y_factor * 30.0));
        }
    }
    data
}

/// U-component wind in m/s, varying by row from -20 to +20.
pub fn create_u_wind_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        let lat_factor = (row as f32 / height.max(1) as f32 - 0.5) * 2.0;
        for _col in 0..width {
            data.push(lat_factor * 20.0);
        }
    }
    data
}

pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// A decoded single-lead snapshot: each named 2-D field on `grid`.
///
/// Field values are `base + lead` so stacked leads stay distinguishable.
pub fn create_snapshot(grid: &GridSpec, fields: &[(&str, f32)], lead: u32) -> GridDataset {
    let mut dataset = GridDataset::new();
    dataset.add_coord(Coordinate::new("latitude", grid.latitudes()).with_units("degrees_north"));
    dataset.add_coord(Coordinate::new("longitude", grid.longitudes()).with_units("degrees_east"));

    for (name, base) in fields {
        let values = create_constant_grid(grid.width, grid.height, base + lead as f32);
        let data = VariableData::f32_from_vec(&[grid.height, grid.width], values)
            .expect("grid spec shape matches generated values");
        let variable = DataVariable::new(
            *name,
            vec!["latitude".to_string(), "longitude".to_string()],
            data,
        )
        .expect("two dims for a 2-D field");
        dataset
            .add_variable(variable)
            .expect("generated field matches its coordinates");
    }

    dataset
}

/// Same as [`create_snapshot`] but one field is float64.
pub fn create_snapshot_with_f64(grid: &GridSpec, f32_field: &str, f64_field: &str) -> GridDataset {
    let mut dataset = create_snapshot(grid, &[(f32_field, 1.0)], 0);
    let data = VariableData::f64_from_vec(
        &[grid.height, grid.width],
        vec![0.5; grid.size()],
    )
    .expect("grid spec shape matches generated values");
    let variable = DataVariable::new(
        f64_field,
        vec!["latitude".to_string(), "longitude".to_string()],
        data,
    )
    .expect("two dims for a 2-D field");
    dataset
        .add_variable(variable)
        .expect("generated field matches its coordinates");
    dataset
}
