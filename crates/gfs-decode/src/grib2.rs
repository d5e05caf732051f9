//! GRIB2 partition decoding.
//!
//! Every message in a GFS file is one 2-D field on one level. Messages that
//! pass the filter are grouped by (shortName, typeOfLevel); each group becomes
//! one variable, stacked along a level dimension when it spans several levels.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

use tracing::{debug, warn};

use crate::dataset::{Coordinate, DataVariable, GridDataset, VariableData};
use crate::error::{DecodeError, DecodeResult};
use crate::filter::{FilterByKeys, MessageKeys};
use crate::tables::Grib2Tables;
use crate::PartitionDecoder;

/// Level type reported when a message has no first fixed surface.
const MISSING_LEVEL_TYPE: u8 = 255;

/// `stepType` of a message, following the cfgrib names.
///
/// Only the statistically processed templates (4.8, 4.11, 4.12) carry a
/// process; the type of the first time range (code table 4.10) decides.
pub fn step_type(prod_def: &grib::ProdDefinition) -> &'static str {
    // Payload offsets of the statistical process octet (47, 50 and 49)
    let offset = match prod_def.prod_tmpl_num() {
        8 => 41,
        11 => 44,
        12 => 43,
        _ => return "instant",
    };
    match prod_def.iter().nth(offset).copied() {
        Some(0) => "avg",
        Some(1) => "accum",
        Some(2) => "max",
        Some(3) => "min",
        Some(4) => "diff",
        Some(5) => "rms",
        Some(6) => "sd",
        _ => "unknown",
    }
}

/// One decoded message, before grouping.
#[derive(Debug, Clone)]
pub struct Grib2Field {
    pub keys: MessageKeys,
    pub level_units: Option<String>,
    /// Row latitudes, north to south as stored.
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    /// Row-major `[latitude, longitude]` values.
    pub values: Vec<f32>,
}

impl Grib2Field {
    fn grid_matches(&self, other: &Grib2Field) -> bool {
        self.latitudes == other.latitudes && self.longitudes == other.longitudes
    }
}

/// Decoder for GRIB2 partitions served directly by the archive.
#[derive(Debug, Clone)]
pub struct Grib2Decoder {
    tables: Grib2Tables,
}

impl Grib2Decoder {
    pub fn new(tables: Grib2Tables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &Grib2Tables {
        &self.tables
    }

    /// Decode every message accepted by `filter` into a flat list of fields.
    ///
    /// Messages that cannot be unpacked are logged and skipped.
    pub fn read_fields(&self, bytes: &[u8], filter: &FilterByKeys) -> DecodeResult<Vec<Grib2Field>> {
        let grib2 = grib::from_reader(Cursor::new(bytes))
            .map_err(|e| DecodeError::Grib2(e.to_string()))?;

        let mut seen = 0usize;
        let mut fields = Vec::new();

        for ((index, sub_index), submsg) in grib2.iter() {
            seen += 1;
            let discipline = submsg.indicator().discipline;
            let prod_def = submsg.prod_def();

            let (category, number) =
                match (prod_def.parameter_category(), prod_def.parameter_number()) {
                    (Some(c), Some(n)) => (c, n),
                    _ => {
                        debug!(index, sub_index, "Message has no parameter codes, skipping");
                        continue;
                    }
                };

            let (level_type, raw_level) = prod_def
                .fixed_surfaces()
                .map(|(first, _)| (first.surface_type, first.value()))
                .unwrap_or((MISSING_LEVEL_TYPE, 0.0));

            let keys = MessageKeys {
                type_of_level: self.tables.get_level_name(level_type),
                short_name: self.tables.get_parameter_name(discipline, category, number),
                level: self.tables.get_level_value(level_type, raw_level),
                discipline,
                parameter_category: category,
                parameter_number: number,
                step_type: step_type(prod_def).to_string(),
            };

            if !filter.matches(&keys) {
                continue;
            }

            let (ni, nj) = match submsg.grid_shape() {
                Ok(shape) => shape,
                Err(e) => {
                    warn!(param = %keys.short_name, error = %e, "Unsupported grid, skipping message");
                    continue;
                }
            };

            let points: Vec<(f32, f32)> = match submsg.latlons() {
                Ok(iter) => iter.collect(),
                Err(e) => {
                    warn!(param = %keys.short_name, error = %e, "Failed to compute grid points, skipping message");
                    continue;
                }
            };

            let values: Vec<f32> = match grib::Grib2SubmessageDecoder::from(submsg)
                .and_then(|decoder| decoder.dispatch().map(|values| values.collect()))
            {
                Ok(values) => values,
                Err(e) => {
                    warn!(param = %keys.short_name, error = %e, "Failed to unpack GRIB2 data, skipping");
                    continue;
                }
            };

            if ni == 0 || values.len() != ni * nj || points.len() != ni * nj {
                warn!(
                    param = %keys.short_name,
                    expected = ni * nj,
                    values = values.len(),
                    points = points.len(),
                    "Grid data size mismatch, skipping"
                );
                continue;
            }

            let latitudes = points.iter().step_by(ni).map(|(lat, _)| f64::from(*lat)).collect();
            let longitudes = points[..ni].iter().map(|(_, lon)| f64::from(*lon)).collect();

            fields.push(Grib2Field {
                level_units: self.tables.level(level_type).and_then(|l| l.units()).map(String::from),
                keys,
                latitudes,
                longitudes,
                values,
            });
        }

        if seen == 0 {
            return Err(DecodeError::Grib2("no GRIB2 messages found".into()));
        }

        debug!(messages = seen, kept = fields.len(), "Read GRIB2 messages");
        Ok(fields)
    }
}

impl Default for Grib2Decoder {
    fn default() -> Self {
        Self::new(Grib2Tables::gfs())
    }
}

impl PartitionDecoder for Grib2Decoder {
    fn decode(&self, bytes: &[u8], filter: &FilterByKeys) -> DecodeResult<GridDataset> {
        let fields = self.read_fields(bytes, filter)?;
        let mut dataset = assemble_fields(fields).map_err(|e| match e {
            DecodeError::Empty(_) if !filter.is_empty() => {
                DecodeError::Empty(format!("filter_by_keys {}", filter))
            }
            other => other,
        })?;
        dataset.set_attr("format", self.format_name());
        Ok(dataset)
    }

    fn format_name(&self) -> &'static str {
        "grib2"
    }
}

/// Group decoded fields into variables on a shared latitude/longitude grid.
///
/// A shortName seen on more than one typeOfLevel is named
/// `<shortName>_<typeOfLevel>`. Groups with several levels gain a leading
/// level dimension named after the typeOfLevel; when two such groups disagree
/// on level values the second coordinate gets a numeric suffix.
pub fn assemble_fields(fields: Vec<Grib2Field>) -> DecodeResult<GridDataset> {
    let reference = match fields.first() {
        Some(field) => field.clone(),
        None => return Err(DecodeError::Empty("no messages matched".into())),
    };

    let mut groups: BTreeMap<(String, String), Vec<Grib2Field>> = BTreeMap::new();
    for field in fields {
        if !field.grid_matches(&reference) {
            warn!(
                param = %field.keys.short_name,
                level = %field.keys.type_of_level,
                "Field is on a different grid, skipping"
            );
            continue;
        }
        let group = groups
            .entry((field.keys.short_name.clone(), field.keys.type_of_level.clone()))
            .or_default();
        if let Some(kept) = group.iter().find(|f| f.keys.level == field.keys.level) {
            warn!(
                param = %field.keys.short_name,
                level = field.keys.level,
                kept = %kept.keys.step_type,
                dropped = %field.keys.step_type,
                "Duplicate level, keeping first; filter on stepType to choose"
            );
            continue;
        }
        group.push(field);
    }

    let mut level_types_per_name: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (name, level_type) in groups.keys() {
        level_types_per_name
            .entry(name.as_str())
            .or_default()
            .insert(level_type.as_str());
    }
    let ambiguous: BTreeSet<String> = level_types_per_name
        .iter()
        .filter(|(_, types)| types.len() > 1)
        .map(|(name, _)| name.to_string())
        .collect();

    let nlat = reference.latitudes.len();
    let nlon = reference.longitudes.len();

    let mut dataset = GridDataset::new();
    dataset.add_coord(
        Coordinate::new("latitude", reference.latitudes.clone()).with_units("degrees_north"),
    );
    dataset.add_coord(
        Coordinate::new("longitude", reference.longitudes.clone()).with_units("degrees_east"),
    );

    for ((short_name, type_of_level), mut group) in groups {
        let var_name = if ambiguous.contains(&short_name) {
            format!("{}_{}", short_name, type_of_level)
        } else {
            short_name.clone()
        };

        group.sort_by(|a, b| a.keys.level.total_cmp(&b.keys.level));
        let first = &group[0];

        let variable = if group.len() == 1 {
            let data = VariableData::f32_from_vec(&[nlat, nlon], first.values.clone())?;
            DataVariable::new(
                var_name.clone(),
                vec!["latitude".into(), "longitude".into()],
                data,
            )?
            .with_attr("level", first.keys.level.to_string())
        } else {
            let levels: Vec<f64> = group.iter().map(|f| f.keys.level).collect();
            let mut coord = Coordinate::new(type_of_level.clone(), levels);
            if let Some(units) = &first.level_units {
                coord = coord.with_units(units.clone());
            }
            let dim = intern_level_coord(&mut dataset, coord);

            let mut values = Vec::with_capacity(group.len() * nlat * nlon);
            for field in &group {
                values.extend_from_slice(&field.values);
            }
            let data = VariableData::f32_from_vec(&[group.len(), nlat, nlon], values)?;
            DataVariable::new(
                var_name.clone(),
                vec![dim, "latitude".into(), "longitude".into()],
                data,
            )?
        };

        let variable = variable
            .with_attr("shortName", short_name.clone())
            .with_attr("typeOfLevel", type_of_level.clone())
            .with_attr("discipline", first.keys.discipline.to_string())
            .with_attr("parameterCategory", first.keys.parameter_category.to_string())
            .with_attr("parameterNumber", first.keys.parameter_number.to_string())
            .with_attr("stepType", first.keys.step_type.clone());

        dataset.add_variable(variable)?;
    }

    if dataset.is_empty() {
        return Err(DecodeError::Empty("no messages matched".into()));
    }

    Ok(dataset)
}

/// Reuse an identical level coordinate or add one under a free name.
fn intern_level_coord(dataset: &mut GridDataset, coord: Coordinate) -> String {
    let base = coord.name.clone();
    let mut candidate = base.clone();
    let mut suffix = 1;
    loop {
        match dataset.coord(&candidate) {
            Some(existing) if existing.values == coord.values => return candidate,
            Some(_) => {
                candidate = format!("{}{}", base, suffix);
                suffix += 1;
            }
            None => {
                dataset.add_coord(Coordinate {
                    name: candidate.clone(),
                    ..coord
                });
                return candidate;
            }
        }
    }
}
