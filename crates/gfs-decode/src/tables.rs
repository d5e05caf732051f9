//! GRIB2 parameter and level lookup tables.
//!
//! Translates GRIB2 numeric codes into the short names and `typeOfLevel`
//! keys used to name decoded variables and to evaluate filter keys.

use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// How a level type reports its value and what it is called.
#[derive(Debug, Clone, PartialEq)]
pub enum LevelDescription {
    /// Level type without a meaningful value (e.g. "surface", "meanSea").
    Static(String),
    /// Level type whose first fixed-surface value is the level.
    Valued {
        name: String,
        /// Divisor applied to the raw value (100 for Pa -> hPa).
        scale: f64,
        units: String,
    },
}

impl LevelDescription {
    pub fn fixed(name: &str) -> Self {
        LevelDescription::Static(name.to_string())
    }

    pub fn valued(name: &str, scale: f64, units: &str) -> Self {
        LevelDescription::Valued {
            name: name.to_string(),
            scale,
            units: units.to_string(),
        }
    }

    /// The `typeOfLevel` name.
    pub fn name(&self) -> &str {
        match self {
            LevelDescription::Static(name) => name,
            LevelDescription::Valued { name, .. } => name,
        }
    }

    /// Level value in display units; static levels report 0.
    pub fn level_value(&self, raw: f64) -> f64 {
        match self {
            LevelDescription::Static(_) => 0.0,
            LevelDescription::Valued { scale, .. } => raw / scale,
        }
    }

    pub fn units(&self) -> Option<&str> {
        match self {
            LevelDescription::Static(_) => None,
            LevelDescription::Valued { units, .. } => Some(units),
        }
    }
}

/// GRIB2 parameter and level lookup tables.
#[derive(Debug, Clone, Default)]
pub struct Grib2Tables {
    /// (discipline, category, number) -> parameter short name (e.g., "TMP", "UGRD")
    parameters: HashMap<ParamKey, String>,
    /// level_type -> description
    levels: HashMap<u8, LevelDescription>,
}

impl Grib2Tables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// NCEP tables covering the fields found in GFS 0.25 degree output.
    pub fn gfs() -> Self {
        let mut tables = Self::new();

        let parameters: &[(u8, u8, u8, &str)] = &[
            (0, 0, 0, "TMP"),
            (0, 0, 4, "TMAX"),
            (0, 0, 5, "TMIN"),
            (0, 0, 6, "DPT"),
            (0, 1, 0, "SPFH"),
            (0, 1, 1, "RH"),
            (0, 1, 3, "PWAT"),
            (0, 1, 7, "PRATE"),
            (0, 1, 8, "APCP"),
            (0, 1, 11, "SNOD"),
            (0, 1, 13, "WEASD"),
            (0, 1, 192, "CRAIN"),
            (0, 2, 1, "WIND"),
            (0, 2, 2, "UGRD"),
            (0, 2, 3, "VGRD"),
            (0, 2, 8, "VVEL"),
            (0, 2, 10, "ABSV"),
            (0, 2, 22, "GUST"),
            (0, 3, 0, "PRES"),
            (0, 3, 1, "PRMSL"),
            (0, 3, 5, "HGT"),
            (0, 6, 1, "TCDC"),
            (0, 7, 6, "CAPE"),
            (0, 7, 7, "CIN"),
            (0, 19, 0, "VIS"),
            (2, 0, 0, "LAND"),
            (10, 2, 0, "ICEC"),
            (10, 2, 1, "ICETK"),
        ];
        for (discipline, category, number, name) in parameters {
            tables.add_parameter(*discipline, *category, *number, name.to_string());
        }

        tables.add_level(1, LevelDescription::fixed("surface"));
        tables.add_level(2, LevelDescription::fixed("cloudBase"));
        tables.add_level(3, LevelDescription::fixed("cloudTop"));
        tables.add_level(4, LevelDescription::fixed("isothermZero"));
        tables.add_level(7, LevelDescription::fixed("tropopause"));
        tables.add_level(6, LevelDescription::fixed("maxWind"));
        tables.add_level(10, LevelDescription::fixed("atmosphereSingleLayer"));
        tables.add_level(100, LevelDescription::valued("isobaricInhPa", 100.0, "hPa"));
        tables.add_level(101, LevelDescription::fixed("meanSea"));
        tables.add_level(102, LevelDescription::valued("heightAboveSea", 1.0, "m"));
        tables.add_level(103, LevelDescription::valued("heightAboveGround", 1.0, "m"));
        tables.add_level(104, LevelDescription::valued("sigma", 1.0, "1"));
        tables.add_level(106, LevelDescription::valued("depthBelowLandLayer", 1.0, "m"));
        tables.add_level(108, LevelDescription::valued("pressureFromGroundLayer", 100.0, "hPa"));
        tables.add_level(200, LevelDescription::fixed("atmosphere"));
        tables.add_level(220, LevelDescription::fixed("planetaryBoundaryLayer"));

        tables
    }

    /// Add a parameter mapping
    pub fn add_parameter(&mut self, discipline: u8, category: u8, number: u8, name: String) {
        self.parameters.insert((discipline, category, number), name);
    }

    pub fn add_level(&mut self, level_type: u8, description: LevelDescription) {
        self.levels.insert(level_type, description);
    }

    /// Look up parameter short name by GRIB2 codes.
    ///
    /// Returns "P{discipline}_{category}_{number}" if not found.
    pub fn get_parameter_name(&self, discipline: u8, category: u8, number: u8) -> String {
        self.parameters
            .get(&(discipline, category, number))
            .cloned()
            .unwrap_or_else(|| format!("P{}_{}_{}", discipline, category, number))
    }

    pub fn level(&self, level_type: u8) -> Option<&LevelDescription> {
        self.levels.get(&level_type)
    }

    /// `typeOfLevel` name for a level type code, or "level{code}" if unknown.
    pub fn get_level_name(&self, level_type: u8) -> String {
        self.levels
            .get(&level_type)
            .map(|l| l.name().to_string())
            .unwrap_or_else(|| format!("level{}", level_type))
    }

    /// Level value in display units (raw value when the type is unknown).
    pub fn get_level_value(&self, level_type: u8, raw: f64) -> f64 {
        match self.levels.get(&level_type) {
            Some(desc) => desc.level_value(raw),
            None => raw,
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.levels.is_empty()
    }
}
