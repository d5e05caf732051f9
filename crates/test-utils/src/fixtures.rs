//! Common test fixtures.
//!
//! Fixed instants keep cycle resolution deterministic; grid specs describe
//! small synthetic stand-ins for the 0.25 degree GFS grid.

/// Fixed clocks and cycle strings.
pub mod time {
    use chrono::{DateTime, TimeZone, Utc};

    /// 2024-01-15T14:30:00Z; latest published cycle is 2024-01-15 06Z.
    pub fn mid_afternoon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap()
    }

    /// 2024-01-15T03:00:00Z; latest published cycle is 2024-01-14 18Z.
    pub fn just_after_midnight() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 3, 0, 0).unwrap()
    }

    /// 2024-01-15T12:00:00Z, exactly on a cycle boundary.
    pub fn on_cycle() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    /// Explicit cycle strings that must be accepted as-is.
    pub const VALID_CYCLES: [&str; 4] = [
        "2024-01-15T00:00:00",
        "2024-01-15T06:00:00",
        "2024-01-15T12:00:00Z",
        "2024-01-15T18:00:00+00:00",
    ];

    /// Inputs that are not a cycle at all.
    pub const GARBAGE_CYCLES: [&str; 4] = ["not-a-date", "2024-13-45", "yesterday", ""];

    /// GFS cycle hours.
    pub const GFS_CYCLES: [&str; 4] = ["00", "06", "12", "18"];
}

/// Common grid specifications for testing.
pub mod grid {
    /// GFS global grid (0.25 degree resolution)
    pub const GFS_GLOBAL: GridSpec = GridSpec {
        width: 1440,
        height: 721,
        min_lon: 0.0,
        max_lon: 359.75,
        min_lat: -90.0,
        max_lat: 90.0,
    };

    /// Tiny 4x3 grid with 0.25 degree spacing
    pub const TINY: GridSpec = GridSpec {
        width: 4,
        height: 3,
        min_lon: 0.0,
        max_lon: 0.75,
        min_lat: 89.5,
        max_lat: 90.0,
    };

    /// Simple 10x10 test grid
    pub const SIMPLE_10X10: GridSpec = GridSpec {
        width: 10,
        height: 10,
        min_lon: 0.0,
        max_lon: 9.0,
        min_lat: 36.0,
        max_lat: 45.0,
    };

    /// Grid specification for testing.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub width: usize,
        pub height: usize,
        pub min_lon: f64,
        pub max_lon: f64,
        pub min_lat: f64,
        pub max_lat: f64,
    }

    impl GridSpec {
        pub fn size(&self) -> usize {
            self.width * self.height
        }

        /// Latitudes north to south, as GFS stores them.
        pub fn latitudes(&self) -> Vec<f64> {
            spaced(self.max_lat, self.min_lat, self.height)
        }

        pub fn longitudes(&self) -> Vec<f64> {
            spaced(self.min_lon, self.max_lon, self.width)
        }
    }

    fn spaced(first: f64, last: f64, n: usize) -> Vec<f64> {
        if n <= 1 {
            return vec![first; n];
        }
        let step = (last - first) / (n - 1) as f64;
        (0..n).map(|i| first + step * i as f64).collect()
    }
}

/// Archive URLs for the default RDA layout.
pub mod urls {
    pub const RDA_BASE: &str = "https://thredds.rda.ucar.edu/thredds";

    /// First partition of the 2024-01-15 06Z cycle.
    pub const RDA_20240115_06_F000: &str = "https://thredds.rda.ucar.edu/thredds/fileServer/files/g/d084001/2024/20240115/gfs.0p25.2024011506.f000.grib2";
}
