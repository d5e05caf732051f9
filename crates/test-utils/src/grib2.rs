//! Synthetic GRIB2 messages.
//!
//! Builds minimal but valid GRIB2 edition 2 messages (lat/lon grid template
//! 3.0, product template 4.0 or 4.8, simple packing 5.0) so decoders can be tested
//! without downloading real partitions. Several messages concatenated form a
//! multi-field file, like a real GFS partition.

use crate::fixtures::grid::GridSpec;

/// Build a single GRIB2 message.
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    ni: u32,
    nj: u32,
    /// Microdegrees
    la1: i32,
    lo1: i32,
    la2: i32,
    lo2: i32,
    di: u32,
    dj: u32,
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_value: u32,
    forecast_hour: u32,
    /// Statistical process code (table 4.10) and period in hours; switches
    /// the product template to 4.8.
    statistics: Option<(u8, u32)>,
    data_values: Vec<f32>,
}

impl Grib2Builder {
    /// 2 m temperature on [`GridSpec`] `grid`, 2024-01-15 06Z analysis.
    pub fn new_gfs(grid: &GridSpec) -> Self {
        let micro = |deg: f64| (deg * 1_000_000.0).round() as i32;
        let step = |a: f64, b: f64, n: usize| {
            if n > 1 {
                ((b - a).abs() / (n - 1) as f64 * 1_000_000.0).round() as u32
            } else {
                0
            }
        };
        Self {
            discipline: 0,
            center: 7, // NCEP
            year: 2024,
            month: 1,
            day: 15,
            hour: 6,
            ni: grid.width as u32,
            nj: grid.height as u32,
            la1: micro(grid.max_lat),
            lo1: micro(grid.min_lon),
            la2: micro(grid.min_lat),
            lo2: micro(grid.max_lon),
            di: step(grid.min_lon, grid.max_lon, grid.width),
            dj: step(grid.min_lat, grid.max_lat, grid.height),
            param_category: 0,
            param_number: 0, // TMP
            level_type: 103,
            level_value: 2,
            forecast_hour: 0,
            statistics: None,
            data_values: vec![288.15; grid.size()],
        }
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    /// Level type code and raw value (Pa for isobaric levels).
    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_hour = hour;
        self
    }

    /// Make the field statistically processed over the `hours` before its
    /// forecast hour, e.g. process 1 for an accumulation.
    pub fn with_statistical_process(mut self, process: u8, hours: u32) -> Self {
        self.statistics = Some((process, hours));
        self
    }

    pub fn with_constant_value(mut self, value: f32) -> Self {
        self.data_values = vec![value; (self.ni * self.nj) as usize];
        self
    }

    pub fn with_gradient(mut self, min_val: f32, max_val: f32) -> Self {
        let n = (self.ni * self.nj) as usize;
        self.data_values = (0..n)
            .map(|i| min_val + (max_val - min_val) * (i as f32 / n as f32))
            .collect();
        self
    }

    pub fn values(&self) -> &[f32] {
        &self.data_values
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let section1 = self.build_section1();
        let section3 = self.build_section3();
        let section4 = self.build_section4();
        let section5 = self.build_section5();
        let section6 = self.build_section6();
        let section7 = self.build_section7();

        let message_length = 16
            + section1.len()
            + section3.len()
            + section4.len()
            + section5.len()
            + section6.len()
            + section7.len()
            + 4;

        let mut message = Vec::with_capacity(message_length);

        // Section 0: Indicator
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]);
        message.push(self.discipline);
        message.push(2);
        message.extend_from_slice(&(message_length as u64).to_be_bytes());

        message.extend_from_slice(&section1);
        message.extend_from_slice(&section3);
        message.extend_from_slice(&section4);
        message.extend_from_slice(&section5);
        message.extend_from_slice(&section6);
        message.extend_from_slice(&section7);

        // Section 8: End
        message.extend_from_slice(b"7777");

        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1);

        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(1); // Start of forecast

        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0);
        section.push(0);

        section.push(0); // Operational
        section.push(1); // Forecast

        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&72u32.to_be_bytes());
        section.push(3);

        section.push(0);
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0);
        section.push(0);
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 3.0

        section.push(6); // Spherical earth, radius 6371229 m
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&0xFFFFFFFFu32.to_be_bytes());

        section.extend_from_slice(&sign_magnitude_i32(self.la1));
        section.extend_from_slice(&sign_magnitude_i32(self.lo1));
        section.push(48); // Increments given
        section.extend_from_slice(&sign_magnitude_i32(self.la2));
        section.extend_from_slice(&sign_magnitude_i32(self.lo2));
        section.extend_from_slice(&self.di.to_be_bytes());
        section.extend_from_slice(&self.dj.to_be_bytes());
        section.push(0); // +i, -j, i consecutive (GFS order)

        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let (length, template) = match self.statistics {
            Some(_) => (58u32, 8u16),
            None => (34u32, 0u16),
        };

        let mut section = Vec::new();
        section.extend_from_slice(&length.to_be_bytes());
        section.push(4);

        section.extend_from_slice(&0u16.to_be_bytes());
        section.extend_from_slice(&template.to_be_bytes());

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(2); // Forecast
        section.push(0);
        section.push(96); // GFS
        section.extend_from_slice(&0u16.to_be_bytes());
        section.push(0);
        section.push(1); // Hours
        section.extend_from_slice(&self.forecast_hour.to_be_bytes());

        section.push(self.level_type);
        section.push(0);
        section.extend_from_slice(&self.level_value.to_be_bytes());

        section.push(255); // No second surface
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        if let Some((process, hours)) = self.statistics {
            // End of the overall interval; only the layout matters to decoders
            section.extend_from_slice(&self.year.to_be_bytes());
            section.push(self.month);
            section.push(self.day);
            section.push(self.hour);
            section.push(0);
            section.push(0);
            section.push(1); // One time range
            section.extend_from_slice(&0u32.to_be_bytes()); // No missing values
            section.push(process);
            section.push(2); // Successive forecast times
            section.push(1); // Hours
            section.extend_from_slice(&hours.to_be_bytes());
            section.push(255); // Continuous
            section.extend_from_slice(&0u32.to_be_bytes());
        }

        section
    }

    fn packing(&self) -> (f32, i16, u8) {
        let (min_val, max_val) = self.data_values.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY),
            |(min, max), &v| (min.min(v), max.max(v)),
        );
        let range = max_val - min_val;
        if range == 0.0 {
            (min_val, 0, 0)
        } else {
            // value = reference + packed * 2^E with packed < 2^16
            let e = (range / 65535.0).log2().ceil() as i16;
            (min_val, e, 16)
        }
    }

    fn build_section5(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing();

        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(5);

        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 5.0

        section.extend_from_slice(&reference_value.to_be_bytes());
        section.extend_from_slice(&sign_magnitude_i16(binary_scale_factor));
        section.extend_from_slice(&sign_magnitude_i16(0));
        section.push(bits_per_value);
        section.push(0); // Floating point

        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&6u32.to_be_bytes());
        section.push(6);
        section.push(255); // No bitmap
        section
    }

    fn build_section7(&self) -> Vec<u8> {
        let (reference_value, binary_scale_factor, bits_per_value) = self.packing();

        let mut packed = Vec::new();
        if bits_per_value > 0 {
            let scale = 2.0_f32.powi(binary_scale_factor as i32);
            for &val in &self.data_values {
                let packed_value = ((val - reference_value) / scale).round() as u16;
                packed.extend_from_slice(&packed_value.to_be_bytes());
            }
        }

        let mut section = Vec::new();
        section.extend_from_slice(&(5 + packed.len() as u32).to_be_bytes());
        section.push(7);
        section.extend_from_slice(&packed);
        section
    }
}

/// Concatenate messages into one multi-field file.
pub fn build_grib2_file(messages: &[Grib2Builder]) -> Vec<u8> {
    messages.iter().flat_map(|m| m.build()).collect()
}

// GRIB2 stores signed integers as sign bit plus magnitude.
fn sign_magnitude_i32(v: i32) -> [u8; 4] {
    let magnitude = v.unsigned_abs() & 0x7FFF_FFFF;
    let bits = if v < 0 { magnitude | 0x8000_0000 } else { magnitude };
    bits.to_be_bytes()
}

fn sign_magnitude_i16(v: i16) -> [u8; 2] {
    let magnitude = v.unsigned_abs() & 0x7FFF;
    let bits = if v < 0 { magnitude | 0x8000 } else { magnitude };
    bits.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::grid::TINY;

    #[test]
    fn test_build_message_framing() {
        let bytes = Grib2Builder::new_gfs(&TINY).with_gradient(270.0, 300.0).build();

        assert_eq!(&bytes[0..4], b"GRIB");
        assert_eq!(bytes[7], 2);
        let total = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
        assert_eq!(total as usize, bytes.len());
        assert_eq!(&bytes[bytes.len() - 4..], b"7777");
    }

    #[test]
    fn test_constant_field_has_no_packed_data() {
        let constant = Grib2Builder::new_gfs(&TINY).with_constant_value(1.0).build();
        let gradient = Grib2Builder::new_gfs(&TINY).with_gradient(0.0, 1.0).build();
        assert_eq!(gradient.len() - constant.len(), TINY.size() * 2);
    }

    #[test]
    fn test_statistical_template_length() {
        let instant = Grib2Builder::new_gfs(&TINY).build();
        let accum = Grib2Builder::new_gfs(&TINY)
            .with_statistical_process(1, 6)
            .build();
        assert_eq!(accum.len() - instant.len(), 24);
        let total = u64::from_be_bytes(accum[8..16].try_into().unwrap());
        assert_eq!(total as usize, accum.len());
    }

    #[test]
    fn test_sign_magnitude() {
        assert_eq!(sign_magnitude_i16(-3), [0x80, 0x03]);
        assert_eq!(sign_magnitude_i16(3), [0x00, 0x03]);
        assert_eq!(sign_magnitude_i32(-1), [0x80, 0, 0, 1]);
    }

    #[test]
    fn test_file_concatenates_messages() {
        let a = Grib2Builder::new_gfs(&TINY);
        let b = Grib2Builder::new_gfs(&TINY).with_parameter(2, 2);
        let file = build_grib2_file(&[a.clone(), b]);
        assert_eq!(file.len(), a.build().len() * 2);
    }
}
