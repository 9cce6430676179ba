use serde::{Deserialize, Serialize};

use super::{fmt_f64, CsvRecord};

/// One inertial measurement unit reading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImuSample {
    pub timestamp_ns: i64,
    /// m/s²
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    /// rad/s
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    /// µT
    pub mag_x: f64,
    pub mag_y: f64,
    pub mag_z: f64,
    /// °C
    pub temperature: f64,
}

impl CsvRecord for ImuSample {
    fn columns() -> &'static [&'static str] {
        &[
            "timestamp_ns",
            "accel_x",
            "accel_y",
            "accel_z",
            "gyro_x",
            "gyro_y",
            "gyro_z",
            "mag_x",
            "mag_y",
            "mag_z",
            "temperature",
        ]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp_ns.to_string(),
            fmt_f64(self.accel_x, 6),
            fmt_f64(self.accel_y, 6),
            fmt_f64(self.accel_z, 6),
            fmt_f64(self.gyro_x, 6),
            fmt_f64(self.gyro_y, 6),
            fmt_f64(self.gyro_z, 6),
            fmt_f64(self.mag_x, 4),
            fmt_f64(self.mag_y, 4),
            fmt_f64(self.mag_z, 4),
            fmt_f64(self.temperature, 2),
        ]
    }
}
