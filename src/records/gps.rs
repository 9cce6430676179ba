use serde::{Deserialize, Serialize};

use super::{fmt_f64, CsvRecord};

/// One GPS fix.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GpsFix {
    pub timestamp_ns: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Metres above the WGS-84 ellipsoid.
    pub altitude: f64,
    /// Ground speed, m/s.
    pub speed: f64,
    /// Degrees from true north.
    pub heading: f64,
    /// Horizontal dilution of precision.
    pub hdop: f64,
    /// 0 = invalid, 1 = GPS, 2 = DGPS, 4 = RTK, ...
    pub fix_quality: u8,
    pub num_sats: u8,
}

impl CsvRecord for GpsFix {
    fn columns() -> &'static [&'static str] {
        &[
            "timestamp_ns",
            "latitude",
            "longitude",
            "altitude",
            "speed",
            "heading",
            "hdop",
            "fix_quality",
            "num_sats",
        ]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp_ns.to_string(),
            fmt_f64(self.latitude, 9),
            fmt_f64(self.longitude, 9),
            fmt_f64(self.altitude, 3),
            fmt_f64(self.speed, 4),
            fmt_f64(self.heading, 2),
            fmt_f64(self.hdop, 2),
            self.fix_quality.to_string(),
            self.num_sats.to_string(),
        ]
    }
}
