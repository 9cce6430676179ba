use serde::{Deserialize, Serialize};

use super::{fmt_f64, CsvRecord};

/// One detected radar target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RadarTarget {
    pub timestamp_ns: i64,
    /// Monotonic per-session target counter, starting at 0.
    pub target_id: u64,
    /// Metres.
    pub range_m: f64,
    /// Degrees.
    pub azimuth: f64,
    /// Degrees.
    pub elevation: f64,
    /// Radial velocity, m/s, positive = approaching.
    pub velocity: f64,
    /// Radar cross-section, dBsm.
    pub rcs: f64,
}

impl CsvRecord for RadarTarget {
    fn columns() -> &'static [&'static str] {
        &[
            "timestamp_ns",
            "target_id",
            "range",
            "azimuth",
            "elevation",
            "velocity",
            "rcs",
        ]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp_ns.to_string(),
            self.target_id.to_string(),
            fmt_f64(self.range_m, 3),
            fmt_f64(self.azimuth, 2),
            fmt_f64(self.elevation, 2),
            fmt_f64(self.velocity, 3),
            fmt_f64(self.rcs, 2),
        ]
    }
}
