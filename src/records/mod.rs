//! Record types for every sensor stream plus the fused snapshot.
//!
//! Each type knows its own CSV layout; the column lists here are a frozen
//! external contract, so downstream tooling can rely on them byte-for-byte.

mod camera;
mod fused;
mod gps;
mod imu;
mod lidar;
mod radar;

pub use camera::CameraFrame;
pub use fused::FusedRecord;
pub use gps::GpsFix;
pub use imu::ImuSample;
pub use lidar::LidarPacket;
pub use radar::RadarTarget;

/// Every loggable record renders itself as one ordered CSV row.
pub trait CsvRecord {
    /// Ordered column names, matching `to_row` field-for-field.
    fn columns() -> &'static [&'static str];

    /// One instance rendered as ordered string fields.
    fn to_row(&self) -> Vec<String>;
}

/// Fixed-point decimal rendering shared by all record types.
pub(crate) fn fmt_f64(v: f64, prec: usize) -> String {
    format!("{v:.prec$}")
}
