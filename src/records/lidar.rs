use serde::{Deserialize, Serialize};

use super::{fmt_f64, CsvRecord};

/// One LiDAR packet of point cloud data.
///
/// Only metadata goes into the CSV; `raw_cloud` is reserved for a future
/// cloud-file sink and is currently dropped after fusion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LidarPacket {
    pub timestamp_ns: i64,
    /// Monotonic per-session packet counter, starting at 0.
    pub packet_id: u64,
    pub num_points: usize,
    /// Device model tag (VLP-16, OS1-64, ...).
    pub model: String,
    /// Azimuth at packet start, degrees.
    pub rotation_deg: f64,
    /// Path to the .pcd/.bin cloud file, reserved.
    pub cloud_file_path: String,
    pub size_bytes: usize,
    /// Raw binary point cloud, never serialized to CSV.
    #[serde(skip)]
    pub raw_cloud: Vec<u8>,
}

impl CsvRecord for LidarPacket {
    fn columns() -> &'static [&'static str] {
        &[
            "timestamp_ns",
            "packet_id",
            "num_points",
            "model",
            "rotation_deg",
            "cloud_file_path",
            "size_bytes",
        ]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp_ns.to_string(),
            self.packet_id.to_string(),
            self.num_points.to_string(),
            self.model.clone(),
            fmt_f64(self.rotation_deg, 2),
            self.cloud_file_path.clone(),
            self.size_bytes.to_string(),
        ]
    }
}
