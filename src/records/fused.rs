use serde::{Deserialize, Serialize};

use super::{fmt_f64, CameraFrame, CsvRecord, GpsFix, ImuSample, LidarPacket, RadarTarget};

/// A time-aligned snapshot across all active sensors.
///
/// The fusion stage emits one of these per alignment tick. Components are the
/// most recent sample that arrived since the previous tick, or `None`; a
/// sensor disabled by configuration is always `None`. `timestamp_ns` is the
/// alignment tick time itself, independent of the component timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusedRecord {
    pub timestamp_ns: i64,
    pub camera: Option<CameraFrame>,
    pub lidar: Option<LidarPacket>,
    pub gps: Option<GpsFix>,
    pub imu: Option<ImuSample>,
    pub radar: Option<RadarTarget>,
}

impl CsvRecord for FusedRecord {
    fn columns() -> &'static [&'static str] {
        &[
            "timestamp_ns",
            "cam_frame_id",
            "cam_file_path",
            "cam_width",
            "cam_height",
            "lidar_packet_id",
            "lidar_num_points",
            "lidar_cloud_path",
            "gps_lat",
            "gps_lon",
            "gps_alt",
            "gps_speed",
            "gps_heading",
            "imu_ax",
            "imu_ay",
            "imu_az",
            "imu_gx",
            "imu_gy",
            "imu_gz",
            "radar_range",
            "radar_azimuth",
            "radar_velocity",
        ]
    }

    /// Missing components render as empty fields, never a sentinel.
    fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(Self::columns().len());
        row.push(self.timestamp_ns.to_string());

        match &self.camera {
            Some(cam) => {
                row.push(cam.frame_id.to_string());
                row.push(cam.file_path.clone());
                row.push(cam.width.to_string());
                row.push(cam.height.to_string());
            }
            None => row.extend(std::iter::repeat(String::new()).take(4)),
        }

        match &self.lidar {
            Some(pkt) => {
                row.push(pkt.packet_id.to_string());
                row.push(pkt.num_points.to_string());
                row.push(pkt.cloud_file_path.clone());
            }
            None => row.extend(std::iter::repeat(String::new()).take(3)),
        }

        match &self.gps {
            Some(fix) => {
                row.push(fmt_f64(fix.latitude, 9));
                row.push(fmt_f64(fix.longitude, 9));
                row.push(fmt_f64(fix.altitude, 3));
                row.push(fmt_f64(fix.speed, 4));
                row.push(fmt_f64(fix.heading, 2));
            }
            None => row.extend(std::iter::repeat(String::new()).take(5)),
        }

        match &self.imu {
            Some(s) => {
                row.push(fmt_f64(s.accel_x, 6));
                row.push(fmt_f64(s.accel_y, 6));
                row.push(fmt_f64(s.accel_z, 6));
                row.push(fmt_f64(s.gyro_x, 6));
                row.push(fmt_f64(s.gyro_y, 6));
                row.push(fmt_f64(s.gyro_z, 6));
            }
            None => row.extend(std::iter::repeat(String::new()).take(6)),
        }

        match &self.radar {
            Some(t) => {
                row.push(fmt_f64(t.range_m, 3));
                row.push(fmt_f64(t.azimuth, 2));
                row.push(fmt_f64(t.velocity, 3));
            }
            None => row.extend(std::iter::repeat(String::new()).take(3)),
        }

        row
    }
}
