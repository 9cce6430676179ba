use std::time::Duration;

use rand::Rng;

use crate::config::LidarConfig;
use crate::records::LidarPacket;
use crate::util::now_nanos;

use super::{buffer_or, SensorReader};

const DEFAULT_BUFFER: usize = 256;
/// Velodyne VLP-16 emits roughly 75 packets per rotation.
const PACKETS_PER_ROTATION: f64 = 75.0;
const BYTES_PER_POINT: usize = 16;

/// LiDAR producer: packet rate derived from rotation speed,
/// e.g. 600 RPM ≈ 750 packets/sec.
pub fn lidar_reader(cfg: &LidarConfig, simulate: bool) -> SensorReader<LidarPacket> {
    let packets_per_sec = f64::from(cfg.rpm) / 60.0 * PACKETS_PER_ROTATION;
    let period = Duration::from_secs_f64(1.0 / packets_per_sec);
    let capacity = buffer_or(cfg.channel_buffer, DEFAULT_BUFFER);
    let cfg = cfg.clone();

    let produce = move |seq: u64| -> LidarPacket {
        let ts = now_nanos();

        if simulate {
            let num_points =
                (cfg.points_per_packet + rand::thread_rng().gen_range(-16..16)).max(0) as usize;
            let raw_cloud = vec![0u8; num_points * BYTES_PER_POINT];
            return LidarPacket {
                timestamp_ns: ts,
                packet_id: seq,
                num_points,
                model: cfg.model.clone(),
                rotation_deg: (seq as f64 * 0.48) % 360.0,
                cloud_file_path: String::new(),
                size_bytes: raw_cloud.len(),
                raw_cloud,
            };
        }

        // TODO: UDP socket read from the sensor at cfg.address:cfg.port.
        LidarPacket {
            timestamp_ns: ts,
            packet_id: seq,
            model: cfg.model.clone(),
            ..Default::default()
        }
    };

    SensorReader::new("lidar", period, capacity, false, Box::new(produce))
}
