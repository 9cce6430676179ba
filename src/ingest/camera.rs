use std::time::Duration;

use rand::Rng;

use crate::config::CameraConfig;
use crate::records::CameraFrame;
use crate::util::now_nanos;

use super::{buffer_or, SensorReader};

const DEFAULT_BUFFER: usize = 120;

/// Camera producer: one frame per `1/fps` seconds.
///
/// Drops are the one case worth a log line per event, since a lost frame is
/// a lost artifact rather than one sample of a dense stream.
pub fn camera_reader(cfg: &CameraConfig, simulate: bool) -> SensorReader<CameraFrame> {
    let period = Duration::from_secs_f64(1.0 / f64::from(cfg.fps));
    let capacity = buffer_or(cfg.channel_buffer, DEFAULT_BUFFER);
    let cfg = cfg.clone();

    let produce = move |seq: u64| -> CameraFrame {
        let ts = now_nanos();

        if simulate {
            // Synthetic frame: realistic size, JPEG SOI marker up front.
            let size = rand::thread_rng().gen_range(80_000..120_000);
            let mut jpeg = vec![0u8; size];
            jpeg[0] = 0xFF;
            jpeg[1] = 0xD8;
            return CameraFrame {
                timestamp_ns: ts,
                frame_id: seq,
                width: cfg.resolution.width,
                height: cfg.resolution.height,
                format: cfg.format.clone(),
                file_path: String::new(),
                size_bytes: size,
                jpeg,
            };
        }

        // TODO: V4L2 capture path; until then keep the cadence with
        // metadata-only frames.
        CameraFrame {
            timestamp_ns: ts,
            frame_id: seq,
            width: cfg.resolution.width,
            height: cfg.resolution.height,
            format: cfg.format.clone(),
            ..Default::default()
        }
    };

    SensorReader::new("camera", period, capacity, true, Box::new(produce))
}
