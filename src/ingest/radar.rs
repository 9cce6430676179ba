use std::time::Duration;

use rand::Rng;

use crate::config::RadarConfig;
use crate::records::RadarTarget;
use crate::util::now_nanos;

use super::{buffer_or, SensorReader};

const DEFAULT_BUFFER: usize = 128;
/// Automotive radar units report at ~20 Hz regardless of configuration.
const REPORT_PERIOD: Duration = Duration::from_millis(50);

pub fn radar_reader(cfg: &RadarConfig, simulate: bool) -> SensorReader<RadarTarget> {
    let capacity = buffer_or(cfg.channel_buffer, DEFAULT_BUFFER);

    let produce = move |seq: u64| -> RadarTarget {
        let ts = now_nanos();

        if simulate {
            let mut rng = rand::thread_rng();
            return RadarTarget {
                timestamp_ns: ts,
                target_id: seq,
                range_m: 10.0 + rng.gen_range(0.0..90.0),
                azimuth: -30.0 + rng.gen_range(0.0..60.0),
                elevation: -5.0 + rng.gen_range(0.0..10.0),
                velocity: -15.0 + rng.gen_range(0.0..30.0),
                rcs: -10.0 + rng.gen_range(0.0..30.0),
            };
        }

        // TODO: network read from the radar ECU at cfg.address:cfg.port.
        RadarTarget {
            timestamp_ns: ts,
            target_id: seq,
            ..Default::default()
        }
    };

    SensorReader::new("radar", REPORT_PERIOD, capacity, false, Box::new(produce))
}
