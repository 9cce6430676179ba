use std::time::Duration;

use rand::Rng;

use crate::config::GpsConfig;
use crate::records::GpsFix;
use crate::util::now_nanos;

use super::{buffer_or, SensorReader};

const DEFAULT_BUFFER: usize = 64;

/// GPS producer: one fix per `1/update_rate_hz` seconds.
pub fn gps_reader(cfg: &GpsConfig, simulate: bool) -> SensorReader<GpsFix> {
    let period = Duration::from_secs_f64(1.0 / f64::from(cfg.update_rate_hz));
    let capacity = buffer_or(cfg.channel_buffer, DEFAULT_BUFFER);

    // Simulated drive starts roughly in Bengaluru and creeps north-east.
    let mut lat = 12.9716;
    let mut lon = 77.5946;

    let produce = move |_seq: u64| -> GpsFix {
        let ts = now_nanos();

        if simulate {
            let mut rng = rand::thread_rng();
            lat += 0.00001 + rng.gen_range(0.0..0.000005);
            lon += 0.00001 + rng.gen_range(0.0..0.000005);
            return GpsFix {
                timestamp_ns: ts,
                latitude: lat,
                longitude: lon,
                altitude: 920.0 + rng.gen_range(0.0..2.0),
                speed: 8.0 + rng.gen_range(0.0..2.0),
                heading: 45.0 + rng.gen_range(0.0..5.0),
                hdop: 0.8 + rng.gen_range(0.0..0.4),
                fix_quality: 1,
                num_sats: 12 + rng.gen_range(0..4),
            };
        }

        // TODO: NMEA parsing from the serial port.
        GpsFix {
            timestamp_ns: ts,
            ..Default::default()
        }
    };

    SensorReader::new("gps", period, capacity, false, Box::new(produce))
}
