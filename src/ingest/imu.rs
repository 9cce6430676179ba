use std::time::Duration;

use rand::Rng;

use crate::config::ImuConfig;
use crate::records::ImuSample;
use crate::util::now_nanos;

use super::{buffer_or, SensorReader};

const DEFAULT_BUFFER: usize = 512;

/// IMU producer: one sample per `1/update_rate_hz` seconds.
pub fn imu_reader(cfg: &ImuConfig, simulate: bool) -> SensorReader<ImuSample> {
    let period = Duration::from_secs_f64(1.0 / f64::from(cfg.update_rate_hz));
    let capacity = buffer_or(cfg.channel_buffer, DEFAULT_BUFFER);

    // Phase accumulator for the simulated oscillation.
    let mut step = 0.0f64;

    let produce = move |_seq: u64| -> ImuSample {
        let ts = now_nanos();

        if simulate {
            let mut rng = rand::thread_rng();
            let sample = ImuSample {
                timestamp_ns: ts,
                accel_x: 0.02 * step.sin() + rng.gen_range(0.0..0.005),
                accel_y: 0.01 * step.cos() + rng.gen_range(0.0..0.005),
                accel_z: 9.81 + rng.gen_range(0.0..0.02),
                gyro_x: 0.001 * (step * 2.0).sin() + rng.gen_range(0.0..0.0005),
                gyro_y: 0.001 * (step * 2.0).cos() + rng.gen_range(0.0..0.0005),
                gyro_z: 0.0005 + rng.gen_range(0.0..0.0002),
                mag_x: 25.0 + rng.gen_range(0.0..0.5),
                mag_y: -10.0 + rng.gen_range(0.0..0.5),
                mag_z: 45.0 + rng.gen_range(0.0..0.5),
                temperature: 35.0 + rng.gen_range(0.0..2.0),
            };
            step += 0.01;
            return sample;
        }

        // TODO: serial IMU read.
        ImuSample {
            timestamp_ns: ts,
            ..Default::default()
        }
    };

    SensorReader::new("imu", period, capacity, false, Box::new(produce))
}
