//! Sensor producers.
//!
//! One generic cadence-driven reader covers all five sensors; each sensor
//! module contributes its configuration mapping plus a produce function
//! (simulated or device-backed). Producers never block on a slow consumer:
//! a full channel drops the record and bumps a counter.

mod camera;
mod gps;
mod imu;
mod lidar;
mod radar;

pub use camera::camera_reader;
pub use gps::gps_reader;
pub use imu::imu_reader;
pub use lidar::lidar_reader;
pub use radar::radar_reader;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Produces one record for the given monotonic sequence number.
pub type ProduceFn<R> = Box<dyn FnMut(u64) -> R + Send>;

/// A cadence-driven sensor producer feeding a bounded channel.
pub struct SensorReader<R> {
    name: &'static str,
    period: Duration,
    capacity: usize,
    warn_on_drop: bool,
    produce: Option<ProduceFn<R>>,
    tx: Option<mpsc::Sender<R>>,
    rx: Option<mpsc::Receiver<R>>,
    produced: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl<R: Send + 'static> SensorReader<R> {
    pub fn new(
        name: &'static str,
        period: Duration,
        capacity: usize,
        warn_on_drop: bool,
        produce: ProduceFn<R>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            name,
            period,
            capacity,
            warn_on_drop,
            produce: Some(produce),
            tx: Some(tx),
            rx: Some(rx),
            produced: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Hands out the consumer end. The drain stage takes exclusive ownership.
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<R>> {
        self.rx.take()
    }

    /// Atomic snapshot of (produced, dropped).
    pub fn stats(&self) -> (u64, u64) {
        (
            self.produced.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
        )
    }

    /// Launches the production task. It ticks at the configured cadence until
    /// cancelled, then drops its sender to signal end-of-stream downstream.
    pub fn start(&mut self, token: &CancellationToken) {
        let (Some(tx), Some(mut produce)) = (self.tx.take(), self.produce.take()) else {
            warn!("{}: reader already started", self.name);
            return;
        };

        let name = self.name;
        let period = self.period;
        let warn_on_drop = self.warn_on_drop;
        let produced = self.produced.clone();
        let dropped = self.dropped.clone();
        let token = token.clone();

        info!(
            "{name} reader started  (period={:?}, buffer={}, warn_on_drop={warn_on_drop})",
            period, self.capacity
        );

        tokio::spawn(async move {
            // First tick one full period in, like a hardware cadence.
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            let mut seq: u64 = 0;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let record = produce(seq);
                        seq += 1;
                        match tx.try_send(record) {
                            Ok(()) => {
                                produced.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                dropped.fetch_add(1, Ordering::Relaxed);
                                if warn_on_drop {
                                    warn!("{name}: dropped record {} (consumer too slow)", seq - 1);
                                }
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => break,
                        }
                    }
                }
            }

            info!(
                "{name} reader stopped  (produced={}, dropped={})",
                produced.load(Ordering::Relaxed),
                dropped.load(Ordering::Relaxed)
            );
        });
    }
}

/// Channel capacity, falling back to the sensor's burst-tolerance default
/// when the configured value is zero or negative.
pub(crate) fn buffer_or(configured: i64, default: usize) -> usize {
    if configured <= 0 {
        default
    } else {
        configured as usize
    }
}
