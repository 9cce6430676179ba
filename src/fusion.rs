use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::records::{CameraFrame, FusedRecord, GpsFix, ImuSample, LidarPacket, RadarTarget};
use crate::sensors::SensorStreams;
use crate::util::now_nanos;

const FUSED_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_ALIGN_MS: i64 = 33;

/// Latest-value cell per sensor. Writes overwrite, reads clear, so a sample
/// is included in at most one fused record.
#[derive(Default)]
struct LatestCells {
    camera: Option<CameraFrame>,
    lidar: Option<LidarPacket>,
    gps: Option<GpsFix>,
    imu: Option<ImuSample>,
    radar: Option<RadarTarget>,
}

/// Merges all sensor streams into one time-aligned fused stream.
///
/// One drain task per sensor keeps only the newest value; a merge task
/// snapshots the cells at a fixed cadence, decoupling the fused output rate
/// from every sensor rate. Nothing here ever blocks a producer.
pub struct FusionController {
    cells: Arc<Mutex<LatestCells>>,
    align_interval: Duration,
    tx: Option<mpsc::Sender<FusedRecord>>,
    rx: Option<mpsc::Receiver<FusedRecord>>,
}

impl FusionController {
    /// `align_ms` values ≤ 0 fall back to the ~30 Hz default.
    pub fn new(align_ms: i64) -> Self {
        let align_ms = if align_ms <= 0 { DEFAULT_ALIGN_MS } else { align_ms };
        let (tx, rx) = mpsc::channel(FUSED_CHANNEL_CAPACITY);
        Self {
            cells: Arc::new(Mutex::new(LatestCells::default())),
            align_interval: Duration::from_millis(align_ms as u64),
            tx: Some(tx),
            rx: Some(rx),
        }
    }

    pub fn align_interval(&self) -> Duration {
        self.align_interval
    }

    /// Hands out the fused stream. The recorder takes exclusive ownership.
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<FusedRecord>> {
        self.rx.take()
    }

    /// Launches one drain task per present stream plus the merge task.
    pub fn start(&mut self, token: &CancellationToken, streams: SensorStreams) {
        if let Some(rx) = streams.camera {
            self.spawn_drain(token, rx, |c: &mut LatestCells| &mut c.camera);
        }
        if let Some(rx) = streams.lidar {
            self.spawn_drain(token, rx, |c: &mut LatestCells| &mut c.lidar);
        }
        if let Some(rx) = streams.gps {
            self.spawn_drain(token, rx, |c: &mut LatestCells| &mut c.gps);
        }
        if let Some(rx) = streams.imu {
            self.spawn_drain(token, rx, |c: &mut LatestCells| &mut c.imu);
        }
        if let Some(rx) = streams.radar {
            self.spawn_drain(token, rx, |c: &mut LatestCells| &mut c.radar);
        }

        let Some(tx) = self.tx.take() else {
            warn!("fusion controller already started");
            return;
        };
        self.spawn_merge(token, tx);

        info!(
            "fusion controller started (align_interval={}ms)",
            self.align_interval.as_millis()
        );
    }

    /// Reads one sensor stream as fast as it produces, keeping only the
    /// newest value. Exits on cancel or end-of-stream.
    fn spawn_drain<R: Send + 'static>(
        &self,
        token: &CancellationToken,
        mut rx: mpsc::Receiver<R>,
        slot: fn(&mut LatestCells) -> &mut Option<R>,
    ) {
        let cells = self.cells.clone();
        let token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    record = rx.recv() => {
                        let Some(record) = record else { return };
                        *slot(&mut cells.lock()) = Some(record);
                    }
                }
            }
        });
    }

    /// Emits one fused snapshot per alignment tick, clearing the cells so no
    /// sample is duplicated across ticks. Dropping `tx` on exit closes the
    /// fused stream.
    fn spawn_merge(&self, token: &CancellationToken, tx: mpsc::Sender<FusedRecord>) {
        let cells = self.cells.clone();
        let period = self.align_interval;
        let token = token.clone();

        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("fusion controller stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        let record = {
                            let mut cells = cells.lock();
                            FusedRecord {
                                timestamp_ns: now_nanos(),
                                camera: cells.camera.take(),
                                lidar: cells.lidar.take(),
                                gps: cells.gps.take(),
                                imu: cells.imu.take(),
                                radar: cells.radar.take(),
                            }
                        };
                        match tx.try_send(record) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                warn!("fusion: output channel full, dropping fused record");
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => return,
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imu_sample(ts: i64, accel_x: f64) -> ImuSample {
        ImuSample {
            timestamp_ns: ts,
            accel_x,
            ..Default::default()
        }
    }

    fn streams_with_imu(rx: mpsc::Receiver<ImuSample>) -> SensorStreams {
        SensorStreams {
            imu: Some(rx),
            ..Default::default()
        }
    }

    #[test]
    fn test_align_interval_default() {
        assert_eq!(FusionController::new(0).align_interval(), Duration::from_millis(33));
        assert_eq!(FusionController::new(-5).align_interval(), Duration::from_millis(33));
        assert_eq!(FusionController::new(50).align_interval(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_wins_and_cells_clear() {
        let (tx, rx) = mpsc::channel(8);
        let mut fusion = FusionController::new(50);
        let mut out = fusion.take_output().expect("output");
        let token = CancellationToken::new();
        fusion.start(&token, streams_with_imu(rx));

        // Two samples inside the first window: only the newest survives.
        tx.send(imu_sample(1, 0.1)).await.expect("send");
        tx.send(imu_sample(2, 0.2)).await.expect("send");

        let first = out.recv().await.expect("fused record");
        let imu = first.imu.expect("imu component");
        assert_eq!(imu.timestamp_ns, 2);
        assert_eq!(imu.accel_x, 0.2);

        // Nothing arrived in the next window: component absent, not stale.
        let second = out.recv().await.expect("fused record");
        assert!(second.imu.is_none());
        assert!(second.camera.is_none());
        assert!(second.timestamp_ns >= first.timestamp_ns);

        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_component_timestamp_not_newer_than_tick() {
        let (tx, rx) = mpsc::channel(8);
        let mut fusion = FusionController::new(20);
        let mut out = fusion.take_output().expect("output");
        let token = CancellationToken::new();
        fusion.start(&token, streams_with_imu(rx));

        tx.send(imu_sample(now_nanos(), 0.0)).await.expect("send");
        let rec = out.recv().await.expect("fused record");
        let imu = rec.imu.expect("imu component");
        assert!(imu.timestamp_ns <= rec.timestamp_ns);

        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fused_stream_closes_on_cancel() {
        let (_tx, rx) = mpsc::channel::<ImuSample>(1);
        let mut fusion = FusionController::new(10);
        let mut out = fusion.take_output().expect("output");
        let token = CancellationToken::new();
        fusion.start(&token, streams_with_imu(rx));

        token.cancel();
        // Drain whatever raced in, then observe end-of-stream.
        while out.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_records_emitted_without_inputs() {
        let mut fusion = FusionController::new(10);
        let mut out = fusion.take_output().expect("output");
        let token = CancellationToken::new();
        fusion.start(&token, SensorStreams::default());

        let rec = out.recv().await.expect("fused record");
        assert!(rec.camera.is_none() && rec.lidar.is_none() && rec.gps.is_none());
        assert!(rec.imu.is_none() && rec.radar.is_none());
        assert!(rec.timestamp_ns > 0);

        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_can_only_be_taken_once() {
        let mut fusion = FusionController::new(10);
        assert!(fusion.take_output().is_some());
        assert!(fusion.take_output().is_none());
    }
}
