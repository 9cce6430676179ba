use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{SensorsConfig, StorageConfig};
use crate::csv_writer::CsvWriter;
use crate::records::{CameraFrame, CsvRecord, FusedRecord, GpsFix, ImuSample, LidarPacket, RadarTarget};
use crate::util::session_name;

const FRAME_QUEUE_CAPACITY: usize = 64;
const FRAME_WORKERS: usize = 2;

/// Final pipeline stage: consumes fused records and persists them as
///
///   - `fused.csv` with every sensor's columns in one row,
///   - one `<sensor>.csv` per enabled sensor,
///   - raw JPEG frames on disk (optional).
///
/// Rows go into buffered writers; a flusher task pushes them to the OS on a
/// fixed interval so the write path never stalls the fusion stage.
pub struct RecordingController {
    session_dir: PathBuf,
    flush_interval: Duration,
    save_frames: bool,
    frames_dir: PathBuf,
    frames_rel: String,
    frame_naming: String,
    writers: Writers,
    frame_sink: Option<FrameSink>,
    frame_workers: Vec<JoinHandle<()>>,
    rows_written: Arc<AtomicU64>,
    tasks: Vec<JoinHandle<()>>,
}

/// The full writer set, cheap to clone into the recorder's tasks.
#[derive(Clone)]
struct Writers {
    fused: Arc<CsvWriter>,
    camera: Option<Arc<CsvWriter>>,
    lidar: Option<Arc<CsvWriter>>,
    gps: Option<Arc<CsvWriter>>,
    imu: Option<Arc<CsvWriter>>,
    radar: Option<Arc<CsvWriter>>,
}

impl Writers {
    fn all(&self) -> impl Iterator<Item = &Arc<CsvWriter>> {
        std::iter::once(&self.fused).chain(
            [&self.camera, &self.lidar, &self.gps, &self.imu, &self.radar]
                .into_iter()
                .flatten(),
        )
    }

    fn flush_all(&self) {
        for w in self.all() {
            w.flush();
        }
    }

    fn close_all(&self) {
        for w in self.all() {
            w.close();
        }
    }
}

/// Refuses to reuse an existing session directory unless overwriting is
/// explicitly allowed.
fn create_session_dir(dir: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && dir.exists() {
        bail!("session dir {} already exists (overwrite=false)", dir.display());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder
        .create(dir)
        .with_context(|| format!("create session dir {}", dir.display()))
}

impl RecordingController {
    /// Materializes the session directory tree and opens every CSV writer.
    /// Any failure here aborts startup; nothing after this point does.
    pub fn new(storage_cfg: &StorageConfig, sensors_cfg: &SensorsConfig) -> Result<Self> {
        let st = &storage_cfg.storage;
        let session_dir = st.base_dir.join(session_name(&st.session_prefix));
        create_session_dir(&session_dir, st.overwrite)?;

        let buf_size = st.csv.buffer_size_kb.max(0) as usize * 1024;
        let write_header = st.csv.write_header;

        let fused = Arc::new(CsvWriter::new(
            session_dir.join("fused.csv"),
            buf_size,
            write_header,
            FusedRecord::columns(),
        )?);

        let sensors = &sensors_cfg.sensors;
        let open = |name: &str, header: &[&str]| -> Result<Arc<CsvWriter>> {
            Ok(Arc::new(CsvWriter::new(
                session_dir.join(name),
                buf_size,
                write_header,
                header,
            )?))
        };

        let camera = if sensors.camera.enabled {
            Some(open("camera.csv", CameraFrame::columns())?)
        } else {
            None
        };
        let lidar = if sensors.lidar.enabled {
            Some(open("lidar.csv", LidarPacket::columns())?)
        } else {
            None
        };
        let gps = if sensors.gps.enabled {
            Some(open("gps.csv", GpsFix::columns())?)
        } else {
            None
        };
        let imu = if sensors.imu.enabled {
            Some(open("imu.csv", ImuSample::columns())?)
        } else {
            None
        };
        let radar = if sensors.radar.enabled {
            Some(open("radar.csv", RadarTarget::columns())?)
        } else {
            None
        };

        let save_frames = sensors.camera.enabled && sensors.camera.save_frames;
        let frames_dir = session_dir.join(&st.frames.save_path);
        if save_frames {
            create_session_dir(&frames_dir, true)?;
        }

        let flush_ms = if st.csv.flush_interval_ms <= 0 {
            100
        } else {
            st.csv.flush_interval_ms as u64
        };

        info!("recording controller ready  session={}", session_dir.display());

        Ok(Self {
            session_dir,
            flush_interval: Duration::from_millis(flush_ms),
            save_frames,
            frames_dir,
            frames_rel: st.frames.save_path.clone(),
            frame_naming: st.frames.naming.clone(),
            writers: Writers {
                fused,
                camera,
                lidar,
                gps,
                imu,
                radar,
            },
            frame_sink: None,
            frame_workers: Vec::new(),
            rows_written: Arc::new(AtomicU64::new(0)),
            tasks: Vec::new(),
        })
    }

    /// Launches the writer and flusher tasks consuming the fused stream.
    pub fn start(&mut self, token: &CancellationToken, mut rx: mpsc::Receiver<FusedRecord>) {
        // Periodic flusher: one final flush on the way out.
        let writers = self.writers.clone();
        let flush_interval = self.flush_interval;
        let flush_token = token.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + flush_interval, flush_interval);
            loop {
                tokio::select! {
                    _ = flush_token.cancelled() => {
                        writers.flush_all();
                        return;
                    }
                    _ = ticker.tick() => writers.flush_all(),
                }
            }
        }));

        let sink = if self.save_frames {
            let (sink, workers) = FrameSink::start(
                self.frames_dir.clone(),
                self.frames_rel.clone(),
                self.frame_naming.clone(),
            );
            self.frame_workers = workers;
            self.frame_sink = Some(sink.clone());
            Some(sink)
        } else {
            None
        };

        // Writer: fans each fused record out to every relevant file.
        let writers = self.writers.clone();
        let rows_written = self.rows_written.clone();
        let write_token = token.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = write_token.cancelled() => return,
                    record = rx.recv() => {
                        let Some(record) = record else { return };
                        write_record(&writers, sink.as_ref(), &rows_written, record);
                    }
                }
            }
        }));

        info!("recording controller started");
    }

    /// Waits for the recorder tasks, drains pending frame writes, then
    /// flushes and closes every file.
    pub async fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        // Closing the submission queue lets the workers drain and exit.
        self.frame_sink = None;
        for worker in self.frame_workers.drain(..) {
            let _ = worker.await;
        }

        self.writers.flush_all();
        self.writers.close_all();

        info!(
            "recording controller stopped  (rows_written={}, session={})",
            self.rows_written.load(Ordering::Relaxed),
            self.session_dir.display()
        );
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Total fused rows persisted so far.
    pub fn rows_written(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }
}

/// One fused record fanned out to the fused CSV, the per-sensor CSVs, and
/// (for camera frames with payloads) the frame sink.
fn write_record(
    writers: &Writers,
    frames: Option<&FrameSink>,
    rows_written: &AtomicU64,
    mut record: FusedRecord,
) {
    writers.fused.write_row(&record.to_row());

    if let Some(cam) = record.camera.as_mut() {
        if let Some(w) = &writers.camera {
            if let Some(sink) = frames {
                if !cam.jpeg.is_empty() {
                    let file_name = sink.file_name(cam);
                    cam.file_path = format!("{}/{}", sink.rel_dir, file_name);
                    sink.submit(&file_name, std::mem::take(&mut cam.jpeg));
                }
            }
            w.write_row(&cam.to_row());
        }
    }
    if let Some(pkt) = &record.lidar {
        if let Some(w) = &writers.lidar {
            w.write_row(&pkt.to_row());
        }
    }
    if let Some(fix) = &record.gps {
        if let Some(w) = &writers.gps {
            w.write_row(&fix.to_row());
        }
    }
    if let Some(sample) = &record.imu {
        if let Some(w) = &writers.imu {
            w.write_row(&sample.to_row());
        }
    }
    if let Some(target) = &record.radar {
        if let Some(w) = &writers.radar {
            w.write_row(&target.to_row());
        }
    }

    rows_written.fetch_add(1, Ordering::Relaxed);
}

struct FrameJob {
    path: PathBuf,
    data: Vec<u8>,
}

/// Bounded sink for raw frame bytes: a small worker pool drains a bounded
/// submission queue, so a burst of frames can never pile up unbounded tasks
/// or file descriptors. A full queue rejects the frame with a warning.
#[derive(Clone)]
struct FrameSink {
    tx: mpsc::Sender<FrameJob>,
    dir: PathBuf,
    rel_dir: String,
    naming: String,
}

impl FrameSink {
    fn start(dir: PathBuf, rel_dir: String, naming: String) -> (Self, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::channel::<FrameJob>(FRAME_QUEUE_CAPACITY);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let workers = (0..FRAME_WORKERS)
            .map(|_| {
                let rx = rx.clone();
                tokio::spawn(async move {
                    loop {
                        let job = rx.lock().await.recv().await;
                        let Some(job) = job else { return };
                        if let Err(e) = tokio::fs::write(&job.path, &job.data).await {
                            error!("save frame {}: {e}", job.path.display());
                        }
                    }
                })
            })
            .collect();

        (
            Self {
                tx,
                dir,
                rel_dir,
                naming,
            },
            workers,
        )
    }

    fn file_name(&self, frame: &CameraFrame) -> String {
        if self.naming == "sequence" {
            format!("{}.jpg", frame.frame_id)
        } else {
            format!("{}.jpg", frame.timestamp_ns)
        }
    }

    fn submit(&self, file_name: &str, data: Vec<u8>) {
        let job = FrameJob {
            path: self.dir.join(file_name),
            data,
        };
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("frame sink: queue full, dropping frame {file_name}");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CameraConfig, Resolution, Storage};
    use tempfile::TempDir;

    fn storage_cfg(base: &Path) -> StorageConfig {
        StorageConfig {
            storage: Storage {
                base_dir: base.to_path_buf(),
                session_prefix: "drive".into(),
                ..Default::default()
            },
        }
    }

    fn sensors_cfg(camera: bool, gps: bool) -> SensorsConfig {
        let mut cfg = SensorsConfig::default();
        cfg.sensors.camera = CameraConfig {
            enabled: camera,
            resolution: Resolution {
                width: 1280,
                height: 720,
            },
            fps: 30,
            format: "MJPEG".into(),
            save_frames: true,
            ..Default::default()
        };
        cfg.sensors.gps.enabled = gps;
        cfg.sensors.gps.update_rate_hz = 10;
        cfg
    }

    fn camera_frame(ts: i64, frame_id: u64) -> CameraFrame {
        CameraFrame {
            timestamp_ns: ts,
            frame_id,
            width: 1280,
            height: 720,
            format: "MJPEG".into(),
            file_path: String::new(),
            size_bytes: 4,
            jpeg: vec![0xFF, 0xD8, 0x01, 0x02],
        }
    }

    fn gps_fix(ts: i64, lat: f64) -> GpsFix {
        GpsFix {
            timestamp_ns: ts,
            latitude: lat,
            longitude: 77.0,
            fix_quality: 1,
            num_sats: 12,
            ..Default::default()
        }
    }

    async fn wait_for_rows(recorder: &RecordingController, n: u64) {
        for _ in 0..10_000 {
            if recorder.rows_written() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("recorder never reached {n} rows");
    }

    #[test]
    fn test_overwrite_guard() -> Result<()> {
        let dir = TempDir::new()?;
        let session = dir.path().join("drive_20240101_000000");
        fs::create_dir_all(&session)?;

        let err = create_session_dir(&session, false).expect_err("must refuse");
        assert!(err.to_string().contains("already exists"));

        create_session_dir(&session, true)?;
        Ok(())
    }

    #[tokio::test]
    async fn test_bring_up_creates_session_layout() -> Result<()> {
        let dir = TempDir::new()?;
        let mut recorder = RecordingController::new(&storage_cfg(dir.path()), &sensors_cfg(true, true))?;
        recorder.stop().await;

        let session = recorder.session_dir();
        assert!(session.starts_with(dir.path()));
        assert!(session.join("fused.csv").exists());
        assert!(session.join("camera.csv").exists());
        assert!(session.join("gps.csv").exists());
        assert!(session.join("frames").is_dir());
        assert!(!session.join("lidar.csv").exists());
        assert!(!session.join("imu.csv").exists());
        assert!(!session.join("radar.csv").exists());

        // Headers are the frozen contract, written verbatim.
        let fused = fs::read_to_string(session.join("fused.csv"))?;
        assert_eq!(fused.lines().next(), Some(FusedRecord::columns().join(",").as_str()));
        let gps = fs::read_to_string(session.join("gps.csv"))?;
        assert_eq!(gps.lines().next(), Some(GpsFix::columns().join(",").as_str()));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_and_frame_persistence() -> Result<()> {
        let dir = TempDir::new()?;
        let mut recorder = RecordingController::new(&storage_cfg(dir.path()), &sensors_cfg(true, true))?;
        let (tx, rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        recorder.start(&token, rx);

        tx.send(FusedRecord {
            timestamp_ns: 1_000,
            camera: Some(camera_frame(900, 0)),
            gps: Some(gps_fix(950, 12.9716)),
            ..Default::default()
        })
        .await
        .expect("send");
        wait_for_rows(&recorder, 1).await;

        tx.send(FusedRecord {
            timestamp_ns: 2_000,
            gps: Some(gps_fix(1_950, 12.9717)),
            ..Default::default()
        })
        .await
        .expect("send");
        wait_for_rows(&recorder, 2).await;

        token.cancel();
        recorder.stop().await;
        assert_eq!(recorder.rows_written(), 2);

        let session = recorder.session_dir();

        let fused = fs::read_to_string(session.join("fused.csv"))?;
        let rows: Vec<&str> = fused.lines().skip(1).collect();
        assert_eq!(rows.len(), 2);
        // Fused row is written before the recorder assigns the frame path.
        let first: Vec<&str> = rows[0].split(',').collect();
        assert_eq!(first[0], "1000");
        assert_eq!(first[1], "0");
        assert_eq!(first[2], "");
        assert_eq!(first[8], "12.971600000");
        assert!(fused.ends_with('\n'));

        // Camera CSV carries the assigned relative frame path.
        let camera = fs::read_to_string(session.join("camera.csv"))?;
        let cam_rows: Vec<&str> = camera.lines().skip(1).collect();
        assert_eq!(cam_rows.len(), 1);
        assert!(cam_rows[0].contains("frames/900.jpg"));

        // The raw bytes made it to disk with the JPEG SOI marker.
        let frame = fs::read(session.join("frames").join("900.jpg"))?;
        assert_eq!(&frame[..2], &[0xFF, 0xD8]);
        assert_eq!(frame.len(), 4);

        let gps = fs::read_to_string(session.join("gps.csv"))?;
        assert_eq!(gps.lines().skip(1).count(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_with_empty_queue_exits_cleanly() -> Result<()> {
        let dir = TempDir::new()?;
        let mut recorder = RecordingController::new(&storage_cfg(dir.path()), &sensors_cfg(false, true))?;
        let (_tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        recorder.start(&token, rx);

        token.cancel();
        recorder.stop().await;

        assert_eq!(recorder.rows_written(), 0);
        let fused = fs::read_to_string(recorder.session_dir().join("fused.csv"))?;
        assert_eq!(fused.lines().count(), 1, "header only");
        assert!(!recorder.session_dir().join("camera.csv").exists());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_fused_stream_stops_writer() -> Result<()> {
        let dir = TempDir::new()?;
        let mut recorder = RecordingController::new(&storage_cfg(dir.path()), &sensors_cfg(false, true))?;
        let (tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        recorder.start(&token, rx);

        tx.send(FusedRecord {
            timestamp_ns: 5,
            gps: Some(gps_fix(4, 12.0)),
            ..Default::default()
        })
        .await
        .expect("send");
        drop(tx);
        wait_for_rows(&recorder, 1).await;

        // Writer exits on end-of-stream; flusher still needs the cancel.
        token.cancel();
        recorder.stop().await;
        assert_eq!(recorder.rows_written(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_frame_naming() -> Result<()> {
        let dir = TempDir::new()?;
        let mut storage = storage_cfg(dir.path());
        storage.storage.frames.naming = "sequence".into();
        let mut recorder = RecordingController::new(&storage, &sensors_cfg(true, false))?;
        let (tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        recorder.start(&token, rx);

        tx.send(FusedRecord {
            timestamp_ns: 1_000,
            camera: Some(camera_frame(900, 7)),
            ..Default::default()
        })
        .await
        .expect("send");
        wait_for_rows(&recorder, 1).await;

        token.cancel();
        recorder.stop().await;
        assert!(recorder.session_dir().join("frames").join("7.jpg").exists());
        Ok(())
    }
}
