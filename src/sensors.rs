use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::SensorsConfig;
use crate::ingest::{
    camera_reader, gps_reader, imu_reader, lidar_reader, radar_reader, SensorReader,
};
use crate::records::{CameraFrame, GpsFix, ImuSample, LidarPacket, RadarTarget};

/// The consumer ends of every enabled sensor channel.
///
/// Disabled sensors are `None`; the fusion stage takes exclusive ownership of
/// each receiver it drains.
#[derive(Default)]
pub struct SensorStreams {
    pub camera: Option<mpsc::Receiver<CameraFrame>>,
    pub lidar: Option<mpsc::Receiver<LidarPacket>>,
    pub gps: Option<mpsc::Receiver<GpsFix>>,
    pub imu: Option<mpsc::Receiver<ImuSample>>,
    pub radar: Option<mpsc::Receiver<RadarTarget>>,
}

/// Owns the lifecycle of every sensor producer.
pub struct SensorsController {
    camera: Option<SensorReader<CameraFrame>>,
    lidar: Option<SensorReader<LidarPacket>>,
    gps: Option<SensorReader<GpsFix>>,
    imu: Option<SensorReader<ImuSample>>,
    radar: Option<SensorReader<RadarTarget>>,
}

impl SensorsController {
    /// Creates a reader for every enabled sensor.
    pub fn new(cfg: &SensorsConfig) -> Self {
        let sim = cfg.simulation.enabled;
        let s = &cfg.sensors;
        Self {
            camera: s.camera.enabled.then(|| camera_reader(&s.camera, sim)),
            lidar: s.lidar.enabled.then(|| lidar_reader(&s.lidar, sim)),
            gps: s.gps.enabled.then(|| gps_reader(&s.gps, sim)),
            imu: s.imu.enabled.then(|| imu_reader(&s.imu, sim)),
            radar: s.radar.enabled.then(|| radar_reader(&s.radar, sim)),
        }
    }

    /// Launches every enabled producer under the shared cancel token.
    pub fn start(&mut self, token: &CancellationToken) {
        if let Some(r) = self.camera.as_mut() {
            r.start(token);
        }
        if let Some(r) = self.lidar.as_mut() {
            r.start(token);
        }
        if let Some(r) = self.gps.as_mut() {
            r.start(token);
        }
        if let Some(r) = self.imu.as_mut() {
            r.start(token);
        }
        if let Some(r) = self.radar.as_mut() {
            r.start(token);
        }
        info!("sensors controller: all enabled readers launched");
    }

    /// Hands the consumer ends to the fusion stage.
    pub fn streams(&mut self) -> SensorStreams {
        SensorStreams {
            camera: self.camera.as_mut().and_then(SensorReader::take_output),
            lidar: self.lidar.as_mut().and_then(SensorReader::take_output),
            gps: self.gps.as_mut().and_then(SensorReader::take_output),
            imu: self.imu.as_mut().and_then(SensorReader::take_output),
            radar: self.radar.as_mut().and_then(SensorReader::take_output),
        }
    }

    /// Logs each active producer's (produced, dropped) counters.
    pub fn log_stats(&self) {
        if let Some(r) = &self.camera {
            let (p, d) = r.stats();
            info!("  camera   produced={p}  dropped={d}");
        }
        if let Some(r) = &self.lidar {
            let (p, d) = r.stats();
            info!("  lidar    produced={p}  dropped={d}");
        }
        if let Some(r) = &self.gps {
            let (p, d) = r.stats();
            info!("  gps      produced={p}  dropped={d}");
        }
        if let Some(r) = &self.imu {
            let (p, d) = r.stats();
            info!("  imu      produced={p}  dropped={d}");
        }
        if let Some(r) = &self.radar {
            let (p, d) = r.stats();
            info!("  radar    produced={p}  dropped={d}");
        }
    }
}
