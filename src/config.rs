use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

// ─── sensors.yaml ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub enabled: bool,
    pub device_path: String,
    pub resolution: Resolution,
    pub fps: u32,
    pub format: String,
    pub channel_buffer: i64,
    pub save_frames: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LidarConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
    pub model: String,
    pub rpm: u32,
    pub channel_buffer: i64,
    pub points_per_packet: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    pub enabled: bool,
    pub serial_port: String,
    pub baud_rate: u32,
    pub update_rate_hz: u32,
    pub channel_buffer: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    pub enabled: bool,
    pub serial_port: String,
    pub baud_rate: u32,
    pub update_rate_hz: u32,
    pub channel_buffer: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
    pub channel_buffer: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub enabled: bool,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Sensors {
    pub camera: CameraConfig,
    pub lidar: LidarConfig,
    pub gps: GpsConfig,
    pub imu: ImuConfig,
    pub radar: RadarConfig,
}

/// Top-level structure of sensors.yaml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub sensors: Sensors,
    pub simulation: SimulationConfig,
}

impl SensorsConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read sensors config {}", path.display()))?;
        let cfg: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("parse sensors config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects rates that would break the producer cadence math.
    pub fn validate(&self) -> Result<()> {
        let s = &self.sensors;
        if s.camera.enabled {
            ensure!(s.camera.fps > 0, "camera: fps must be positive");
            ensure!(
                s.camera.resolution.width > 0 && s.camera.resolution.height > 0,
                "camera: resolution must be positive"
            );
        }
        if s.lidar.enabled {
            ensure!(s.lidar.rpm > 0, "lidar: rpm must be positive");
            ensure!(
                s.lidar.points_per_packet > 0,
                "lidar: points_per_packet must be positive"
            );
        }
        if s.gps.enabled {
            ensure!(s.gps.update_rate_hz > 0, "gps: update_rate_hz must be positive");
        }
        if s.imu.enabled {
            ensure!(s.imu.update_rate_hz > 0, "imu: update_rate_hz must be positive");
        }
        Ok(())
    }
}

// ─── storage.yaml ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsvStorageConfig {
    pub flush_interval_ms: i64,
    pub buffer_size_kb: i64,
    pub write_header: bool,
}

impl Default for CsvStorageConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 100,
            buffer_size_kb: 256,
            write_header: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrameStorageConfig {
    /// Directory for saved frames, relative to the session directory.
    pub save_path: String,
    /// "timestamp" or "sequence".
    pub naming: String,
}

impl Default for FrameStorageConfig {
    fn default() -> Self {
        Self {
            save_path: "frames".into(),
            naming: "timestamp".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub base_dir: PathBuf,
    pub session_prefix: String,
    pub csv: CsvStorageConfig,
    pub frames: FrameStorageConfig,
    pub overwrite: bool,
}

/// Top-level structure of storage.yaml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub storage: Storage,
}

impl StorageConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read storage config {}", path.display()))?;
        let cfg: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("parse storage config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let st = &self.storage;
        ensure!(!st.base_dir.as_os_str().is_empty(), "storage: base_dir must be set");
        ensure!(!st.session_prefix.is_empty(), "storage: session_prefix must be set");
        ensure!(!st.frames.save_path.is_empty(), "storage: frames.save_path must be set");
        Ok(())
    }
}
