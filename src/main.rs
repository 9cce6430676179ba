use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

mod config;
mod csv_writer;
mod fusion;
mod ingest;
mod recorder;
mod records;
mod sensors;
mod util;

use config::{SensorsConfig, StorageConfig};
use fusion::FusionController;
use recorder::RecordingController;
use sensors::SensorsController;

/// Multi-sensor telemetry logger for dataset-generation drives.
#[derive(Debug, Parser)]
#[command(name = "sensor-logger", version, about)]
struct Args {
    /// Path to sensors.yaml
    #[arg(long, default_value = "config/sensors.yaml")]
    sensors: PathBuf,

    /// Path to storage.yaml
    #[arg(long, default_value = "config/storage.yaml")]
    storage: PathBuf,

    /// Optional log file path (stdout is always included)
    #[arg(long)]
    log: Option<PathBuf>,

    /// Fusion alignment interval in milliseconds (~30 Hz)
    #[arg(long = "align-ms", default_value_t = 33)]
    align_ms: i64,
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(std::sync::Arc::new(file)))
                .init();
        }
        None => registry.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    info!(
        "sensor-logger v{} starting  (pid={})",
        env!("CARGO_PKG_VERSION"),
        std::process::id()
    );

    let sensors_cfg = SensorsConfig::load(&args.sensors)?;
    let mut storage_cfg = StorageConfig::load(&args.storage)?;
    if storage_cfg.storage.base_dir.is_relative() {
        storage_cfg.storage.base_dir = std::env::current_dir()
            .context("resolve current dir")?
            .join(&storage_cfg.storage.base_dir);
    }

    let token = CancellationToken::new();

    // Optional fixed recording duration.
    let duration = sensors_cfg.simulation.duration_seconds;
    if duration > 0 {
        info!("recording will auto-stop after {duration}s");
        let deadline_token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(duration)).await;
            deadline_token.cancel();
        });
    }

    // Pipeline assembly:
    //
    //   sensor readers ──► bounded channels ──► fusion ──► fused channel ──► recorder
    //                                                                        │      │
    //                                                                   fused.csv   per-sensor CSVs + frames

    let mut sensor_ctrl = SensorsController::new(&sensors_cfg);
    sensor_ctrl.start(&token);

    let mut fusion_ctrl = FusionController::new(args.align_ms);
    fusion_ctrl.start(&token, sensor_ctrl.streams());

    let mut record_ctrl = RecordingController::new(&storage_cfg, &sensors_cfg)?;
    let fused_rx = fusion_ctrl
        .take_output()
        .context("fused stream already taken")?;
    record_ctrl.start(&token, fused_rx);

    info!("pipeline running, press Ctrl+C to stop");

    let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    let stats_period = Duration::from_secs(5);
    let mut stats = tokio::time::interval_at(tokio::time::Instant::now() + stats_period, stats_period);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT, shutting down");
                token.cancel();
                break;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                token.cancel();
                break;
            }
            _ = token.cancelled() => break,
            _ = stats.tick() => {
                info!("── stats ─────────────────────────");
                sensor_ctrl.log_stats();
                info!("  fused rows written: {}", record_ctrl.rows_written());
            }
        }
    }

    // Let in-flight records reach the recorder before teardown.
    info!("draining pipeline");
    tokio::time::sleep(Duration::from_millis(500)).await;

    record_ctrl.stop().await;

    info!("session saved to {}", record_ctrl.session_dir().display());
    info!("total fused rows: {}", record_ctrl.rows_written());
    Ok(())
}
