//! # CCU Spectrum
//!
//! Periodically captures a spectrum frame and sends it down the telemetry link.

use anyhow::{Context, Result};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use ccu_spectrum::capture::sim::SimulatedSensor;
use ccu_spectrum::capture::CaptureController;
use ccu_spectrum::config::Config;
use ccu_spectrum::gateway::MavlinkGateway;
use ccu_spectrum::mavlink::encoder::MessageEncoder;
use ccu_spectrum::pipeline::SpectrumCamera;
use ccu_spectrum::serial::SerialLink;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Base name of the daily rolling log file
const LOG_FILE_PREFIX: &str = "ccu-spectrum.log";

/// Console logging plus an optional daily log file
///
/// The returned guard flushes the file writer and must live until exit.
fn init_logging(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Main entry point
///
/// # Control Flow
///
/// 1. Load configuration (first argument, or `config/default.toml`)
/// 2. Set up logging
/// 3. Open the downlink (and the debug mirror if configured)
/// 4. Start the sensor and arm capture
/// 5. Run a take every `take_interval_ms` until Ctrl+C
///
/// A take in progress always runs to completion; Ctrl+C is handled between
/// takes.
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(config.logging.log_dir.as_deref());

    info!("CCU Spectrum v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let link = SerialLink::open(&config.serial.port, config.serial.baud_rate)?;
    info!("Downlink opened at: {}", link.device_path());

    let encoder = MessageEncoder::new(config.mavlink.system_id, config.mavlink.component_id);
    let mut gateway = MavlinkGateway::new(encoder, Box::new(link));

    if let Some(debug_port) = &config.serial.debug_port {
        match SerialLink::open(debug_port, config.serial.baud_rate) {
            Ok(mirror) => {
                info!("Debug mirror opened at: {}", mirror.device_path());
                gateway = gateway.with_mirror(Box::new(mirror));
            }
            Err(e) => warn!("Debug mirror unavailable, continuing without it: {}", e),
        }
    }

    let geometry = config.geometry();
    let sensor = SimulatedSensor::new(geometry, config.frame_period());
    let capture = CaptureController::new(Box::new(sensor), geometry);

    let mut camera = SpectrumCamera::new(capture, gateway, config.mavlink.camera_id, config.pacing());
    camera.init()?;

    let request = config.take_request();
    let mut takes = interval(config.take_interval());
    takes.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Taking a spectrum every {} ms (photo: {})",
        config.spectrum.take_interval_ms, request.send_photo
    );
    info!("Press Ctrl+C to exit");

    let mut completed: u64 = 0;

    loop {
        tokio::select! {
            _ = takes.tick() => {
                match camera.take(&request).await {
                    Ok(report) => {
                        completed += 1;
                        info!(
                            "Take {} sent at {} ms ({} spectrum packets)",
                            completed, report.time_boot_ms, report.spectrum_packets
                        );
                    }
                    Err(e) => error!("Take failed: {}", e),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("Takes completed: {}, frames sent: {}", completed, camera.gateway().frames_sent());
                break;
            }
        }
    }

    Ok(())
}
