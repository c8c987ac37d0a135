//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::capture::{FrameGeometry, Window};
use crate::error::{ProbeError, Result};
use crate::pipeline::TakeRequest;
use crate::spectrum::packetizer::{packet_count, Pacing};
use crate::mavlink::protocol::{CAMERA_ID_SPECTRUM, ENCAPSULATED_DATA_LEN};

/// Widest 8-bit column window whose row sum still fits in 16 bits
pub const MAX_SUM_BYTES: usize = 257;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub serial: SerialConfig,
    pub mavlink: MavlinkConfig,
    pub camera: CameraConfig,
    pub pacing: PacingConfig,
    pub spectrum: SpectrumConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Downlink serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Secondary port that mirrors every frame (CCU test mode)
    #[serde(default)]
    pub debug_port: Option<String>,
}

/// MAVLink addressing
#[derive(Debug, Deserialize, Clone)]
pub struct MavlinkConfig {
    #[serde(default = "default_system_id")]
    pub system_id: u8,

    #[serde(default = "default_component_id")]
    pub component_id: u8,

    #[serde(default = "default_camera_id")]
    pub camera_id: u8,
}

/// Sensor geometry and simulated frame rate
#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default = "default_width")]
    pub width: u16,

    #[serde(default = "default_height")]
    pub height: u16,

    #[serde(default = "default_bytes_per_pixel")]
    pub bytes_per_pixel: u8,

    #[serde(default = "default_frame_period_ms")]
    pub frame_period_ms: u64,
}

/// Pause after every data message
#[derive(Debug, Deserialize, Clone)]
pub struct PacingConfig {
    #[serde(default = "default_photo_packet_delay_ms")]
    pub photo_packet_delay_ms: u64,

    #[serde(default = "default_spectrum_packet_delay_ms")]
    pub spectrum_packet_delay_ms: u64,
}

/// Periodic take parameters
#[derive(Debug, Deserialize, Clone)]
pub struct SpectrumConfig {
    #[serde(default)]
    pub send_photo: bool,

    #[serde(default = "default_y_start")]
    pub y_start: u16,

    #[serde(default = "default_y_end")]
    pub y_end: u16,

    #[serde(default = "default_x_start")]
    pub x_start: u16,

    #[serde(default = "default_x_end")]
    pub x_end: u16,

    #[serde(default = "default_take_interval_ms")]
    pub take_interval_ms: u64,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily rolling log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyS1".to_string() }
fn default_baud_rate() -> u32 { crate::serial::DEFAULT_BAUD_RATE }

fn default_system_id() -> u8 { 0 }
fn default_component_id() -> u8 { 100 }
fn default_camera_id() -> u8 { CAMERA_ID_SPECTRUM }

fn default_width() -> u16 { 376 }
fn default_height() -> u16 { 240 }
fn default_bytes_per_pixel() -> u8 { 1 }
fn default_frame_period_ms() -> u64 { 40 }

fn default_photo_packet_delay_ms() -> u64 { 70 }
fn default_spectrum_packet_delay_ms() -> u64 { 100 }

fn default_y_start() -> u16 { 0 }
fn default_y_end() -> u16 { 240 }
fn default_x_start() -> u16 { 168 }
fn default_x_end() -> u16 { 208 }
fn default_take_interval_ms() -> u64 { 5000 }

fn invalid(message: impl std::fmt::Display) -> ProbeError {
    ProbeError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ccu_spectrum::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry {
            width: self.camera.width,
            height: self.camera.height,
            bytes_per_pixel: self.camera.bytes_per_pixel,
        }
    }

    pub fn window(&self) -> Window {
        Window {
            y_start: self.spectrum.y_start,
            y_end: self.spectrum.y_end,
            x_start: self.spectrum.x_start,
            x_end: self.spectrum.x_end,
        }
    }

    pub fn take_request(&self) -> TakeRequest {
        TakeRequest {
            send_photo: self.spectrum.send_photo,
            window: self.window(),
        }
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            photo_packet_delay: Duration::from_millis(self.pacing.photo_packet_delay_ms),
            spectrum_packet_delay: Duration::from_millis(self.pacing.spectrum_packet_delay_ms),
        }
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.camera.frame_period_ms)
    }

    pub fn take_interval(&self) -> Duration {
        Duration::from_millis(self.spectrum.take_interval_ms)
    }

    /// Validate configuration values
    ///
    /// # Returns
    ///
    /// * `Result<()>` - Ok if valid, Err if invalid
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if matches!(&self.serial.debug_port, Some(port) if port.is_empty()) {
            return Err(invalid("debug_port cannot be empty when set"));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        // Validate geometry
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(invalid("camera width and height must be greater than 0"));
        }

        if self.camera.bytes_per_pixel == 0 || self.camera.bytes_per_pixel > 4 {
            return Err(invalid("bytes_per_pixel must be between 1 and 4"));
        }

        if self.camera.frame_period_ms == 0 || self.camera.frame_period_ms > 10000 {
            return Err(invalid("frame_period_ms must be between 1 and 10000"));
        }

        let size = self.geometry().size_bytes();
        if u32::try_from(size).is_err() {
            return Err(invalid(format!("frame size {} does not fit a 32-bit size field", size)));
        }

        if u16::try_from(packet_count(size, ENCAPSULATED_DATA_LEN)).is_err() {
            return Err(invalid(format!("frame size {} needs more than 65535 photo packets", size)));
        }

        // Validate window
        let window = self.window();
        self.geometry()
            .check_window(&window)
            .map_err(|e| invalid(e.to_string()))?;

        let sum_bytes = window.columns() * self.camera.bytes_per_pixel as usize;
        if sum_bytes > MAX_SUM_BYTES {
            return Err(invalid(format!(
                "column window of {} bytes may overflow a 16-bit row sum (max {})",
                sum_bytes, MAX_SUM_BYTES
            )));
        }

        if self.spectrum.take_interval_ms == 0 {
            return Err(invalid("take_interval_ms must be greater than 0"));
        }

        // Validate pacing
        for (name, value) in [
            ("photo_packet_delay_ms", self.pacing.photo_packet_delay_ms),
            ("spectrum_packet_delay_ms", self.pacing.spectrum_packet_delay_ms),
        ] {
            if value > 10000 {
                return Err(invalid(format!("{} must be between 0 and 10000", name)));
            }
        }

        if matches!(&self.logging.log_dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("log_dir cannot be empty when set"));
        }

        Ok(())
    }
}
