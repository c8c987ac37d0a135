//! # Serial Communication Module
//!
//! Handles the serial links that carry MAVLink frames to the downlink radio
//! and, in test mode, to a bench debug port.
//!
//! This module handles:
//! - Opening a serial device with 8N1, no flow control
//! - Async write/flush through the [`SerialPortIO`] seam

pub mod port_trait;

use async_trait::async_trait;
use std::io;
use tokio_serial::SerialPortBuilderExt;
use tracing::info;

use crate::error::{ProbeError, Result};
pub use port_trait::SerialPortIO;

/// Default telemetry link baud rate
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Serial link to a radio modem or debug adapter
pub struct SerialLink {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SerialLink {
    /// Open a specific device
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Serial`] if the device cannot be opened.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = Self::open_port(path, baud_rate)?;
        info!("Opened serial link at {} ({} baud)", path, baud_rate);
        Ok(Self {
            port,
            device_path: path.to_string(),
        })
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| ProbeError::Serial(format!("Failed to open {}: {}", path, e)))
    }

    /// Path of the opened device
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl SerialPortIO for SerialLink {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.flush().await
    }
}
