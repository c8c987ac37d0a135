//! # Transmit Gateway
//!
//! Pushes one telemetry message at a time onto the downlink. The gateway does
//! no rate limiting; callers pace their own transmissions.

use async_trait::async_trait;
use tracing::{trace, warn};

use crate::error::{ProbeError, Result};
use crate::mavlink::encoder::MessageEncoder;
use crate::mavlink::protocol::Message;
use crate::serial::SerialPortIO;

/// Sink for telemetry messages
#[async_trait]
pub trait TransmitGateway: Send {
    /// Encode and transmit one message
    async fn send(&mut self, message: &Message) -> Result<()>;
}

/// Gateway that frames messages as MAVLink v1 and writes them to a serial
/// link, optionally mirroring every frame to a debug port
pub struct MavlinkGateway {
    encoder: MessageEncoder,
    primary: Box<dyn SerialPortIO>,
    mirror: Option<Box<dyn SerialPortIO>>,
    frames_sent: u64,
}

impl std::fmt::Debug for MavlinkGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MavlinkGateway")
            .field("encoder", &self.encoder)
            .field("mirror", &self.mirror.is_some())
            .field("frames_sent", &self.frames_sent)
            .finish_non_exhaustive()
    }
}

impl MavlinkGateway {
    pub fn new(encoder: MessageEncoder, primary: Box<dyn SerialPortIO>) -> Self {
        Self {
            encoder,
            primary,
            mirror: None,
            frames_sent: 0,
        }
    }

    /// Duplicate every frame to a secondary diagnostic channel
    pub fn with_mirror(mut self, mirror: Box<dyn SerialPortIO>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Frames written to the primary link
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
}

#[async_trait]
impl TransmitGateway for MavlinkGateway {
    async fn send(&mut self, message: &Message) -> Result<()> {
        let frame = self.encoder.encode(message);

        self.primary
            .write_all(&frame)
            .await
            .map_err(|e| ProbeError::Serial(format!("Failed to write frame: {}", e)))?;
        self.primary
            .flush()
            .await
            .map_err(|e| ProbeError::Serial(format!("Failed to flush serial port: {}", e)))?;
        self.frames_sent += 1;

        // Debug channel is best effort
        if let Some(mirror) = self.mirror.as_mut() {
            let mirrored = match mirror.write_all(&frame).await {
                Ok(()) => mirror.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = mirrored {
                warn!("Debug mirror write failed: {}", e);
            }
        }

        trace!("Sent {} ({} bytes)", message.name(), frame.len());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::mavlink::decoder::{decode_frame, decode_message};
    use crate::mavlink::protocol::SpectrumHeader;
    use crate::serial::port_trait::mocks::MockSerialPort;
    use std::io;

    fn header() -> Message {
        Message::SpectrumHeader(SpectrumHeader {
            size: 40,
            packets: 1,
            y_crop_offset: 5,
            time_boot_ms: 77,
        })
    }

    #[test]
    fn test_send_writes_one_valid_frame() {
        let port = MockSerialPort::new();
        let mut gateway = MavlinkGateway::new(MessageEncoder::new(0, 3), Box::new(port.clone()));

        tokio_test::block_on(gateway.send(&header())).unwrap();

        let written = port.get_written_data();
        assert_eq!(written.len(), 1);
        let frame = decode_frame(&written[0]).unwrap();
        assert_eq!(frame.component_id, 3);
        assert_eq!(decode_message(&frame).unwrap(), header());
        assert_eq!(gateway.frames_sent(), 1);
    }

    #[tokio::test]
    async fn test_link_sequence_advances_per_frame() {
        let port = MockSerialPort::new();
        let mut gateway = MavlinkGateway::new(MessageEncoder::new(0, 3), Box::new(port.clone()));

        for _ in 0..3 {
            gateway.send(&header()).await.unwrap();
        }

        let sequences: Vec<u8> = port
            .get_written_data()
            .iter()
            .map(|bytes| decode_frame(bytes).unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_mirror_receives_identical_frames() {
        let primary = MockSerialPort::new();
        let debug = MockSerialPort::new();
        let mut gateway = MavlinkGateway::new(MessageEncoder::new(0, 3), Box::new(primary.clone()))
            .with_mirror(Box::new(debug.clone()));

        gateway.send(&header()).await.unwrap();
        gateway.send(&header()).await.unwrap();

        assert_eq!(primary.get_written_data(), debug.get_written_data());
    }

    #[tokio::test]
    async fn test_primary_write_error_is_reported() {
        let port = MockSerialPort::new();
        port.set_write_error(io::ErrorKind::BrokenPipe);
        let mut gateway = MavlinkGateway::new(MessageEncoder::new(0, 3), Box::new(port));

        let result = gateway.send(&header()).await;

        assert!(matches!(result, Err(ProbeError::Serial(_))));
        assert_eq!(gateway.frames_sent(), 0);
    }

    #[tokio::test]
    async fn test_primary_flush_error_is_reported() {
        let port = MockSerialPort::new();
        port.set_flush_error(io::ErrorKind::TimedOut);
        let mut gateway = MavlinkGateway::new(MessageEncoder::new(0, 3), Box::new(port));

        assert!(gateway.send(&header()).await.is_err());
    }

    #[tokio::test]
    async fn test_mirror_failure_does_not_fail_send() {
        let primary = MockSerialPort::new();
        let debug = MockSerialPort::new();
        debug.set_write_error(io::ErrorKind::NotConnected);
        let mut gateway = MavlinkGateway::new(MessageEncoder::new(0, 3), Box::new(primary.clone()))
            .with_mirror(Box::new(debug));

        gateway.send(&header()).await.unwrap();

        assert_eq!(primary.get_written_data().len(), 1);
    }
}
