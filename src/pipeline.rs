//! # Take Pipeline
//!
//! Couples the capture controller to the downlink: one `take` discards
//! whatever frame is pending, waits for a fresh one and transmits it.

use tokio::time::Instant;
use tracing::{debug, info};

use crate::capture::{CaptureController, Window};
use crate::error::{ProbeError, Result};
use crate::gateway::TransmitGateway;
use crate::spectrum::packetizer::{send_photo, send_spectrum, Pacing, StreamInfo};

/// Parameters of one acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakeRequest {
    /// Also transmit the raw frame before the spectrum
    pub send_photo: bool,
    pub window: Window,
}

/// What a completed take transmitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakeReport {
    pub time_boot_ms: u32,
    pub photo_packets: Option<u16>,
    pub spectrum_packets: u16,
}

/// Camera context: capture state, downlink and the boot clock
#[derive(Debug)]
pub struct SpectrumCamera<G> {
    capture: CaptureController,
    gateway: G,
    camera_id: u8,
    pacing: Pacing,
    boot: Instant,
}

impl<G: TransmitGateway> SpectrumCamera<G> {
    pub fn new(capture: CaptureController, gateway: G, camera_id: u8, pacing: Pacing) -> Self {
        Self {
            capture,
            gateway,
            camera_id,
            pacing,
            boot: Instant::now(),
        }
    }

    /// Start continuous acquisition; see [`CaptureController::init_capture`]
    pub fn init(&mut self) -> Result<()> {
        self.capture.init_capture()
    }

    /// Milliseconds since this context was created, wrapping at `u32::MAX`
    pub fn time_boot_ms(&self) -> u32 {
        self.boot.elapsed().as_millis() as u32
    }

    /// Capture a fresh frame and transmit it
    ///
    /// Restarting waits for the in-flight frame and resets the counter, so
    /// the following wait only returns for a frame captured after the
    /// restart. Once started the take cannot be cancelled; it blocks forever
    /// if the peripheral stops delivering frames.
    ///
    /// # Errors
    ///
    /// Returns error if the window is invalid, capture is not initialized or
    /// the gateway fails. A window error is reported before any frame is
    /// discarded.
    pub async fn take(&mut self, request: &TakeRequest) -> Result<TakeReport> {
        self.capture.geometry().check_window(&request.window)?;

        self.capture.restart_capture().await?;
        self.capture.wait_for_frame().await?;

        let time_boot_ms = self.time_boot_ms();
        debug!("Frame ready at {} ms", time_boot_ms);

        let frame = self
            .capture
            .frame()
            .ok_or_else(|| ProbeError::Hardware("completed frame not readable".to_string()))?;

        let photo_packets = if request.send_photo {
            let info = StreamInfo {
                camera_id: self.camera_id,
                y_crop_offset: request.window.y_start,
                time_boot_ms,
            };
            Some(send_photo(&mut self.gateway, &frame, &info, self.pacing.photo_packet_delay).await?)
        } else {
            None
        };

        let spectrum_packets = send_spectrum(
            &mut self.gateway,
            &frame,
            &request.window,
            time_boot_ms,
            self.pacing.spectrum_packet_delay,
        )
        .await?;

        info!(
            "Take complete: photo packets {:?}, spectrum packets {}",
            photo_packets, spectrum_packets
        );

        Ok(TakeReport {
            time_boot_ms,
            photo_packets,
            spectrum_packets,
        })
    }

    pub fn capture(&self) -> &CaptureController {
        &self.capture
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}
