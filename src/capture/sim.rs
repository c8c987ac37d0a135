//! # Simulated Sensor
//!
//! Host stand-in for the camera interface and its DMA stream. A worker thread
//! renders a synthetic spectral frame every frame period and delivers it
//! through the armed [`DmaChannel`], like the transfer-complete interrupt does
//! on the board.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, trace};

use super::{CaptureHardware, DmaChannel, FrameGeometry};
use crate::error::{ProbeError, Result};

/// Columns (as a fraction of the width) of the synthetic emission lines
const EMISSION_LINES: [(u16, u16); 3] = [(1, 5), (1, 2), (4, 5)];

/// Background level of the synthetic frame
const BACKGROUND_LEVEL: u8 = 12;

struct SimState {
    armed: Mutex<Option<DmaChannel>>,
    running: AtomicBool,
    frames_delivered: AtomicU32,
}

/// Synthetic camera that produces one frame per period while armed
pub struct SimulatedSensor {
    geometry: FrameGeometry,
    frame_period: Duration,
    state: Arc<SimState>,
}

impl std::fmt::Debug for SimulatedSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedSensor")
            .field("geometry", &self.geometry)
            .field("frame_period", &self.frame_period)
            .finish_non_exhaustive()
    }
}

impl SimulatedSensor {
    pub fn new(geometry: FrameGeometry, frame_period: Duration) -> Self {
        Self {
            geometry,
            frame_period,
            state: Arc::new(SimState {
                armed: Mutex::new(None),
                running: AtomicBool::new(false),
                frames_delivered: AtomicU32::new(0),
            }),
        }
    }

    /// Reader for the number of frames written through the DMA channel,
    /// usable after the sensor is handed to the controller
    pub fn delivery_counter(&self) -> impl Fn() -> u32 + Send + Sync + 'static {
        let state = self.state.clone();
        move || state.frames_delivered.load(Ordering::Acquire)
    }

    fn worker(state: Arc<SimState>, geometry: FrameGeometry, period: Duration) {
        let mut frame_index: u32 = 0;

        while state.running.load(Ordering::Acquire) {
            thread::sleep(period);

            let channel = state
                .armed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();

            if let Some(channel) = channel {
                // Counted before the completion upcall so readers woken by it see the count
                let delivered = channel.transfer_frame(|buf| {
                    render_frame(buf, geometry, frame_index);
                    state.frames_delivered.fetch_add(1, Ordering::AcqRel);
                });
                if delivered {
                    trace!("Simulated frame {} delivered", frame_index);
                    frame_index = frame_index.wrapping_add(1);
                }
            }
        }

        debug!("Simulated sensor worker stopped");
    }
}

impl CaptureHardware for SimulatedSensor {
    fn configure(&mut self) -> Result<()> {
        if self.state.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let state = self.state.clone();
        let geometry = self.geometry;
        let period = self.frame_period;
        thread::Builder::new()
            .name("sim-sensor".to_string())
            .spawn(move || Self::worker(state, geometry, period))
            .map_err(|e| ProbeError::Hardware(format!("Failed to start sensor worker: {}", e)))?;

        info!(
            "Simulated sensor started: {}x{} @ {} ms/frame",
            self.geometry.width,
            self.geometry.height,
            self.frame_period.as_millis()
        );
        Ok(())
    }

    fn arm(&mut self, channel: DmaChannel) -> Result<()> {
        *self.state.armed.lock().unwrap_or_else(PoisonError::into_inner) = Some(channel);
        Ok(())
    }

    fn disarm(&mut self) {
        *self.state.armed.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Drop for SimulatedSensor {
    fn drop(&mut self) {
        // The worker may be the thread running this drop, so it is not joined
        self.state.running.store(false, Ordering::Release);
    }
}

/// Render a synthetic spectrum: dim background with bright vertical lines
/// whose intensity varies with row and frame index
pub fn render_frame(buf: &mut [u8], geometry: FrameGeometry, frame_index: u32) {
    let stride = geometry.row_stride();
    let bpp = geometry.bytes_per_pixel.max(1) as usize;

    for (y, row) in buf.chunks_mut(stride).enumerate() {
        for (x, pixel) in row.chunks_mut(bpp).enumerate() {
            let mut level = BACKGROUND_LEVEL as u32 + ((x + y) % 4) as u32;

            for (i, &(num, den)) in EMISSION_LINES.iter().enumerate() {
                let center = geometry.width as usize * num as usize / den as usize;
                if x.abs_diff(center) <= 1 {
                    let swing = (y as u32 + frame_index * (i as u32 + 1)) % 64;
                    level += 120 + swing;
                }
            }

            pixel.fill(level.min(u8::MAX as u32) as u8);
        }
    }
}
