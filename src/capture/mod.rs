//! # Capture Module
//!
//! Hands frames written by the DMA engine over to the telemetry pipeline.
//!
//! This module handles:
//! - Arming the capture peripheral for exactly one frame at a time
//! - The completion handler (frame counter increment + transfer disable)
//! - The discard-and-restart protocol used before every take
//! - Read access to the frame buffer only after a completed transfer
//!
//! ## Frame Handoff
//!
//! ```text
//!  CaptureController                     peripheral context
//!  ─────────────────                     ──────────────────
//!  init_capture()  ── arm ─────────────► DMA writes buffer
//!                                        transfer_frame():
//!                                          disarm hardware
//!                                          frames += 1, phase = Ready
//!  restart_capture() waits frames ≥ 1
//!    frames = 0, phase = Armed ── arm ─► DMA writes buffer ...
//!  wait_for_frame() waits frames ≥ 1
//!  frame() ─► FrameView (borrow ends before the next restart)
//! ```
//!
//! Waits never time out and cannot be cancelled. If the peripheral never
//! completes a transfer, `restart_capture` and `wait_for_frame` never return.

pub mod frame;
pub mod hardware;
pub mod sim;

use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{watch, MutexGuard};
use tracing::{debug, trace, warn};

use crate::error::{ProbeError, Result};
pub use frame::{FrameBuffer, FrameGeometry, Window};
pub use hardware::CaptureHardware;

/// State of the capture path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    /// Not yet initialized
    Idle,
    /// Transfer engine enabled; the buffer belongs to the hardware
    Armed,
    /// A frame completed and the engine is disabled; the buffer may be read
    Ready,
}

/// Completion counter together with the phase it was published with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSignal {
    pub frames: u32,
    pub phase: CapturePhase,
}

struct Shared {
    geometry: FrameGeometry,
    buffer: tokio::sync::Mutex<FrameBuffer>,
    hardware: Mutex<Box<dyn CaptureHardware>>,
    signal: watch::Sender<FrameSignal>,
}

impl Shared {
    /// Completion interrupt handler
    fn on_transfer_complete(&self) {
        // Disable first: a consumer that sees the new count must see the path stopped
        self.hardware
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .disarm();

        self.signal.send_modify(|signal| {
            signal.frames += 1;
            signal.phase = CapturePhase::Ready;
        });
    }
}

/// Handle given to the peripheral for writing frames into the buffer
///
/// Holds only a weak reference, so a peripheral keeping a channel does not
/// keep the controller alive.
#[derive(Clone)]
pub struct DmaChannel {
    shared: Weak<Shared>,
}

impl std::fmt::Debug for DmaChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DmaChannel")
            .field("connected", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl DmaChannel {
    /// Write one frame and raise the completion upcall
    ///
    /// `fill` receives the whole frame buffer. Nothing is written unless the
    /// path is armed.
    ///
    /// # Returns
    ///
    /// * `bool` - Whether a frame was transferred
    pub fn transfer_frame<F>(&self, fill: F) -> bool
    where
        F: FnOnce(&mut [u8]),
    {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };

        if shared.signal.borrow().phase != CapturePhase::Armed {
            trace!("Transfer dropped, capture path not armed");
            return false;
        }

        match shared.buffer.try_lock() {
            Ok(mut buffer) => fill(buffer.as_mut_slice()),
            Err(_) => {
                warn!("Frame buffer busy while armed, dropping transfer");
                return false;
            }
        }

        shared.on_transfer_complete();
        true
    }
}

/// Read access to a completed frame
///
/// Borrowing the controller mutably, a view cannot outlive the next
/// [`CaptureController::restart_capture`] call.
pub struct FrameView<'a> {
    buffer: MutexGuard<'a, FrameBuffer>,
}

impl Deref for FrameView<'_> {
    type Target = FrameBuffer;

    fn deref(&self) -> &FrameBuffer {
        &self.buffer
    }
}

/// Owns the frame buffer, the completion counter and the capture peripheral
pub struct CaptureController {
    shared: Arc<Shared>,
    signal: watch::Receiver<FrameSignal>,
}

impl std::fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureController")
            .field("signal", &*self.signal.borrow())
            .finish_non_exhaustive()
    }
}

impl CaptureController {
    /// Allocate the frame buffer and take ownership of the peripheral
    pub fn new(hardware: Box<dyn CaptureHardware>, geometry: FrameGeometry) -> Self {
        let (sender, signal) = watch::channel(FrameSignal {
            frames: 0,
            phase: CapturePhase::Idle,
        });

        let shared = Arc::new(Shared {
            geometry,
            buffer: tokio::sync::Mutex::new(FrameBuffer::new(geometry)),
            hardware: Mutex::new(hardware),
            signal: sender,
        });

        Self { shared, signal }
    }

    /// Configure the peripheral and arm continuous acquisition
    ///
    /// Configuration failures are logged and otherwise ignored; retries belong
    /// to the supervising board.
    ///
    /// # Errors
    ///
    /// Returns error if capture was already initialized.
    pub fn init_capture(&mut self) -> Result<()> {
        if self.phase() != CapturePhase::Idle {
            return Err(ProbeError::Hardware(
                "capture already initialized".to_string(),
            ));
        }

        let mut hardware = self.lock_hardware();
        if let Err(e) = hardware.configure() {
            warn!("Capture hardware configuration reported: {}", e);
        }

        self.shared.signal.send_modify(|signal| {
            signal.frames = 0;
            signal.phase = CapturePhase::Armed;
        });

        if let Err(e) = hardware.arm(self.dma_channel()) {
            warn!("Capture hardware arm reported: {}", e);
        }

        debug!("Capture initialized and armed");
        Ok(())
    }

    /// Discard the current frame and arm for a fresh one
    ///
    /// Waits until at least one frame has completed since the last reset,
    /// then resets the counter to zero and re-arms. The buffer must not be read
    /// again until the next completion.
    ///
    /// # Errors
    ///
    /// Returns error if capture was never initialized.
    pub async fn restart_capture(&mut self) -> Result<()> {
        if self.phase() == CapturePhase::Idle {
            return Err(ProbeError::Hardware("capture not initialized".to_string()));
        }

        self.wait_for_frame().await?;

        let mut hardware = self.lock_hardware();
        self.shared.signal.send_modify(|signal| {
            signal.frames = 0;
            signal.phase = CapturePhase::Armed;
        });

        if let Err(e) = hardware.arm(self.dma_channel()) {
            warn!("Capture hardware arm reported: {}", e);
        }

        trace!("Capture restarted");
        Ok(())
    }

    /// Block until at least one frame completed since the last reset
    ///
    /// No timeout: this never returns if the peripheral stalls.
    pub async fn wait_for_frame(&mut self) -> Result<()> {
        self.signal
            .wait_for(|signal| signal.frames >= 1)
            .await
            .map(|_| ())
            .map_err(|_| ProbeError::Hardware("completion signal closed".to_string()))
    }

    /// [`wait_for_frame`](Self::wait_for_frame) with an upper bound, for test harnesses
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Timeout`] if no frame completed in time.
    pub async fn wait_for_frame_timeout(&mut self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.wait_for_frame())
            .await
            .map_err(|_| ProbeError::Timeout(timeout.as_millis() as u64))?
    }

    /// Frames completed since the last reset
    pub fn frame_counter(&self) -> u32 {
        self.signal.borrow().frames
    }

    pub fn phase(&self) -> CapturePhase {
        self.signal.borrow().phase
    }

    /// Borrow the completed frame
    ///
    /// Returns `None` unless a transfer has completed since the last arm.
    pub fn frame(&mut self) -> Option<FrameView<'_>> {
        if self.phase() != CapturePhase::Ready {
            return None;
        }

        // Ready means the engine is disabled, so nothing else holds the buffer
        let buffer = self.shared.buffer.try_lock().ok()?;
        Some(FrameView { buffer })
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.shared.geometry
    }

    /// Channel through which the peripheral delivers frames
    pub fn dma_channel(&self) -> DmaChannel {
        DmaChannel {
            shared: Arc::downgrade(&self.shared),
        }
    }

    fn lock_hardware(&self) -> std::sync::MutexGuard<'_, Box<dyn CaptureHardware>> {
        self.shared
            .hardware
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
