//! Trait abstraction for the capture peripheral (camera interface + DMA stream)

use super::DmaChannel;
use crate::error::Result;

/// Capture-and-transfer peripheral driven by the [`CaptureController`](super::CaptureController)
///
/// Implementations own clocking, pin setup and sensor register programming.
/// While armed, the peripheral writes one frame through the [`DmaChannel`] it
/// was handed and raises the completion upcall from its own context.
#[cfg_attr(test, mockall::automock)]
pub trait CaptureHardware: Send {
    /// Bring up clocks, pins and the sensor context
    fn configure(&mut self) -> Result<()>;

    /// Enable the transfer engine and its completion interrupt
    ///
    /// The completion upcall must not be raised from inside this call.
    fn arm(&mut self, channel: DmaChannel) -> Result<()>;

    /// Stop the transfer engine; called from the completion handler
    fn disarm(&mut self);
}
