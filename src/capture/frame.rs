//! # Frame Buffer
//!
//! The single DMA destination for sensor frames and the geometry that
//! describes it.

use crate::error::{ProbeError, Result};

/// Most rows a window may span; the spectrum header carries `2 × rows` as u16
pub const MAX_WINDOW_ROWS: usize = u16::MAX as usize / 2;

/// Sensor frame dimensions
///
/// The defaults are the sensor's native 188 × 120 context scaled by the fixed
/// ×2 × ×2 readout multiplier, one byte per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u16,
    pub height: u16,
    pub bytes_per_pixel: u8,
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self {
            width: 376,
            height: 240,
            bytes_per_pixel: 1,
        }
    }
}

impl FrameGeometry {
    /// Total frame size in bytes
    pub fn size_bytes(&self) -> usize {
        self.row_stride() * self.height as usize
    }

    /// Bytes per image row
    pub fn row_stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel as usize
    }

    /// Check that a processing window lies inside the frame and is not empty
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Window`] describing the first violated bound.
    pub fn check_window(&self, window: &Window) -> Result<()> {
        if window.y_start >= window.y_end {
            return Err(ProbeError::Window(format!(
                "row range {}..{} is empty",
                window.y_start, window.y_end
            )));
        }
        if window.x_start >= window.x_end {
            return Err(ProbeError::Window(format!(
                "column range {}..{} is empty",
                window.x_start, window.x_end
            )));
        }
        if window.y_end > self.height {
            return Err(ProbeError::Window(format!(
                "row end {} exceeds frame height {}",
                window.y_end, self.height
            )));
        }
        if window.x_end > self.width {
            return Err(ProbeError::Window(format!(
                "column end {} exceeds frame width {}",
                window.x_end, self.width
            )));
        }
        if window.rows() > MAX_WINDOW_ROWS {
            return Err(ProbeError::Window(format!(
                "{} rows exceed the spectrum header limit of {}",
                window.rows(),
                MAX_WINDOW_ROWS
            )));
        }
        Ok(())
    }
}

/// Rectangular processing window, half-open on both axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub y_start: u16,
    pub y_end: u16,
    pub x_start: u16,
    pub x_end: u16,
}

impl Window {
    pub fn rows(&self) -> usize {
        self.y_end.saturating_sub(self.y_start) as usize
    }

    pub fn columns(&self) -> usize {
        self.x_end.saturating_sub(self.x_start) as usize
    }
}

/// Fixed-capacity frame storage, allocated once and never resized
pub struct FrameBuffer {
    geometry: FrameGeometry,
    data: Box<[u8]>,
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("geometry", &self.geometry)
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl FrameBuffer {
    /// Allocate a zeroed buffer for one frame
    pub fn new(geometry: FrameGeometry) -> Self {
        Self {
            geometry,
            data: vec![0u8; geometry.size_bytes()].into_boxed_slice(),
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes of image row `y`
    ///
    /// # Panics
    ///
    /// Panics if `y` is not below the frame height.
    pub fn row(&self, y: u16) -> &[u8] {
        let stride = self.geometry.row_stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }
}
