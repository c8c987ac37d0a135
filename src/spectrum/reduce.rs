//! # Row Reduction
//!
//! Collapses a window of the frame into one intensity value per row.

use crate::capture::{FrameBuffer, Window};
use crate::error::Result;

/// Lazy per-row intensity sums over a window
///
/// Sums are 16-bit and wrap on overflow; configuration limits the window
/// width so that 8-bit pixels cannot overflow.
#[derive(Debug, Clone)]
pub struct RowProfile<'a> {
    frame: &'a FrameBuffer,
    row: u16,
    row_end: u16,
    byte_start: usize,
    byte_end: usize,
}

impl Iterator for RowProfile<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.row >= self.row_end {
            return None;
        }

        let sum = self.frame.row(self.row)[self.byte_start..self.byte_end]
            .iter()
            .fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
        self.row += 1;

        Some(sum)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.row_end.saturating_sub(self.row) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RowProfile<'_> {}

/// Sum pixel bytes of columns `[x_start, x_end)` for every row in `[y_start, y_end)`
///
/// # Errors
///
/// Returns [`ProbeError::Window`](crate::error::ProbeError::Window) if the
/// window is empty or leaves the frame.
///
/// # Examples
///
/// ```no_run
/// use ccu_spectrum::capture::{FrameBuffer, FrameGeometry, Window};
/// use ccu_spectrum::spectrum::reduce::reduce_rows;
///
/// let frame = FrameBuffer::new(FrameGeometry::default());
/// let window = Window { y_start: 0, y_end: 10, x_start: 100, x_end: 140 };
/// let profile: Vec<u16> = reduce_rows(&frame, &window)?.collect();
/// assert_eq!(profile.len(), 10);
/// # Ok::<(), ccu_spectrum::error::ProbeError>(())
/// ```
pub fn reduce_rows<'a>(frame: &'a FrameBuffer, window: &Window) -> Result<RowProfile<'a>> {
    let geometry = frame.geometry();
    geometry.check_window(window)?;

    let bpp = geometry.bytes_per_pixel as usize;
    Ok(RowProfile {
        frame,
        row: window.y_start,
        row_end: window.y_end,
        byte_start: window.x_start as usize * bpp,
        byte_end: window.x_end as usize * bpp,
    })
}
