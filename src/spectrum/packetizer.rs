//! # Packetizer
//!
//! Splits the raw frame or a row profile into sequence-numbered telemetry
//! messages, each stream preceded by its header(s), with a fixed pause after
//! every data message to stay under the downlink's throughput.

use std::ops::Range;
use std::time::Duration;

use tracing::{debug, info};

use super::reduce::reduce_rows;
use crate::capture::{FrameBuffer, Window};
use crate::error::{ProbeError, Result};
use crate::gateway::TransmitGateway;
use crate::mavlink::protocol::*;

/// Pause after each raw image data message
pub const PHOTO_PACKET_DELAY: Duration = Duration::from_millis(70);

/// Pause after each spectrum data message
pub const SPECTRUM_PACKET_DELAY: Duration = Duration::from_millis(100);

/// Inter-message pacing for both streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub photo_packet_delay: Duration,
    pub spectrum_packet_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            photo_packet_delay: PHOTO_PACKET_DELAY,
            spectrum_packet_delay: SPECTRUM_PACKET_DELAY,
        }
    }
}

/// Header fields shared by a take's messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub camera_id: u8,
    pub y_crop_offset: u16,
    pub time_boot_ms: u32,
}

/// Number of packets needed for `len` items at `per_packet` items each
pub fn packet_count(len: usize, per_packet: usize) -> usize {
    len.div_ceil(per_packet)
}

/// Byte ranges of each packet when splitting `len` bytes into `payload_max` chunks
///
/// All ranges but the last are `payload_max` long; the last holds the rest.
///
/// # Panics
///
/// Panics if `payload_max` is zero.
pub fn fragment_ranges(len: usize, payload_max: usize) -> impl Iterator<Item = Range<usize>> {
    assert!(payload_max > 0, "payload_max must be non-zero");
    (0..len)
        .step_by(payload_max)
        .map(move |start| start..(start + payload_max).min(len))
}

/// One image data message and how many of its payload bytes carry image data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoFragment {
    pub packet: EncapsulatedData,
    pub len: usize,
}

/// ENCAPSULATED_DATA messages for an image, unused tail bytes zeroed
pub fn photo_fragments(image: &[u8]) -> impl Iterator<Item = PhotoFragment> + '_ {
    fragment_ranges(image.len(), ENCAPSULATED_DATA_LEN)
        .enumerate()
        .map(move |(index, range)| {
            let chunk = &image[range];
            let mut data = [0u8; ENCAPSULATED_DATA_LEN];
            data[..chunk.len()].copy_from_slice(chunk);
            PhotoFragment {
                packet: EncapsulatedData {
                    seqnr: index as u16,
                    data,
                },
                len: chunk.len(),
            }
        })
}

/// Row sums for up to `K` rows tagged with a packet sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBatch<const K: usize> {
    pub seqnr: u16,
    pub sums: [u16; K],
    /// Slots holding rows of this take; the rest are zero
    pub rows: usize,
}

impl From<RowBatch<SPECTRUM_ROWS_PER_PACKET>> for SpectrumData {
    fn from(batch: RowBatch<SPECTRUM_ROWS_PER_PACKET>) -> Self {
        SpectrumData {
            seqnr: batch.seqnr,
            data: batch.sums,
        }
    }
}

/// Groups a row profile into packets of `K` slots
///
/// Row `r` (relative to the window) goes to slot `r % K`. A packet is emitted
/// once slot `K - 1` is written or when the last row arrives, so `R` rows give
/// exactly `ceil(R / K)` packets.
pub struct RowBatches<I: Iterator, const K: usize> {
    rows: std::iter::Peekable<I>,
    relative_row: usize,
    seqnr: u16,
    slots: [u16; K],
}

impl<I: Iterator<Item = u16>, const K: usize> RowBatches<I, K> {
    // Keeps relative row 0 from ever completing a packet on its own
    const AT_LEAST_TWO_SLOTS: () = assert!(K >= 2, "packets need at least two row slots");

    pub fn new(rows: I) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::AT_LEAST_TWO_SLOTS;

        Self {
            rows: rows.peekable(),
            relative_row: 0,
            seqnr: 0,
            slots: [0; K],
        }
    }
}

impl<I: Iterator<Item = u16>, const K: usize> Iterator for RowBatches<I, K> {
    type Item = RowBatch<K>;

    fn next(&mut self) -> Option<RowBatch<K>> {
        while let Some(sum) = self.rows.next() {
            let relative_row = self.relative_row;
            self.relative_row += 1;
            self.slots[relative_row % K] = sum;

            let full = (relative_row + 1) % K == 0;
            let last = self.rows.peek().is_none();
            if full || last {
                let batch = RowBatch {
                    seqnr: self.seqnr,
                    sums: std::mem::replace(&mut self.slots, [0; K]),
                    rows: relative_row % K + 1,
                };
                self.seqnr = self.seqnr.wrapping_add(1);
                return Some(batch);
            }
        }

        None
    }
}

/// Transmit the whole frame as a raw 8-bit image
///
/// Sends DATA_TRANSMISSION_HANDSHAKE and the picture header, then one
/// ENCAPSULATED_DATA per [`ENCAPSULATED_DATA_LEN`] bytes, pausing after each.
///
/// # Returns
///
/// * `Result<u16>` - Number of data messages sent
///
/// # Errors
///
/// Returns error if the frame does not fit the header fields or a send fails.
pub async fn send_photo<G>(
    gateway: &mut G,
    frame: &FrameBuffer,
    info: &StreamInfo,
    delay: Duration,
) -> Result<u16>
where
    G: TransmitGateway + ?Sized,
{
    let geometry = frame.geometry();
    let size = u32::try_from(frame.len())
        .map_err(|_| ProbeError::Window(format!("frame of {} bytes too large", frame.len())))?;
    let packets = u16::try_from(packet_count(frame.len(), ENCAPSULATED_DATA_LEN))
        .map_err(|_| ProbeError::Window(format!("frame of {} bytes needs too many packets", size)))?;

    info!("Sending photo: {} bytes in {} packets", size, packets);

    gateway
        .send(&Message::Handshake(DataTransmissionHandshake {
            stream_type: DataStreamType::ImgRaw8U,
            size,
            width: geometry.width,
            height: geometry.height,
            packets,
            payload: ENCAPSULATED_DATA_LEN as u8,
            jpg_quality: RAW_IMAGE_QUALITY,
        }))
        .await?;

    gateway
        .send(&Message::PictureHeader(PictureHeader {
            camera_id: info.camera_id,
            size,
            packets,
            y_crop_offset: info.y_crop_offset,
            time_boot_ms: info.time_boot_ms,
        }))
        .await?;

    let mut sent: u16 = 0;
    for fragment in photo_fragments(frame.as_slice()) {
        gateway
            .send(&Message::EncapsulatedData(fragment.packet))
            .await?;
        tokio::time::sleep(delay).await;
        sent += 1;
    }

    debug_assert_eq!(sent, packets);
    debug!("Photo sent: {} packets", sent);
    Ok(sent)
}

/// Transmit the row profile of `window`
///
/// Sends the spectrum header, then one data message per
/// [`SPECTRUM_ROWS_PER_PACKET`] rows (the last one possibly partial), pausing
/// after each.
///
/// # Returns
///
/// * `Result<u16>` - Number of data messages sent
///
/// # Errors
///
/// Returns error if the window is invalid or a send fails.
pub async fn send_spectrum<G>(
    gateway: &mut G,
    frame: &FrameBuffer,
    window: &Window,
    time_boot_ms: u32,
    delay: Duration,
) -> Result<u16>
where
    G: TransmitGateway + ?Sized,
{
    let profile = reduce_rows(frame, window)?;
    let rows = profile.len();
    let packets = packet_count(rows, SPECTRUM_ROWS_PER_PACKET);

    let header = SpectrumHeader {
        size: u16::try_from(rows * 2)
            .map_err(|_| ProbeError::Window(format!("{} rows do not fit the header", rows)))?,
        packets: packets as u16,
        y_crop_offset: window.y_start,
        time_boot_ms,
    };

    info!(
        "Sending spectrum: rows {}..{}, columns {}..{} in {} packets",
        window.y_start, window.y_end, window.x_start, window.x_end, packets
    );
    gateway.send(&Message::SpectrumHeader(header)).await?;

    let mut sent: u16 = 0;
    for batch in RowBatches::<_, SPECTRUM_ROWS_PER_PACKET>::new(profile) {
        gateway.send(&Message::SpectrumData(batch.into())).await?;
        tokio::time::sleep(delay).await;
        sent += 1;
    }

    debug!("Spectrum sent: {} packets", sent);
    Ok(sent)
}
