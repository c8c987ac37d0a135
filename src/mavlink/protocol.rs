//! # MAVLink Protocol Constants and Types
//!
//! Message definitions for the camera telemetry stream: the two common
//! image-transfer messages plus the probe's picture and spectrum messages.

use crate::error::{ProbeError, Result};

/// MAVLink v1 start-of-frame marker
pub const MAVLINK_STX_V1: u8 = 0xFE;

/// Header size: stx(1) + len(1) + seq(1) + sysid(1) + compid(1) + msgid(1)
pub const MAVLINK_HEADER_LEN: usize = 6;

/// Trailing checksum size
pub const MAVLINK_CHECKSUM_LEN: usize = 2;

/// Maximum MAVLink v1 payload size
pub const MAVLINK_MAX_PAYLOAD_LEN: usize = 255;

/// Payload bytes carried by one ENCAPSULATED_DATA message
pub const ENCAPSULATED_DATA_LEN: usize = 253;

/// Row sums carried by one spectrum data message
pub const SPECTRUM_ROWS_PER_PACKET: usize = 120;

// A fill flush can never land on relative row 0
const _: () = assert!(SPECTRUM_ROWS_PER_PACKET >= 2);
const _: () = assert!(2 + 2 * SPECTRUM_ROWS_PER_PACKET <= MAVLINK_MAX_PAYLOAD_LEN);

/// Quality hint sent with raw transfers (ignored by receivers)
pub const RAW_IMAGE_QUALITY: u8 = 100;

/// Camera identifier of the spectrum camera
pub const CAMERA_ID_SPECTRUM: u8 = 1;

pub const MSG_ID_DATA_TRANSMISSION_HANDSHAKE: u8 = 130;
pub const MSG_ID_ENCAPSULATED_DATA: u8 = 131;
pub const MSG_ID_PICTURE_HEADER: u8 = 150;
pub const MSG_ID_SPECTRUM_HEADER: u8 = 151;
pub const MSG_ID_SPECTRUM_DATA: u8 = 152;

pub const DATA_TRANSMISSION_HANDSHAKE_LEN: usize = 13;
pub const PICTURE_HEADER_LEN: usize = 13;
pub const SPECTRUM_HEADER_LEN: usize = 10;
pub const ENCAPSULATED_DATA_MSG_LEN: usize = 2 + ENCAPSULATED_DATA_LEN;
pub const SPECTRUM_DATA_MSG_LEN: usize = 2 + 2 * SPECTRUM_ROWS_PER_PACKET;

/// Look up the CRC extra seed for a message id
///
/// Returns `None` for ids outside the camera dialect.
pub fn crc_extra(message_id: u8) -> Option<u8> {
    match message_id {
        MSG_ID_DATA_TRANSMISSION_HANDSHAKE => Some(29),
        MSG_ID_ENCAPSULATED_DATA => Some(223),
        MSG_ID_PICTURE_HEADER => Some(189),
        MSG_ID_SPECTRUM_HEADER => Some(187),
        MSG_ID_SPECTRUM_DATA => Some(51),
        _ => None,
    }
}

/// Image stream type announced in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataStreamType {
    ImgJpeg = 0,
    ImgBmp = 1,
    ImgRaw8U = 2,
    ImgRaw32U = 3,
    ImgPgm = 4,
    ImgPng = 5,
}

impl TryFrom<u8> for DataStreamType {
    type Error = ProbeError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::ImgJpeg,
            1 => Self::ImgBmp,
            2 => Self::ImgRaw8U,
            3 => Self::ImgRaw32U,
            4 => Self::ImgPgm,
            5 => Self::ImgPng,
            other => {
                return Err(ProbeError::Protocol(format!(
                    "Unknown data stream type {}",
                    other
                )))
            }
        })
    }
}

/// DATA_TRANSMISSION_HANDSHAKE: announces a full-frame transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTransmissionHandshake {
    pub stream_type: DataStreamType,

    /// Total image size in bytes
    pub size: u32,

    pub width: u16,
    pub height: u16,

    /// Number of ENCAPSULATED_DATA messages that follow
    pub packets: u16,

    /// Payload bytes per data message
    pub payload: u8,

    pub jpg_quality: u8,
}

/// Probe picture header, sent right after the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureHeader {
    pub camera_id: u8,
    pub size: u32,
    pub packets: u16,

    /// First image row of the processing window
    pub y_crop_offset: u16,

    pub time_boot_ms: u32,
}

/// ENCAPSULATED_DATA: one chunk of the raw image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncapsulatedData {
    pub seqnr: u16,
    pub data: [u8; ENCAPSULATED_DATA_LEN],
}

/// Spectrum intensity header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectrumHeader {
    /// Profile size in bytes (two per row)
    pub size: u16,
    pub packets: u16,
    pub y_crop_offset: u16,
    pub time_boot_ms: u32,
}

/// Spectrum intensity data: row sums for up to [`SPECTRUM_ROWS_PER_PACKET`] rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectrumData {
    pub seqnr: u16,
    pub data: [u16; SPECTRUM_ROWS_PER_PACKET],
}

/// Any message the camera core transmits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Handshake(DataTransmissionHandshake),
    PictureHeader(PictureHeader),
    EncapsulatedData(EncapsulatedData),
    SpectrumHeader(SpectrumHeader),
    SpectrumData(SpectrumData),
}

impl Message {
    /// MAVLink message id
    pub fn id(&self) -> u8 {
        match self {
            Message::Handshake(_) => MSG_ID_DATA_TRANSMISSION_HANDSHAKE,
            Message::PictureHeader(_) => MSG_ID_PICTURE_HEADER,
            Message::EncapsulatedData(_) => MSG_ID_ENCAPSULATED_DATA,
            Message::SpectrumHeader(_) => MSG_ID_SPECTRUM_HEADER,
            Message::SpectrumData(_) => MSG_ID_SPECTRUM_DATA,
        }
    }

    /// Encoded payload length in bytes
    pub fn payload_len(&self) -> usize {
        match self {
            Message::Handshake(_) => DATA_TRANSMISSION_HANDSHAKE_LEN,
            Message::PictureHeader(_) => PICTURE_HEADER_LEN,
            Message::EncapsulatedData(_) => ENCAPSULATED_DATA_MSG_LEN,
            Message::SpectrumHeader(_) => SPECTRUM_HEADER_LEN,
            Message::SpectrumData(_) => SPECTRUM_DATA_MSG_LEN,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Message::Handshake(_) => "DATA_TRANSMISSION_HANDSHAKE",
            Message::PictureHeader(_) => "ZIKUSH_PICTURE_HEADER",
            Message::EncapsulatedData(_) => "ENCAPSULATED_DATA",
            Message::SpectrumHeader(_) => "ZIKUSH_SPECTRUM_INTENSITY_HEADER",
            Message::SpectrumData(_) => "ZIKUSH_SPECTRUM_INTENSITY_ENCAPSULATED_DATA",
        }
    }
}

/// A framed MAVLink v1 message with its payload still encoded
#[derive(Debug, Clone)]
pub struct MavlinkFrame {
    pub sequence: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub message_id: u8,
    pub payload: Vec<u8>,
}

impl MavlinkFrame {
    /// Create a new frame
    ///
    /// # Errors
    ///
    /// Returns error if payload exceeds MAVLINK_MAX_PAYLOAD_LEN (255 bytes)
    pub fn new(
        sequence: u8,
        system_id: u8,
        component_id: u8,
        message_id: u8,
        payload: Vec<u8>,
    ) -> Result<Self> {
        if payload.len() > MAVLINK_MAX_PAYLOAD_LEN {
            return Err(ProbeError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                payload.len(),
                MAVLINK_MAX_PAYLOAD_LEN
            )));
        }

        Ok(Self {
            sequence,
            system_id,
            component_id,
            message_id,
            payload,
        })
    }

    /// Total size on the wire
    pub fn wire_len(&self) -> usize {
        MAVLINK_HEADER_LEN + self.payload.len() + MAVLINK_CHECKSUM_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_lengths_fit_v1_frames() {
        assert_eq!(ENCAPSULATED_DATA_MSG_LEN, 255);
        assert_eq!(SPECTRUM_DATA_MSG_LEN, 242);
        assert!(SPECTRUM_DATA_MSG_LEN <= MAVLINK_MAX_PAYLOAD_LEN);
    }

    #[test]
    fn test_crc_extra_table() {
        assert_eq!(crc_extra(MSG_ID_DATA_TRANSMISSION_HANDSHAKE), Some(29));
        assert_eq!(crc_extra(MSG_ID_ENCAPSULATED_DATA), Some(223));
        assert_eq!(crc_extra(0), None);
    }

    #[test]
    fn test_stream_type_conversion() {
        assert_eq!(DataStreamType::try_from(2).unwrap(), DataStreamType::ImgRaw8U);
        assert!(DataStreamType::try_from(6).is_err());
    }

    #[test]
    fn test_message_ids_match_payload() {
        let header = Message::SpectrumHeader(SpectrumHeader {
            size: 20,
            packets: 1,
            y_crop_offset: 0,
            time_boot_ms: 0,
        });
        assert_eq!(header.id(), MSG_ID_SPECTRUM_HEADER);
        assert_eq!(header.payload_len(), SPECTRUM_HEADER_LEN);
        assert_eq!(header.name(), "ZIKUSH_SPECTRUM_INTENSITY_HEADER");
    }

    #[test]
    fn test_frame_payload_too_large() {
        let result = MavlinkFrame::new(0, 0, 3, MSG_ID_ENCAPSULATED_DATA, vec![0u8; 256]);
        assert!(result.is_err());
    }

    #[test]
    fn test_frame_wire_len() {
        let frame = MavlinkFrame::new(0, 0, 3, MSG_ID_ENCAPSULATED_DATA, vec![0u8; 255]).unwrap();
        assert_eq!(frame.wire_len(), 263);
    }
}
