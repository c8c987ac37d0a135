//! # MAVLink Frame Decoder
//!
//! Parses MAVLink v1 frames back into camera messages. Used by ground-side
//! tooling and to verify what the gateway put on the wire.

use super::crc::mavlink_crc;
use super::protocol::*;
use crate::error::{ProbeError, Result};

/// Decode one complete MAVLink v1 frame
///
/// # Errors
///
/// Returns error if:
/// - Frame is too short or its length byte disagrees with the frame size
/// - Start marker is incorrect
/// - Message id is not part of the camera dialect
/// - CRC check fails
pub fn decode_frame(frame: &[u8]) -> Result<MavlinkFrame> {
    if frame.len() < MAVLINK_HEADER_LEN + MAVLINK_CHECKSUM_LEN {
        return Err(ProbeError::Protocol("Frame too short".to_string()));
    }

    if frame[0] != MAVLINK_STX_V1 {
        return Err(ProbeError::Protocol(format!(
            "Invalid start marker: 0x{:02X}",
            frame[0]
        )));
    }

    let length = frame[1] as usize;
    let expected = MAVLINK_HEADER_LEN + length + MAVLINK_CHECKSUM_LEN;
    if frame.len() < expected {
        return Err(ProbeError::Protocol(format!(
            "Frame too short: expected {} bytes, got {}",
            expected,
            frame.len()
        )));
    }

    let message_id = frame[5];
    let extra = crc_extra(message_id).ok_or_else(|| {
        ProbeError::Protocol(format!("Unknown message id {}", message_id))
    })?;

    let body_end = MAVLINK_HEADER_LEN + length;
    let received_crc = u16::from_le_bytes([frame[body_end], frame[body_end + 1]]);
    let calculated_crc = mavlink_crc(&frame[1..body_end], extra);
    if calculated_crc != received_crc {
        return Err(ProbeError::Protocol(format!(
            "CRC mismatch: expected 0x{:04X}, got 0x{:04X}",
            calculated_crc, received_crc
        )));
    }

    MavlinkFrame::new(
        frame[2],
        frame[3],
        frame[4],
        message_id,
        frame[MAVLINK_HEADER_LEN..body_end].to_vec(),
    )
}

/// Split a byte stream into consecutive frames
///
/// Stops at the first malformed frame.
pub fn decode_stream(mut bytes: &[u8]) -> Result<Vec<MavlinkFrame>> {
    let mut frames = Vec::new();

    while !bytes.is_empty() {
        let frame = decode_frame(bytes)?;
        bytes = &bytes[frame.wire_len()..];
        frames.push(frame);
    }

    Ok(frames)
}

fn le_u16(payload: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([payload[at], payload[at + 1]])
}

fn le_u32(payload: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([payload[at], payload[at + 1], payload[at + 2], payload[at + 3]])
}

/// Decode a frame's payload into a typed message
///
/// # Errors
///
/// Returns error if the payload is shorter than the message requires.
pub fn decode_message(frame: &MavlinkFrame) -> Result<Message> {
    let p = &frame.payload;
    let need = match frame.message_id {
        MSG_ID_DATA_TRANSMISSION_HANDSHAKE => DATA_TRANSMISSION_HANDSHAKE_LEN,
        MSG_ID_ENCAPSULATED_DATA => ENCAPSULATED_DATA_MSG_LEN,
        MSG_ID_PICTURE_HEADER => PICTURE_HEADER_LEN,
        MSG_ID_SPECTRUM_HEADER => SPECTRUM_HEADER_LEN,
        MSG_ID_SPECTRUM_DATA => SPECTRUM_DATA_MSG_LEN,
        other => {
            return Err(ProbeError::Protocol(format!("Unknown message id {}", other)));
        }
    };
    if p.len() < need {
        return Err(ProbeError::Protocol(format!(
            "Payload too short for message {}: {} bytes",
            frame.message_id,
            p.len()
        )));
    }

    let message = match frame.message_id {
        MSG_ID_DATA_TRANSMISSION_HANDSHAKE => Message::Handshake(DataTransmissionHandshake {
            size: le_u32(p, 0),
            width: le_u16(p, 4),
            height: le_u16(p, 6),
            packets: le_u16(p, 8),
            stream_type: DataStreamType::try_from(p[10])?,
            payload: p[11],
            jpg_quality: p[12],
        }),
        MSG_ID_PICTURE_HEADER => Message::PictureHeader(PictureHeader {
            size: le_u32(p, 0),
            time_boot_ms: le_u32(p, 4),
            packets: le_u16(p, 8),
            y_crop_offset: le_u16(p, 10),
            camera_id: p[12],
        }),
        MSG_ID_ENCAPSULATED_DATA => {
            let mut data = [0u8; ENCAPSULATED_DATA_LEN];
            data.copy_from_slice(&p[2..ENCAPSULATED_DATA_MSG_LEN]);
            Message::EncapsulatedData(EncapsulatedData {
                seqnr: le_u16(p, 0),
                data,
            })
        }
        MSG_ID_SPECTRUM_HEADER => Message::SpectrumHeader(SpectrumHeader {
            time_boot_ms: le_u32(p, 0),
            size: le_u16(p, 4),
            packets: le_u16(p, 6),
            y_crop_offset: le_u16(p, 8),
        }),
        _ => {
            let mut data = [0u16; SPECTRUM_ROWS_PER_PACKET];
            for (slot, value) in data.iter_mut().enumerate() {
                *value = le_u16(p, 2 + 2 * slot);
            }
            Message::SpectrumData(SpectrumData {
                seqnr: le_u16(p, 0),
                data,
            })
        }
    };

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mavlink::encoder::encode_frame;

    fn spectrum_header() -> Message {
        Message::SpectrumHeader(SpectrumHeader {
            size: 200,
            packets: 1,
            y_crop_offset: 12,
            time_boot_ms: 4321,
        })
    }

    #[test]
    fn test_decode_frame_too_short() {
        let result = decode_frame(&[MAVLINK_STX_V1, 0x00]);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_frame_invalid_start_marker() {
        let mut frame = encode_frame(&spectrum_header(), 0, 0, 3).to_vec();
        frame[0] = 0xFD;
        assert!(decode_frame(&frame).is_err());
    }

    #[test]
    fn test_decode_valid_frame() {
        let frame = encode_frame(&spectrum_header(), 42, 1, 3);
        let decoded = decode_frame(&frame).unwrap();

        assert_eq!(decoded.sequence, 42);
        assert_eq!(decoded.system_id, 1);
        assert_eq!(decoded.component_id, 3);
        assert_eq!(decoded.message_id, MSG_ID_SPECTRUM_HEADER);
        assert_eq!(decode_message(&decoded).unwrap(), spectrum_header());
    }

    #[test]
    fn test_decode_frame_crc_error() {
        let mut frame = encode_frame(&spectrum_header(), 0, 0, 3).to_vec();
        frame[7] ^= 0x01;

        match decode_frame(&frame) {
            Err(ProbeError::Protocol(msg)) => assert!(msg.contains("CRC mismatch")),
            other => panic!("Expected CRC error, got: {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_message_id() {
        let mut frame = encode_frame(&spectrum_header(), 0, 0, 3).to_vec();
        frame[5] = 0;
        assert!(decode_frame(&frame).is_err());
    }

    #[test]
    fn test_decode_stream_of_frames() {
        let mut bytes = encode_frame(&spectrum_header(), 0, 0, 3).to_vec();
        bytes.extend_from_slice(&encode_frame(&spectrum_header(), 1, 0, 3));

        let frames = decode_stream(&bytes).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].sequence, 1);
    }

    #[test]
    fn test_decode_truncated_payload() {
        let frame = MavlinkFrame::new(0, 0, 3, MSG_ID_SPECTRUM_DATA, vec![0u8; 10]).unwrap();
        assert!(decode_message(&frame).is_err());
    }
}
