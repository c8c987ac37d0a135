//! # MAVLink Message Encoder
//!
//! Serializes camera messages into MAVLink v1 frames.

use bytes::{BufMut, Bytes, BytesMut};

use super::crc::mavlink_crc;
use super::protocol::*;

/// Encode a message payload in MAVLink wire order
///
/// Fields are little-endian and sorted by type size, largest first, as the
/// MAVLink generator lays them out.
pub fn encode_payload(message: &Message) -> BytesMut {
    let mut buf = BytesMut::with_capacity(message.payload_len());

    match message {
        Message::Handshake(m) => {
            buf.put_u32_le(m.size);
            buf.put_u16_le(m.width);
            buf.put_u16_le(m.height);
            buf.put_u16_le(m.packets);
            buf.put_u8(m.stream_type as u8);
            buf.put_u8(m.payload);
            buf.put_u8(m.jpg_quality);
        }
        Message::PictureHeader(m) => {
            buf.put_u32_le(m.size);
            buf.put_u32_le(m.time_boot_ms);
            buf.put_u16_le(m.packets);
            buf.put_u16_le(m.y_crop_offset);
            buf.put_u8(m.camera_id);
        }
        Message::EncapsulatedData(m) => {
            buf.put_u16_le(m.seqnr);
            buf.put_slice(&m.data);
        }
        Message::SpectrumHeader(m) => {
            buf.put_u32_le(m.time_boot_ms);
            buf.put_u16_le(m.size);
            buf.put_u16_le(m.packets);
            buf.put_u16_le(m.y_crop_offset);
        }
        Message::SpectrumData(m) => {
            buf.put_u16_le(m.seqnr);
            for &sum in m.data.iter() {
                buf.put_u16_le(sum);
            }
        }
    }

    debug_assert_eq!(buf.len(), message.payload_len());
    buf
}

/// Build a complete MAVLink v1 frame around a message
///
/// # Arguments
///
/// * `message` - Message to encode
/// * `sequence` - Link-level packet sequence
/// * `system_id` / `component_id` - Sender identity
///
/// # Returns
///
/// * `Bytes` - stx + len + seq + sysid + compid + msgid + payload + crc (LE)
pub fn encode_frame(message: &Message, sequence: u8, system_id: u8, component_id: u8) -> Bytes {
    let payload = encode_payload(message);

    let mut frame =
        BytesMut::with_capacity(MAVLINK_HEADER_LEN + payload.len() + MAVLINK_CHECKSUM_LEN);
    frame.put_u8(MAVLINK_STX_V1);
    frame.put_u8(payload.len() as u8);
    frame.put_u8(sequence);
    frame.put_u8(system_id);
    frame.put_u8(component_id);
    frame.put_u8(message.id());
    frame.put_slice(&payload);

    // Every message constructed here belongs to the dialect table
    let extra = crc_extra(message.id()).unwrap_or_default();
    let crc = mavlink_crc(&frame[1..], extra);
    frame.put_u16_le(crc);

    frame.freeze()
}

/// Stateful encoder that stamps frames with a wrapping link sequence
#[derive(Debug, Clone)]
pub struct MessageEncoder {
    system_id: u8,
    component_id: u8,
    sequence: u8,
}

impl MessageEncoder {
    pub fn new(system_id: u8, component_id: u8) -> Self {
        Self {
            system_id,
            component_id,
            sequence: 0,
        }
    }

    /// Encode the next frame and advance the link sequence
    pub fn encode(&mut self, message: &Message) -> Bytes {
        let frame = encode_frame(message, self.sequence, self.system_id, self.component_id);
        self.sequence = self.sequence.wrapping_add(1);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake() -> Message {
        Message::Handshake(DataTransmissionHandshake {
            stream_type: DataStreamType::ImgRaw8U,
            size: 90_240,
            width: 376,
            height: 240,
            packets: 357,
            payload: ENCAPSULATED_DATA_LEN as u8,
            jpg_quality: RAW_IMAGE_QUALITY,
        })
    }

    #[test]
    fn test_handshake_payload_layout() {
        let payload = encode_payload(&handshake());

        assert_eq!(payload.len(), DATA_TRANSMISSION_HANDSHAKE_LEN);
        assert_eq!(&payload[0..4], &90_240u32.to_le_bytes());
        assert_eq!(&payload[4..6], &376u16.to_le_bytes());
        assert_eq!(&payload[6..8], &240u16.to_le_bytes());
        assert_eq!(&payload[8..10], &357u16.to_le_bytes());
        assert_eq!(payload[10], 2);
        assert_eq!(payload[11], 253);
        assert_eq!(payload[12], 100);
    }

    #[test]
    fn test_picture_header_wire_order() {
        let payload = encode_payload(&Message::PictureHeader(PictureHeader {
            camera_id: 7,
            size: 0x0102_0304,
            packets: 0x0506,
            y_crop_offset: 0x0708,
            time_boot_ms: 0x0A0B_0C0D,
        }));

        assert_eq!(
            payload.as_ref(),
            &[0x04, 0x03, 0x02, 0x01, 0x0D, 0x0C, 0x0B, 0x0A, 0x06, 0x05, 0x08, 0x07, 7]
        );
    }

    #[test]
    fn test_spectrum_header_wire_order() {
        let payload = encode_payload(&Message::SpectrumHeader(SpectrumHeader {
            size: 20,
            packets: 1,
            y_crop_offset: 30,
            time_boot_ms: 1000,
        }));

        assert_eq!(payload.len(), SPECTRUM_HEADER_LEN);
        assert_eq!(&payload[0..4], &1000u32.to_le_bytes());
        assert_eq!(&payload[4..6], &20u16.to_le_bytes());
        assert_eq!(&payload[8..10], &30u16.to_le_bytes());
    }

    #[test]
    fn test_spectrum_data_payload() {
        let mut data = [0u16; SPECTRUM_ROWS_PER_PACKET];
        data[0] = 0x1234;
        data[SPECTRUM_ROWS_PER_PACKET - 1] = 0xABCD;
        let payload = encode_payload(&Message::SpectrumData(SpectrumData { seqnr: 3, data }));

        assert_eq!(payload.len(), SPECTRUM_DATA_MSG_LEN);
        assert_eq!(&payload[0..2], &[3, 0]);
        assert_eq!(&payload[2..4], &[0x34, 0x12]);
        assert_eq!(&payload[SPECTRUM_DATA_MSG_LEN - 2..], &[0xCD, 0xAB]);
    }

    #[test]
    fn test_frame_structure() {
        let frame = encode_frame(&handshake(), 9, 0, 3);

        assert_eq!(frame.len(), MAVLINK_HEADER_LEN + 13 + MAVLINK_CHECKSUM_LEN);
        assert_eq!(frame[0], MAVLINK_STX_V1);
        assert_eq!(frame[1], 13);
        assert_eq!(frame[2], 9);
        assert_eq!(frame[3], 0);
        assert_eq!(frame[4], 3);
        assert_eq!(frame[5], MSG_ID_DATA_TRANSMISSION_HANDSHAKE);

        let crc = mavlink_crc(&frame[1..frame.len() - 2], 29);
        assert_eq!(&frame[frame.len() - 2..], &crc.to_le_bytes());
    }

    #[test]
    fn test_encapsulated_frame_is_full_size() {
        let frame = encode_frame(
            &Message::EncapsulatedData(EncapsulatedData {
                seqnr: 0,
                data: [0xAA; ENCAPSULATED_DATA_LEN],
            }),
            0,
            0,
            3,
        );
        assert_eq!(frame.len(), 263);
        assert_eq!(frame[1], 255);
    }

    #[test]
    fn test_encoder_sequence_wraps() {
        let mut encoder = MessageEncoder::new(0, 3);
        let mut last = 0;
        for _ in 0..257 {
            last = encoder.encode(&handshake())[2];
        }
        // 257th frame carries sequence 256 mod 256
        assert_eq!(last, 0);
    }

    #[test]
    fn test_different_data_different_crc() {
        let a = encode_frame(&handshake(), 0, 0, 3);
        let b = encode_frame(&handshake(), 1, 0, 3);
        assert_ne!(&a[a.len() - 2..], &b[b.len() - 2..]);
    }
}
