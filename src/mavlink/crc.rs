//! # CRC-16/MCRF4XX Implementation
//!
//! X.25 checksum used by MAVLink frames.
//!
//! **Polynomial**: 0x1021, reflected (0x8408)
//! **Initial Value**: 0xFFFF
//!
//! The checksum covers every frame byte after the start marker, followed by the
//! message's CRC extra seed byte.

/// Reflected CCITT polynomial
const CRC16_POLY_REFLECTED: u16 = 0x8408;

/// Initial accumulator value
pub const CRC16_INIT: u16 = 0xFFFF;

/// Precomputed CRC16 lookup table for fast calculation
const CRC16_TABLE: [u16; 256] = generate_crc16_table();

/// Generate CRC16 lookup table at compile time
const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u16;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY_REFLECTED;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Feed bytes into a running X.25 checksum
///
/// # Arguments
///
/// * `crc` - Running checksum (start from [`CRC16_INIT`])
/// * `data` - Bytes to accumulate
///
/// # Returns
///
/// * `u16` - Updated checksum
pub fn crc16_accumulate(mut crc: u16, data: &[u8]) -> u16 {
    for &byte in data {
        crc = (crc >> 8) ^ CRC16_TABLE[((crc ^ byte as u16) & 0xFF) as usize];
    }

    crc
}

/// Checksum of a complete MAVLink frame body
///
/// # Arguments
///
/// * `body` - Frame bytes after the start marker (header + payload)
/// * `crc_extra` - Per-message seed byte
///
/// # Examples
///
/// ```no_run
/// use ccu_spectrum::mavlink::crc::mavlink_crc;
///
/// let body = [0x0D, 0x00, 0x00, 0x03, 0x82];
/// let crc = mavlink_crc(&body, 29);
/// ```
pub fn mavlink_crc(body: &[u8], crc_extra: u8) -> u16 {
    let crc = crc16_accumulate(CRC16_INIT, body);
    crc16_accumulate(crc, &[crc_extra])
}

/// Byte-at-a-time formulation used by the MAVLink C headers (for verification)
#[allow(dead_code)]
fn crc16_accumulate_slow(mut crc: u16, data: &[u8]) -> u16 {
    for &byte in data {
        let mut tmp = byte ^ (crc & 0xFF) as u8;
        tmp ^= tmp << 4;
        let tmp = tmp as u16;
        crc = (crc >> 8) ^ (tmp << 8) ^ (tmp << 3) ^ (tmp >> 4);
    }

    crc
}
