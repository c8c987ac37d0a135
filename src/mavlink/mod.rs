//! # MAVLink Module
//!
//! MAVLink v1 framing for the camera telemetry downlink.
//!
//! This module handles:
//! - Message definitions for image and spectrum transfers
//! - Payload serialization in MAVLink wire order
//! - CRC-16/MCRF4XX checksums with per-message CRC extra
//! - Frame parsing and validation for ground-side checks

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod crc;
