//! # Spectrum Module
//!
//! Turns a captured frame into telemetry: the row-reduction encoder and the
//! packetizer for raw images and spectrum profiles.

pub mod reduce;
pub mod packetizer;
