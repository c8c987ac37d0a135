//! # CCU Spectrum Library
//!
//! Spectrum camera core for the probe's camera control unit.
//!
//! This library captures frames from the spectrometer sensor, reduces a
//! window of each frame to a per-row intensity profile and streams the
//! profile (and optionally the raw frame) to the ground over a paced MAVLink
//! serial downlink.

pub mod config;
pub mod error;
pub mod capture;
pub mod spectrum;
pub mod mavlink;
pub mod serial;
pub mod gateway;
pub mod pipeline;
