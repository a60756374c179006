//! Platform adapters for the equalizer core
//!
//! - `audio`: CPAL device enumeration and the live duplex EQ stream
//! - `analysis`: FFT measurement of a processor's impulse response

pub mod analysis;
pub mod audio;
