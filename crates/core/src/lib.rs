//! Real-time parametric equalizer core
//!
//! A fixed-topology chain of biquad sections (low-cut bank, peak, high-cut
//! bank) per audio channel, driven by a lock-free parameter store.

pub mod domain;
