//! CPAL audio backend
//!
//! Device discovery plus the duplex stream that runs captured audio through
//! the equalizer on its way to the playback device (WASAPI, ALSA/PulseAudio
//! or CoreAudio, whichever host CPAL picks).

pub mod cpal_backend;
pub mod stream;

pub use cpal_backend::{find_device, CpalEnumerator};
pub use stream::{EqStream, StreamStats};
