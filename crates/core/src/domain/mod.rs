//! Domain entities and business rules

pub mod audio;
pub mod chain;
pub mod config;
pub mod design;
pub mod filter;
pub mod params;
pub mod processor;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{
    AudioError, ChannelCount, ChannelLayout, DeviceId, DeviceInfo, DeviceType, SampleRate,
};
pub use chain::{ChainPosition, CutBank, FilterChain, ProcessSpec};
pub use config::{ConfigError, ConfigManager, ConfigWatcher, EngineConfig, EqConfig};
pub use design::{design_high_cut, design_low_cut, design_peak, CutCoefficients, MAX_SECTIONS};
pub use filter::{db_to_gain, gain_to_db, BiquadCoeffs, BiquadFilter};
pub use params::{
    ChainSettings, ParameterId, ParameterLayout, ParameterRange, ParameterSpec, ParameterStore,
    ParameterTree, ParameterValues, Slope,
};
pub use processor::{AudioBlockProcessor, Effect, ProcessorState};
