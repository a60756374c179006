//! Block processor driving one filter chain per channel
//!
//! Each call to [`AudioBlockProcessor::process_block`] reads the parameter
//! store once, designs every band for the current sample rate, loads the
//! coefficients into both chains and filters the block in place. Nothing on
//! this path allocates, locks or blocks.

use crate::domain::audio::{AudioError, ChannelCount, ChannelLayout, Result};
use crate::domain::chain::{FilterChain, ProcessSpec};
use crate::domain::design::{design_high_cut, design_low_cut, design_peak};
use crate::domain::params::{ChainSettings, ParameterStore};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Core trait for in-place audio effects
///
/// Buffers are interleaved `f32` normalized to [-1.0, 1.0].
pub trait Effect: Send + Sync {
    /// Process a buffer of audio samples in-place
    ///
    /// Must not allocate; any buffer length is accepted.
    fn process(&mut self, buffer: &mut [f32]) -> Result<()>;

    /// Reset effect state to initial conditions
    fn reset(&mut self);

    /// Check if effect is bypassed
    fn is_bypassed(&self) -> bool;

    /// Toggle bypass state
    fn set_bypass(&mut self, bypass: bool);

    /// Get effect name for debugging/display
    fn name(&self) -> &str;
}

/// Lifecycle of an [`AudioBlockProcessor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// No sample rate known yet; blocks are rejected
    Unprepared,
    /// Chains reset and designed for the current session
    Prepared,
    /// At least one block processed since the last prepare
    Processing,
}

/// Host-facing equalizer processor
///
/// Channel 0 runs through the left chain and channel 1 through the right
/// chain; mono material uses the left chain only and further channels pass
/// through untouched.
pub struct AudioBlockProcessor<P: ParameterStore> {
    store: Arc<P>,
    left: FilterChain,
    right: FilterChain,
    state: ProcessorState,
    sample_rate: f64,
    max_block_size: usize,
    layout: ChannelLayout,
    settings: ChainSettings,
    bypass: bool,
}

impl<P: ParameterStore> AudioBlockProcessor<P> {
    pub const NAME: &'static str = "Simple EQ";

    pub fn new(store: Arc<P>) -> Self {
        Self {
            store,
            left: FilterChain::new(),
            right: FilterChain::new(),
            state: ProcessorState::Unprepared,
            sample_rate: 0.0,
            max_block_size: 0,
            layout: ChannelLayout::symmetric(ChannelCount::Stereo),
            settings: ChainSettings::default(),
            bypass: false,
        }
    }

    pub fn store(&self) -> &Arc<P> {
        &self.store
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Sample rate of the current session, if prepared
    pub fn sample_rate(&self) -> Option<f64> {
        (self.state != ProcessorState::Unprepared).then_some(self.sample_rate)
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Settings the chains were last designed from
    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Negotiate the bus layout
    ///
    /// Only mono or stereo with matching input and output sets is accepted.
    pub fn set_channel_layout(&mut self, layout: ChannelLayout) -> Result<()> {
        if !layout.is_supported() {
            return Err(AudioError::UnsupportedConfiguration(format!(
                "{} in / {} out channels (mono or stereo with matching sides only)",
                layout.input.count(),
                layout.output.count()
            )));
        }
        self.layout = layout;
        Ok(())
    }

    /// Start a session at `sample_rate`
    ///
    /// Both chains lose all history and are designed from the current
    /// parameter values. Calling this again for a new rate is a full reset.
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) -> Result<()> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "sample rate must be positive and finite, got {sample_rate}"
            )));
        }
        if max_block_size == 0 {
            return Err(AudioError::InvalidConfiguration(
                "maximum block size must be at least 1".to_string(),
            ));
        }

        let channels = usize::from(self.layout.output.count());
        let spec = ProcessSpec::new(sample_rate, max_block_size, channels);
        self.left.prepare(&spec);
        self.right.prepare(&spec);
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.state = ProcessorState::Prepared;
        self.update_filters();

        info!(
            "EQ prepared: {:.0} Hz, max block {} samples, {} channel(s)",
            sample_rate, max_block_size, spec.num_channels
        );
        debug!(settings = ?self.settings, "Initial chain settings");
        Ok(())
    }

    /// Resolve the store and load fresh coefficients into both chains
    fn update_filters(&mut self) {
        let settings = ChainSettings::resolve(self.store.as_ref());
        let sample_rate = self.sample_rate;

        let peak = design_peak(&settings, sample_rate);
        let low_cut = design_low_cut(
            f64::from(settings.low_cut_freq),
            sample_rate,
            settings.low_cut_slope.order(),
        );
        let high_cut = design_high_cut(
            f64::from(settings.high_cut_freq),
            sample_rate,
            settings.high_cut_slope.order(),
        );

        for chain in [&mut self.left, &mut self.right] {
            chain.update_peak(peak);
            chain.update_low_cut(&low_cut, settings.low_cut_slope.sections());
            chain.update_high_cut(&high_cut, settings.high_cut_slope.sections());
        }

        if settings != self.settings {
            trace!(
                "EQ updated: LC={:.0}Hz/{}, P={:.1}dB@{:.0}Hz Q={:.2}, HC={:.0}Hz/{}",
                settings.low_cut_freq,
                settings.low_cut_slope,
                settings.peak_gain_db,
                settings.peak_freq,
                settings.peak_quality,
                settings.high_cut_freq,
                settings.high_cut_slope
            );
            self.settings = settings;
        }
    }

    fn begin_block(&mut self) -> Result<()> {
        if self.state == ProcessorState::Unprepared {
            return Err(AudioError::NotPrepared);
        }
        self.update_filters();
        self.state = ProcessorState::Processing;
        Ok(())
    }

    /// Filter planar channel buffers in place
    pub fn process_block(&mut self, channels: &mut [&mut [f32]]) -> Result<()> {
        self.begin_block()?;
        if self.bypass {
            return Ok(());
        }

        if let Some(left) = channels.get_mut(0) {
            self.left.process_block(left);
        }
        if let Some(right) = channels.get_mut(1) {
            self.right.process_block(right);
        }
        Ok(())
    }

    /// Filter planar buffers where only the first `input_channels` carry input
    ///
    /// Output channels with no matching input hold stale data and are cleared
    /// before filtering.
    pub fn process_block_with_inputs(
        &mut self,
        channels: &mut [&mut [f32]],
        input_channels: usize,
    ) -> Result<()> {
        if self.state == ProcessorState::Unprepared {
            return Err(AudioError::NotPrepared);
        }
        for channel in channels.iter_mut().skip(input_channels) {
            channel.fill(0.0);
        }
        self.process_block(channels)
    }

    /// Filter an interleaved buffer in place
    pub fn process_interleaved(&mut self, buffer: &mut [f32], channels: usize) -> Result<()> {
        if channels == 0 {
            return Err(AudioError::InvalidConfiguration(
                "interleaved buffer needs at least one channel".to_string(),
            ));
        }
        self.begin_block()?;
        if self.bypass {
            return Ok(());
        }

        for frame in buffer.chunks_mut(channels) {
            if let Some(left) = frame.get_mut(0) {
                *left = self.left.process_sample(*left);
            }
            if let Some(right) = frame.get_mut(1) {
                *right = self.right.process_sample(*right);
            }
        }
        Ok(())
    }

    pub fn left_chain(&self) -> &FilterChain {
        &self.left
    }

    pub fn right_chain(&self) -> &FilterChain {
        &self.right
    }

    /// Designed magnitude response at `freq` for the current session
    ///
    /// Both chains always carry the same coefficients, so the left chain
    /// stands for the processor.
    pub fn magnitude_at(&self, freq: f64) -> Option<f64> {
        self.sample_rate()
            .map(|sample_rate| self.left.magnitude_at(freq, sample_rate))
    }

    /// IIR sections report no tail beyond their decay
    pub fn tail_length_seconds(&self) -> f64 {
        0.0
    }
}

impl<P: ParameterStore> Effect for AudioBlockProcessor<P> {
    fn process(&mut self, buffer: &mut [f32]) -> Result<()> {
        let channels = usize::from(self.layout.output.count());
        self.process_interleaved(buffer, channels)
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    fn is_bypassed(&self) -> bool {
        self.bypass
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
        if bypass {
            self.reset();
        }
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}
