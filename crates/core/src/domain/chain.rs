//! Per-channel cascade of equalizer stages
//!
//! A [`FilterChain`] has exactly nine slots in a fixed order: four low-cut
//! sections, the peak section, then four high-cut sections. Cut banks never
//! grow or shrink; slope changes only move the active count, and inactive
//! slots hold the identity set with cleared history.

use crate::domain::design::{CutCoefficients, MAX_SECTIONS};
use crate::domain::filter::{BiquadCoeffs, BiquadFilter};

/// Session parameters handed to [`FilterChain::prepare`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f64,
    pub maximum_block_size: usize,
    pub num_channels: usize,
}

impl ProcessSpec {
    pub fn new(sample_rate: f64, maximum_block_size: usize, num_channels: usize) -> Self {
        Self {
            sample_rate,
            maximum_block_size,
            num_channels,
        }
    }
}

/// Position of a stage group inside the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainPosition {
    LowCut,
    Peak,
    HighCut,
}

impl ChainPosition {
    /// Processing order
    pub const ORDER: [ChainPosition; 3] = [
        ChainPosition::LowCut,
        ChainPosition::Peak,
        ChainPosition::HighCut,
    ];
}

/// Fixed bank of up to four cascaded cut sections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CutBank {
    stages: [BiquadFilter; MAX_SECTIONS],
    active: usize,
}

impl CutBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the first `active_sections` designed sections
    ///
    /// Slots past the active count become identity. A slot that drops out of
    /// the cascade also loses its history, so re-enabling it later starts
    /// from silence rather than from a stale state.
    pub fn update(&mut self, coefficients: &CutCoefficients, active_sections: usize) {
        let active = active_sections.min(MAX_SECTIONS);
        for (index, stage) in self.stages.iter_mut().enumerate() {
            if index < active {
                stage.set_coeffs(coefficients.get(index));
            } else if index < self.active || !stage.coeffs().is_identity() {
                stage.set_coeffs(BiquadCoeffs::IDENTITY);
                stage.reset();
            }
        }
        self.active = active;
    }

    /// Number of sections currently in the signal path
    pub fn active_sections(&self) -> usize {
        self.active
    }

    pub fn stages(&self) -> &[BiquadFilter] {
        &self.stages
    }

    pub fn stage(&self, index: usize) -> Option<&BiquadFilter> {
        self.stages.get(index)
    }

    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        self.stages[..self.active]
            .iter_mut()
            .fold(sample, |acc, stage| stage.process_sample(acc))
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Return every slot to identity with zero history
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        self.stages[..self.active]
            .iter()
            .map(|stage| stage.coeffs().magnitude_at(freq, sample_rate))
            .product()
    }
}

/// Low-cut bank, peak stage and high-cut bank for one channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    low_cut: CutBank,
    peak: BiquadFilter,
    high_cut: CutBank,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all nine slots to identity with zero state
    ///
    /// The chain keeps no per-session buffers, so nothing here depends on
    /// the block size.
    pub fn prepare(&mut self, _spec: &ProcessSpec) {
        self.low_cut.clear();
        self.peak = BiquadFilter::bypass();
        self.high_cut.clear();
    }

    pub fn update_low_cut(&mut self, coefficients: &CutCoefficients, active_sections: usize) {
        self.low_cut.update(coefficients, active_sections);
    }

    pub fn update_high_cut(&mut self, coefficients: &CutCoefficients, active_sections: usize) {
        self.high_cut.update(coefficients, active_sections);
    }

    pub fn update_peak(&mut self, coeffs: BiquadCoeffs) {
        self.peak.set_coeffs(coeffs);
    }

    /// Run one sample through low-cut, peak and high-cut in that order
    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let sample = self.low_cut.process_sample(sample);
        let sample = self.peak.process_sample(sample);
        self.high_cut.process_sample(sample)
    }

    /// Filter a buffer in place
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Clear history, keeping the current coefficients
    pub fn reset(&mut self) {
        self.low_cut.reset();
        self.peak.reset();
        self.high_cut.reset();
    }

    pub fn low_cut(&self) -> &CutBank {
        &self.low_cut
    }

    pub fn peak(&self) -> &BiquadFilter {
        &self.peak
    }

    pub fn high_cut(&self) -> &CutBank {
        &self.high_cut
    }

    /// Designed magnitude of one stage group
    pub fn position_magnitude_at(
        &self,
        position: ChainPosition,
        freq: f64,
        sample_rate: f64,
    ) -> f64 {
        match position {
            ChainPosition::LowCut => self.low_cut.magnitude_at(freq, sample_rate),
            ChainPosition::Peak => self.peak.coeffs().magnitude_at(freq, sample_rate),
            ChainPosition::HighCut => self.high_cut.magnitude_at(freq, sample_rate),
        }
    }

    /// Designed magnitude of the whole chain
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        ChainPosition::ORDER
            .iter()
            .map(|&position| self.position_magnitude_at(position, freq, sample_rate))
            .product()
    }
}
