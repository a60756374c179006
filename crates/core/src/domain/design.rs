//! Coefficient design for the equalizer bands
//!
//! Every function here is pure and allocation free so it can run on the
//! audio thread at the start of each block. Inputs are clamped into a range
//! where the resulting sections are finite and stable instead of being
//! rejected.
//!
//! Cut filters are realised as an order-`O` Butterworth response factored
//! into `O / 2` second-order sections. Section `k` takes the `k`-th conjugate
//! pole pair of the analog prototype, which has resonance
//! `Q_k = 1 / (2 cos((2k + 1) π / (2O)))`, and is mapped to the z-plane with
//! the prewarped bilinear transform. Sections are emitted in ascending `Q`.

use crate::domain::filter::{db_to_gain, BiquadCoeffs};
use crate::domain::params::ChainSettings;
use std::f64::consts::PI;

/// Maximum number of cascaded sections in one cut bank (order 8)
pub const MAX_SECTIONS: usize = 4;

/// Maximum supported Butterworth order
pub const MAX_ORDER: usize = MAX_SECTIONS * 2;

/// Lowest corner/centre frequency handed to the section formulas
pub const MIN_DESIGN_FREQ: f64 = 1.0;

/// Highest design frequency as a fraction of Nyquist
pub const MAX_NYQUIST_RATIO: f64 = 0.99999;

/// Supported peak quality range
pub const MIN_QUALITY: f64 = 0.1;
pub const MAX_QUALITY: f64 = 10.0;
const DEFAULT_QUALITY: f64 = 1.0;

/// Supported peak gain range in dB
pub const MIN_PEAK_GAIN_DB: f64 = -24.0;
pub const MAX_PEAK_GAIN_DB: f64 = 24.0;

/// Ordered sections of one cut filter
///
/// Fixed capacity; only the first [`len`](CutCoefficients::len) entries are
/// meaningful, the rest are identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutCoefficients {
    sections: [BiquadCoeffs; MAX_SECTIONS],
    len: usize,
}

impl Default for CutCoefficients {
    fn default() -> Self {
        Self {
            sections: [BiquadCoeffs::IDENTITY; MAX_SECTIONS],
            len: 0,
        }
    }
}

impl CutCoefficients {
    /// Designed sections in cascade order
    pub fn sections(&self) -> &[BiquadCoeffs] {
        &self.sections[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Section `index`, or identity past the designed count
    pub fn get(&self, index: usize) -> BiquadCoeffs {
        if index < self.len {
            self.sections[index]
        } else {
            BiquadCoeffs::IDENTITY
        }
    }

    /// Magnitude of the whole cascade at `freq`
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        self.sections()
            .iter()
            .map(|s| s.magnitude_at(freq, sample_rate))
            .product()
    }
}

/// Clamp a design frequency into `[MIN_DESIGN_FREQ, MAX_NYQUIST_RATIO * nyquist]`
///
/// When the rate is so low that the floor reaches Nyquist, the floor drops to
/// the upper bound so the corner stays strictly inside `(0, nyquist)`. NaN
/// maps to the lower bound.
pub fn clamp_frequency(freq: f64, sample_rate: f64) -> f64 {
    let upper = sample_rate * 0.5 * MAX_NYQUIST_RATIO;
    if !(upper > 0.0) {
        return MIN_DESIGN_FREQ;
    }
    let lower = MIN_DESIGN_FREQ.min(upper);
    if freq.is_nan() {
        return lower;
    }
    freq.clamp(lower, upper)
}

/// Clamp a peak quality into `[MIN_QUALITY, MAX_QUALITY]`
pub fn clamp_quality(q: f64) -> f64 {
    if q.is_nan() {
        return DEFAULT_QUALITY;
    }
    q.clamp(MIN_QUALITY, MAX_QUALITY)
}

/// Clamp a peak gain into `[MIN_PEAK_GAIN_DB, MAX_PEAK_GAIN_DB]`
pub fn clamp_gain_db(gain_db: f64) -> f64 {
    if gain_db.is_nan() {
        return 0.0;
    }
    gain_db.clamp(MIN_PEAK_GAIN_DB, MAX_PEAK_GAIN_DB)
}

/// Peak section for a centre frequency, quality and gain in dB
#[must_use]
pub fn peak_coefficients(sample_rate: f64, freq: f64, quality: f64, gain_db: f64) -> BiquadCoeffs {
    let freq = clamp_frequency(freq, sample_rate);
    let quality = clamp_quality(quality);
    let gain = db_to_gain(clamp_gain_db(gain_db));
    BiquadCoeffs::peaking(sample_rate, freq, quality, gain)
}

/// Peak section for the current settings snapshot
#[must_use]
pub fn design_peak(settings: &ChainSettings, sample_rate: f64) -> BiquadCoeffs {
    peak_coefficients(
        sample_rate,
        f64::from(settings.peak_freq),
        f64::from(settings.peak_quality),
        f64::from(settings.peak_gain_db),
    )
}

/// Resonance of section `index` of an order-`order` Butterworth cascade
pub fn butterworth_q(order: usize, index: usize) -> f64 {
    let angle = (2 * index + 1) as f64 * PI / (2 * order) as f64;
    1.0 / (2.0 * angle.cos())
}

/// Normalise a requested order to an even value in `2..=MAX_ORDER`
fn even_order(order: usize) -> usize {
    let order = order.clamp(2, MAX_ORDER);
    order + order % 2
}

fn design_cut(
    freq: f64,
    sample_rate: f64,
    order: usize,
    section: fn(f64, f64, f64) -> BiquadCoeffs,
) -> CutCoefficients {
    let order = even_order(order);
    let freq = clamp_frequency(freq, sample_rate);

    let mut coefficients = CutCoefficients {
        len: order / 2,
        ..CutCoefficients::default()
    };
    for (index, slot) in coefficients.sections[..order / 2].iter_mut().enumerate() {
        *slot = section(sample_rate, freq, butterworth_q(order, index));
    }
    coefficients
}

/// Butterworth highpass cascade for the low-cut band
///
/// `order` is clamped to an even value in `2..=8`.
#[must_use]
pub fn design_low_cut(freq: f64, sample_rate: f64, order: usize) -> CutCoefficients {
    design_cut(freq, sample_rate, order, BiquadCoeffs::highpass)
}

/// Butterworth lowpass cascade for the high-cut band
///
/// `order` is clamped to an even value in `2..=8`.
#[must_use]
pub fn design_high_cut(freq: f64, sample_rate: f64, order: usize) -> CutCoefficients {
    design_cut(freq, sample_rate, order, BiquadCoeffs::lowpass)
}
