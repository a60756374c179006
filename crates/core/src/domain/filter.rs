//! Second-order IIR sections
//!
//! [`BiquadCoeffs`] is an immutable, normalised coefficient set and
//! [`BiquadFilter`] is one stateful filter stage running it. Coefficients and
//! state are kept in `f64`: a 2nd-order Butterworth section with a corner of a
//! few Hz at 48 kHz has poles within 1e-4 of the unit circle, which `f32`
//! coefficients cannot represent faithfully. Samples stay `f32` at the edges.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Convert decibels to a linear amplitude factor
#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert a linear amplitude factor to decibels
///
/// Non-positive amplitudes map to -inf.
#[inline]
pub fn gain_to_db(gain: f64) -> f64 {
    if gain <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * gain.log10()
    }
}

/// History values below this magnitude are flushed to zero so a decaying
/// tail never runs on subnormal arithmetic.
const DENORMAL_FLOOR: f64 = 1e-30;

#[inline]
fn flush_denormal(value: f64) -> f64 {
    if value.abs() < DENORMAL_FLOOR {
        0.0
    } else {
        value
    }
}

/// Biquad filter coefficients
///
/// Transfer function `(b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`,
/// already divided by `a0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BiquadCoeffs {
    /// Pass-through section: output equals input, history has no effect
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Normalise raw coefficients by `a0`
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Peaking EQ section (RBJ cookbook)
    ///
    /// Boosts or cuts a band around `freq`. `gain_factor` is the linear
    /// amplitude at the centre frequency; a factor of exactly 1.0 yields
    /// numerator and denominator terms that cancel exactly, so the section is
    /// a bit-exact identity when run through [`BiquadFilter`].
    ///
    /// Inputs are taken as given; use [`crate::domain::design::design_peak`]
    /// for clamped, host-facing design.
    #[must_use]
    pub fn peaking(sample_rate: f64, freq: f64, q: f64, gain_factor: f64) -> Self {
        let a = gain_factor.sqrt();
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a1 = -2.0 * cos_w0;
        let b0 = 1.0 + alpha * a;
        let b2 = 1.0 - alpha * a;

        let a0 = 1.0 + alpha / a;
        let a2 = 1.0 - alpha / a;

        Self::normalized(b0, a1, b2, a0, a1, a2)
    }

    /// Second-order highpass section with resonance `q` (RBJ cookbook)
    #[must_use]
    pub fn highpass(sample_rate: f64, freq: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        let alpha = w0.sin() / (2.0 * q);
        // 1 + cos(w0), written to keep precision near Nyquist
        let one_plus_cos = 2.0 * (0.5 * w0).cos().powi(2);

        let b0 = one_plus_cos * 0.5;
        let b1 = -one_plus_cos;
        let b2 = b0;

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * w0.cos();
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Second-order lowpass section with resonance `q` (RBJ cookbook)
    #[must_use]
    pub fn lowpass(sample_rate: f64, freq: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        let alpha = w0.sin() / (2.0 * q);
        // 1 - cos(w0), written to keep precision at low corners
        let one_minus_cos = 2.0 * (0.5 * w0).sin().powi(2);

        let b0 = one_minus_cos * 0.5;
        let b1 = one_minus_cos;
        let b2 = b0;

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * w0.cos();
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Complex frequency response at `freq`
    pub fn response_at(&self, freq: f64, sample_rate: f64) -> Complex64 {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let num = self.b0 + z1 * self.b1 + z2 * self.b2;
        let den = 1.0 + z1 * self.a1 + z2 * self.a2;
        num / den
    }

    /// Magnitude response |H(e^jw)| at `freq`
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        self.response_at(freq, sample_rate).norm()
    }

    /// Both poles strictly inside the unit circle (stability triangle)
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }
}

/// Stateful biquad filter using Direct Form I
///
/// Direct Form I keeps input and output history separately, so a coefficient
/// swap between two samples never leaves the state in a form that belongs to
/// the old coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    // Previous input samples (x[n-1], x[n-2])
    x1: f64,
    x2: f64,
    // Previous output samples (y[n-1], y[n-2])
    y1: f64,
    y2: f64,
}

impl Default for BiquadFilter {
    fn default() -> Self {
        Self::bypass()
    }
}

impl BiquadFilter {
    /// Create a new biquad filter with given coefficients
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Create a bypass filter (unity gain)
    pub fn bypass() -> Self {
        Self::new(BiquadCoeffs::IDENTITY)
    }

    /// Replace the coefficient set
    ///
    /// The whole set is swapped by value; the next sample sees only the new
    /// coefficients. History is kept so the response changes without a jump.
    #[inline]
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let c = &self.coeffs;
        let x = f64::from(sample);

        // Terms paired per delay tap: when b == a for a tap and the output
        // history equals the input history, each pair cancels to exactly zero.
        let y = c.b0 * x + (c.b1 * self.x1 - c.a1 * self.y1) + (c.b2 * self.x2 - c.a2 * self.y2);

        self.x2 = self.x1;
        self.x1 = flush_denormal(x);
        self.y2 = self.y1;
        self.y1 = flush_denormal(y);

        y as f32
    }

    /// Process a buffer of samples in place
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// True when all history is zero
    pub fn is_idle(&self) -> bool {
        self.x1 == 0.0 && self.x2 == 0.0 && self.y1 == 0.0 && self.y2 == 0.0
    }
}
