//! Measured frequency response of a processing function
//!
//! An impulse is pushed through the processor and the captured response is
//! transformed with an FFT. The result should agree with the designed
//! response of the chain as long as the impulse response has decayed within
//! the capture length.

use eqchain_core::domain::{gain_to_db, AudioError};
use rustfft::{num_complex::Complex, FftPlanner};
use tracing::debug;

/// Default capture length; 1.4 Hz bins at 48 kHz
pub const DEFAULT_FFT_SIZE: usize = 32768;

/// Magnitude spectrum of a captured impulse response
#[derive(Debug, Clone)]
pub struct MeasuredResponse {
    sample_rate: f64,
    fft_size: usize,
    /// Linear magnitude for bins `0..=fft_size / 2`
    magnitudes: Vec<f64>,
}

impl MeasuredResponse {
    /// Transform an impulse response (zero padded to a power of two)
    pub fn from_impulse_response(response: &[f32], sample_rate: f64) -> Result<Self, AudioError> {
        if response.is_empty() {
            return Err(AudioError::InvalidConfiguration("empty impulse response".to_string()));
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "invalid sample rate {sample_rate}"
            )));
        }

        let fft_size = response.len().next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);

        let mut buffer: Vec<Complex<f64>> = response
            .iter()
            .map(|&s| Complex::new(f64::from(s), 0.0))
            .collect();
        buffer.resize(fft_size, Complex::new(0.0, 0.0));

        // No window: the whole response is captured, so the transform is the
        // sampled transfer function itself.
        fft.process(&mut buffer);

        let magnitudes = buffer.iter().take(fft_size / 2 + 1).map(|c| c.norm()).collect();
        debug!(fft_size, sample_rate, "Impulse response transformed");

        Ok(Self {
            sample_rate,
            fft_size,
            magnitudes,
        })
    }

    /// Capture `fft_size` samples of `process`'s impulse response and transform it
    pub fn measure<F>(sample_rate: f64, fft_size: usize, mut process: F) -> Result<Self, AudioError>
    where
        F: FnMut(&mut [f32]) -> Result<(), AudioError>,
    {
        let mut buffer = vec![0.0f32; fft_size.max(1)];
        buffer[0] = 1.0;
        process(&mut buffer)?;
        Self::from_impulse_response(&buffer, sample_rate)
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Frequency spacing between bins
    pub fn bin_width(&self) -> f64 {
        self.sample_rate / self.fft_size as f64
    }

    /// Linear magnitude at `freq`, interpolated between neighbouring bins
    pub fn magnitude_at(&self, freq: f64) -> f64 {
        let last = self.magnitudes.len() - 1;
        let position = (freq / self.bin_width()).clamp(0.0, last as f64);
        let lower = position.floor() as usize;
        let upper = (lower + 1).min(last);
        let frac = position - lower as f64;
        self.magnitudes[lower] + frac * (self.magnitudes[upper] - self.magnitudes[lower])
    }

    pub fn magnitude_db_at(&self, freq: f64) -> f64 {
        gain_to_db(self.magnitude_at(freq))
    }
}

/// Log-spaced frequencies from `start` to `end`, inclusive
pub fn log_frequencies(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let ratio = (end / start).ln() / (points - 1) as f64;
            (0..points).map(|i| start * (ratio * i as f64).exp()).collect()
        }
    }
}
