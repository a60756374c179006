//! Shared signal helpers for the cross-crate integration tests

use std::f64::consts::PI;

/// Sine of `amplitude` at `frequency`, phase computed in f64
pub fn sine(frequency: f64, sample_rate: f64, len: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|n| amplitude * (2.0 * PI * frequency * n as f64 / sample_rate).sin() as f32)
        .collect()
}

pub fn silence(len: usize) -> Vec<f32> {
    vec![0.0; len]
}

pub fn impulse(len: usize) -> Vec<f32> {
    let mut signal = silence(len);
    if let Some(first) = signal.first_mut() {
        *first = 1.0;
    }
    signal
}

/// Deterministic white noise in [-1, 1)
pub fn noise(len: usize, seed: u64) -> Vec<f32> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
        })
        .collect()
}

pub fn rms(signal: &[f32]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let sum: f64 = signal.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / signal.len() as f64).sqrt()
}

/// Level of `output` relative to `input` in dB, over the tail after `skip` samples
pub fn gain_db(input: &[f32], output: &[f32], skip: usize) -> f64 {
    20.0 * (rms(&output[skip..]) / rms(&input[skip..])).log10()
}

/// Interleave two equally long channels
pub fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    left.iter().zip(right).flat_map(|(&l, &r)| [l, r]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_rms() {
        let signal = sine(1000.0, 48000.0, 48000, 1.0);
        assert!((rms(&signal) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-4);
    }

    #[test]
    fn test_noise_range() {
        let signal = noise(4096, 42);
        assert!(signal.iter().all(|s| (-1.0..1.0).contains(s)));
        assert!(rms(&signal) > 0.4);
    }
}
