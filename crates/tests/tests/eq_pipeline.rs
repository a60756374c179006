//! End-to-end tests for the equalizer processing path
//!
//! Parameter store -> settings snapshot -> coefficient design -> per-channel
//! chains -> host buffers.

use eqchain_core::domain::{
    AudioBlockProcessor, AudioError, ChainSettings, Effect, FilterChain, ParameterId, ParameterTree,
    ParameterValues, ProcessSpec, ProcessorState, Slope,
};
use eqchain_core::domain::design::{design_high_cut, design_low_cut, design_peak};
use eqchain_tests::{gain_db, impulse, interleave, noise, rms, silence, sine};
use proptest::prelude::*;
use std::sync::Arc;

fn processor_with(
    values: ParameterValues,
) -> (Arc<ParameterTree>, AudioBlockProcessor<ParameterTree>) {
    let tree = Arc::new(ParameterTree::with_values(&values));
    let processor = AudioBlockProcessor::new(Arc::clone(&tree));
    (tree, processor)
}

/// Run a mono signal through a freshly prepared processor in host-sized blocks
fn run_mono(values: ParameterValues, sample_rate: f64, input: &[f32]) -> Vec<f32> {
    let (_, mut eq) = processor_with(values);
    eq.prepare(sample_rate, 480).unwrap();
    let mut output = input.to_vec();
    for block in output.chunks_mut(480) {
        eq.process_block(&mut [block]).unwrap();
    }
    output
}

// ============================================================================
// FREQUENCY RESPONSE
// ============================================================================

#[test]
fn test_low_cut_100hz_removes_rumble() {
    let sample_rate = 48000.0;
    let values = ParameterValues {
        low_cut_freq: 100.0,
        low_cut_slope: Slope::Db12,
        ..ParameterValues::default()
    };

    let rumble = sine(20.0, sample_rate, 96000, 0.5);
    let tone = sine(1000.0, sample_rate, 96000, 0.5);
    let rumble_gain = gain_db(&rumble, &run_mono(values, sample_rate, &rumble), 48000);
    let tone_gain = gain_db(&tone, &run_mono(values, sample_rate, &tone), 48000);

    assert!(tone_gain.abs() < 0.1, "1 kHz: {tone_gain} dB");
    assert!(tone_gain - rumble_gain > 25.0, "20 Hz only {rumble_gain} dB");
    assert!((rumble_gain + 27.96).abs() < 1.0, "20 Hz: {rumble_gain} dB");
}

#[test]
fn test_peak_boost_1khz_at_44100() {
    let sample_rate = 44100.0;
    let values = ParameterValues {
        peak_freq: 1000.0,
        peak_gain_db: 12.0,
        peak_quality: 1.0,
        ..ParameterValues::default()
    };

    let centre = sine(1000.0, sample_rate, 88200, 0.1);
    let low = sine(100.0, sample_rate, 88200, 0.1);
    let centre_gain = gain_db(&centre, &run_mono(values, sample_rate, &centre), 44100);
    let low_gain = gain_db(&low, &run_mono(values, sample_rate, &low), 44100);

    assert!((centre_gain - 12.0).abs() < 0.25, "1 kHz: {centre_gain} dB");
    assert!(low_gain.abs() < 1.0, "100 Hz: {low_gain} dB");
}

#[test]
fn test_steeper_low_cut_attenuates_more() {
    let sample_rate = 48000.0;
    let probe = sine(50.0, sample_rate, 96000, 0.5);

    let gains: Vec<f64> = Slope::ALL
        .into_iter()
        .map(|slope| {
            let values = ParameterValues {
                low_cut_freq: 100.0,
                low_cut_slope: slope,
                ..ParameterValues::default()
            };
            gain_db(&probe, &run_mono(values, sample_rate, &probe), 48000)
        })
        .collect();

    // One octave below a Butterworth corner: -10 log10(1 + 2^(2n))
    let expected = [-12.30, -24.10, -36.12, -48.17];
    for (gain, expected) in gains.iter().zip(expected) {
        assert!((gain - expected).abs() < 1.0, "{gain} dB, expected {expected} dB");
    }
}

#[test]
fn test_high_cut_48db_per_octave() {
    let sample_rate = 48000.0;
    let values = ParameterValues {
        high_cut_freq: 2000.0,
        high_cut_slope: Slope::Db48,
        ..ParameterValues::default()
    };

    let passband = sine(500.0, sample_rate, 48000, 0.5);
    let stopband = sine(4000.0, sample_rate, 48000, 0.5);
    let pass_gain = gain_db(&passband, &run_mono(values, sample_rate, &passband), 24000);
    let stop_gain = gain_db(&stopband, &run_mono(values, sample_rate, &stopband), 24000);

    assert!(pass_gain.abs() < 0.1, "500 Hz: {pass_gain} dB");
    assert!(stop_gain < -45.0, "4 kHz: {stop_gain} dB");
}

#[test]
fn test_flat_peak_and_open_cuts_are_transparent() {
    let values = ParameterValues {
        low_cut_freq: 20.0,
        high_cut_freq: 20000.0,
        peak_gain_db: 0.0,
        ..ParameterValues::default()
    };
    let input = sine(1000.0, 48000.0, 48000, 0.5);
    let gain = gain_db(&input, &run_mono(values, 48000.0, &input), 24000);
    assert!(gain.abs() < 0.01, "{gain} dB");
}

// ============================================================================
// CHANNELS
// ============================================================================

#[test]
fn test_chains_with_different_settings_stay_independent() {
    let sample_rate = 48000.0;
    let spec = ProcessSpec::new(sample_rate, 512, 2);

    let cut = ChainSettings {
        low_cut_freq: 400.0,
        low_cut_slope: Slope::Db24,
        ..ChainSettings::default()
    };
    let boost = ChainSettings {
        peak_freq: 3000.0,
        peak_gain_db: 9.0,
        ..ChainSettings::default()
    };

    let configure = |settings: &ChainSettings| {
        let mut chain = FilterChain::new();
        chain.prepare(&spec);
        chain.update_peak(design_peak(settings, sample_rate));
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
        chain.update_low_cut(&low_cut, settings.low_cut_slope.sections());
        chain.update_high_cut(&high_cut, settings.high_cut_slope.sections());
        chain
    };

    let mut left_chain = configure(&cut);
    let mut right_chain = configure(&boost);
    let mut left_alone = left_chain.clone();
    let mut right_alone = right_chain.clone();

    let left_in = noise(2048, 1);
    let right_in = noise(2048, 2);
    let mut frames = interleave(&left_in, &right_in);
    for frame in frames.chunks_mut(2) {
        frame[0] = left_chain.process_sample(frame[0]);
        frame[1] = right_chain.process_sample(frame[1]);
    }

    let mut left_ref = left_in.clone();
    let mut right_ref = right_in.clone();
    left_alone.process_block(&mut left_ref);
    right_alone.process_block(&mut right_ref);

    assert_eq!(frames, interleave(&left_ref, &right_ref));
}

#[test]
fn test_silent_channel_stays_silent() {
    let (_, mut eq) = processor_with(ParameterValues {
        peak_gain_db: 18.0,
        ..ParameterValues::default()
    });
    eq.prepare(48000.0, 256).unwrap();

    let mut left = noise(256, 5);
    let mut right = silence(256);
    eq.process_block(&mut [left.as_mut_slice(), right.as_mut_slice()]).unwrap();
    assert_eq!(right, silence(256));
    assert!(rms(&left) > 0.0);
}

#[test]
fn test_effect_interface_processes_interleaved_stereo() {
    let values = ParameterValues {
        low_cut_freq: 300.0,
        peak_gain_db: -6.0,
        ..ParameterValues::default()
    };
    let (_, mut planar) = processor_with(values);
    let (_, mut effect) = processor_with(values);
    planar.prepare(48000.0, 512).unwrap();
    effect.prepare(48000.0, 512).unwrap();

    let mut left = noise(512, 8);
    let mut right = noise(512, 9);
    let mut frames = interleave(&left, &right);

    planar.process_block(&mut [left.as_mut_slice(), right.as_mut_slice()]).unwrap();
    Effect::process(&mut effect, &mut frames).unwrap();
    assert_eq!(frames, interleave(&left, &right));
}

// ============================================================================
// LIFECYCLE AND LIVE CHANGES
// ============================================================================

#[test]
fn test_block_before_prepare_is_rejected_untouched() {
    let (_, mut eq) = processor_with(ParameterValues::default());
    let mut buffer = noise(128, 3);
    let original = buffer.clone();

    assert!(matches!(eq.process_block(&mut [buffer.as_mut_slice()]), Err(AudioError::NotPrepared)));
    assert!(matches!(eq.process_interleaved(&mut buffer, 2), Err(AudioError::NotPrepared)));
    assert_eq!(buffer, original);
    assert_eq!(eq.state(), ProcessorState::Unprepared);
}

#[test]
fn test_sample_rate_change_redesigns_and_resets() {
    let values = ParameterValues {
        peak_freq: 2000.0,
        peak_gain_db: 10.0,
        ..ParameterValues::default()
    };
    let (_, mut eq) = processor_with(values);
    eq.prepare(44100.0, 256).unwrap();
    let mut warmup = noise(256, 4);
    eq.process_block(&mut [warmup.as_mut_slice()]).unwrap();

    eq.prepare(96000.0, 256).unwrap();
    let (_, mut fresh) = processor_with(values);
    fresh.prepare(96000.0, 256).unwrap();

    let mut a = impulse(256);
    let mut b = impulse(256);
    eq.process_block(&mut [a.as_mut_slice()]).unwrap();
    fresh.process_block(&mut [b.as_mut_slice()]).unwrap();
    assert_eq!(a, b);

    let gain = eq.magnitude_at(2000.0).unwrap();
    assert!((20.0 * gain.log10() - 10.0).abs() < 0.05);
}

#[test]
fn test_empty_block_is_accepted() {
    let (_, mut eq) = processor_with(ParameterValues::default());
    eq.prepare(48000.0, 64).unwrap();
    let mut empty: Vec<f32> = Vec::new();
    eq.process_block(&mut [empty.as_mut_slice()]).unwrap();
    eq.process_interleaved(&mut empty, 2).unwrap();
}

#[test]
fn test_parameter_sweep_between_blocks_stays_bounded() {
    let (tree, mut eq) = processor_with(ParameterValues::default());
    eq.prepare(48000.0, 64).unwrap();

    let input = noise(64 * 400, 21);
    let mut output = input.clone();
    for (i, block) in output.chunks_mut(64).enumerate() {
        let position = (i % 100) as f32 / 99.0;
        tree.set_normalized(ParameterId::LowCutFreq, position);
        tree.set_normalized(ParameterId::HighCutFreq, 1.0 - position);
        tree.set_normalized(ParameterId::PeakFreq, position);
        tree.set(ParameterId::PeakGain, if i % 2 == 0 { 24.0 } else { -24.0 });
        tree.set(ParameterId::LowCutSlope, (i % 4) as f32);
        tree.set(ParameterId::HighCutSlope, (3 - i % 4) as f32);
        eq.process_block(&mut [block]).unwrap();
    }

    assert!(output.iter().all(|s| s.is_finite()));
    assert!(output.iter().all(|s| s.abs() < 1000.0));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_any_store_contents_produce_finite_output(
        low_cut in 0.0f32..30000.0,
        high_cut in 0.0f32..30000.0,
        peak in 0.0f32..30000.0,
        gain in -40.0f32..40.0,
        quality in 0.0f32..20.0,
        low_slope in 0usize..4,
        high_slope in 0usize..4,
        sample_rate in prop::sample::select(vec![22050.0f64, 44100.0, 48000.0, 96000.0, 192000.0]),
    ) {
        let values = ParameterValues {
            low_cut_freq: low_cut,
            low_cut_slope: Slope::ALL[low_slope],
            high_cut_freq: high_cut,
            high_cut_slope: Slope::ALL[high_slope],
            peak_freq: peak,
            peak_gain_db: gain,
            peak_quality: quality,
        };
        let output = run_mono(values, sample_rate, &noise(4096, 77));
        prop_assert!(output.iter().all(|s| s.is_finite()));
    }
}
