//! Subcommand implementations

use crate::args::ParameterOverrides;
use anyhow::{bail, Context};
use eqchain_core::domain::audio::AudioEnumerator;
use eqchain_core::domain::{
    gain_to_db, AudioBlockProcessor, ConfigManager, ConfigWatcher, EqConfig, ParameterId,
    ParameterTree, Slope,
};
use eqchain_infra::analysis::{log_frequencies, MeasuredResponse, DEFAULT_FFT_SIZE};
use eqchain_infra::audio::{CpalEnumerator, EqStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

fn manager_for(path: Option<PathBuf>) -> anyhow::Result<ConfigManager> {
    match path {
        Some(path) => Ok(ConfigManager::with_path(path)),
        None => ConfigManager::user_default().context("Failed to locate the config directory"),
    }
}

fn slope_from_flag(db_per_octave: u32) -> anyhow::Result<Slope> {
    Slope::try_from(db_per_octave).map_err(anyhow::Error::msg)
}

/// Publish command-line overrides into the store
///
/// Continuous values are clamped by the store; an unknown slope is an error.
pub fn apply_overrides(tree: &ParameterTree, overrides: &ParameterOverrides) -> anyhow::Result<()> {
    let continuous = [
        (ParameterId::LowCutFreq, overrides.low_cut),
        (ParameterId::HighCutFreq, overrides.high_cut),
        (ParameterId::PeakFreq, overrides.peak),
        (ParameterId::PeakGain, overrides.peak_gain),
        (ParameterId::PeakQuality, overrides.peak_q),
    ];
    for (id, value) in continuous {
        if let Some(value) = value {
            let stored = tree.set(id, value);
            if stored != value {
                warn!("{} = {} is out of range, using {}", id, value, stored);
            }
        }
    }

    let slopes = [
        (ParameterId::LowCutSlope, overrides.low_cut_slope),
        (ParameterId::HighCutSlope, overrides.high_cut_slope),
    ];
    for (id, value) in slopes {
        if let Some(db_per_octave) = value {
            let slope = slope_from_flag(db_per_octave)?;
            tree.set(id, slope.index() as f32);
        }
    }
    Ok(())
}

fn print_parameters(tree: &ParameterTree) {
    for spec in tree.layout().iter() {
        println!("  {:<14} {}", spec.name(), spec.display(tree.get(spec.id)));
    }
}

pub async fn response(
    config: Option<PathBuf>,
    sample_rate: Option<u32>,
    overrides: ParameterOverrides,
    points: usize,
    measured: bool,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => EqConfig::load_from_file(&path)
            .await
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => EqConfig::factory_default(),
    };
    let sample_rate = f64::from(sample_rate.unwrap_or(config.engine.sample_rate));

    let tree = Arc::new(ParameterTree::with_values(&config.parameters));
    apply_overrides(&tree, &overrides)?;

    let mut processor = AudioBlockProcessor::new(Arc::clone(&tree));
    processor.prepare(sample_rate, DEFAULT_FFT_SIZE)?;

    let measurement = if measured {
        let mut probe = AudioBlockProcessor::new(Arc::clone(&tree));
        probe.prepare(sample_rate, DEFAULT_FFT_SIZE)?;
        Some(MeasuredResponse::measure(sample_rate, DEFAULT_FFT_SIZE, |buffer| {
            probe.process_block(&mut [buffer])
        })?)
    } else {
        None
    };

    println!("Chain at {:.0} Hz:", sample_rate);
    print_parameters(&tree);
    println!();

    match &measurement {
        Some(_) => println!("{:>10}  {:>10}  {:>10}", "Hz", "designed", "measured"),
        None => println!("{:>10}  {:>10}", "Hz", "dB"),
    }

    let nyquist = sample_rate * 0.5;
    for freq in log_frequencies(20.0, 20000.0, points) {
        if freq >= nyquist {
            break;
        }
        let designed = processor.magnitude_at(freq).map(gain_to_db).unwrap_or(f64::NAN);
        match &measurement {
            Some(m) => println!(
                "{:>10.1}  {:>10.2}  {:>10.2}",
                freq,
                designed,
                m.magnitude_db_at(freq)
            ),
            None => println!("{:>10.1}  {:>10.2}", freq, designed),
        }
    }

    Ok(())
}

pub fn devices() -> anyhow::Result<()> {
    let enumerator = CpalEnumerator::new();
    let devices = enumerator.devices()?;

    if devices.is_empty() {
        println!("No audio devices found");
        return Ok(());
    }

    for device in devices {
        let rate = device
            .default_sample_rate
            .map(|sr| format!("{} Hz", sr.hz()))
            .unwrap_or_else(|| "-".to_string());
        let channels: Vec<String> = device
            .channel_counts
            .iter()
            .map(|c| c.count().to_string())
            .collect();
        println!(
            "{:<8} {:<40} default {:<10} channels [{}]",
            format!("{:?}", device.device_type),
            device.name,
            rate,
            channels.join(", ")
        );
    }
    Ok(())
}

pub async fn init(config: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let manager = manager_for(config)?;
    manager
        .init(force)
        .await
        .with_context(|| format!("Failed to write {}", manager.config_path().display()))?;
    println!("Wrote {}", manager.config_path().display());
    Ok(())
}

pub async fn run(config: Option<PathBuf>) -> anyhow::Result<()> {
    let manager = manager_for(config)?;
    let config = manager.load().await;

    let tree = Arc::new(ParameterTree::with_values(&config.parameters));
    let processor = AudioBlockProcessor::new(Arc::clone(&tree));
    let stream = EqStream::start(&config.engine, processor).context("Failed to start audio")?;

    let watcher = ConfigWatcher::new(manager.config_path().to_path_buf()).await?;
    let mut changes = watcher.subscribe();
    let mut stats_tick = tokio::time::interval(Duration::from_secs(5));
    let mut last_underruns = 0;

    info!(
        path = %manager.config_path().display(),
        "Running; edit the config file to change parameters, Ctrl+C to stop"
    );

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Stopping");
                break;
            }
            change = changes.recv() => match change {
                Ok(path) => {
                    debug!(path = %path.display(), "Config changed");
                    match manager.reload().await {
                        Ok(updated) => {
                            if updated.engine != config.engine {
                                warn!("Engine settings changed; restart to apply them");
                            }
                            updated.apply_to(&tree);
                            info!("Parameters reloaded");
                        }
                        Err(e) => warn!("Ignoring config change: {}", e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Coalesced config events"),
                Err(RecvError::Closed) => bail!("Config watcher stopped"),
            },
            _ = stats_tick.tick() => {
                let stats = stream.stats();
                let underruns = stats.underruns();
                if underruns > last_underruns {
                    warn!(
                        underruns = underruns - last_underruns,
                        overruns = stats.overruns(),
                        "Audio dropouts"
                    );
                    last_underruns = underruns;
                }
                debug!(blocks = stats.processed_blocks(), "Stream alive");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_are_clamped_into_store() {
        let tree = ParameterTree::new();
        let overrides = ParameterOverrides {
            low_cut: Some(150.0),
            low_cut_slope: Some(48),
            peak_gain: Some(30.0),
            ..ParameterOverrides::default()
        };
        apply_overrides(&tree, &overrides).unwrap();

        assert_eq!(tree.get(ParameterId::LowCutFreq), 150.0);
        assert_eq!(tree.get(ParameterId::LowCutSlope), 3.0);
        assert_eq!(tree.get(ParameterId::PeakGain), 24.0);
        assert_eq!(tree.get(ParameterId::PeakFreq), 750.0);
    }

    #[test]
    fn test_bad_slope_flag_rejected() {
        let tree = ParameterTree::new();
        let overrides = ParameterOverrides {
            high_cut_slope: Some(20),
            ..ParameterOverrides::default()
        };
        assert!(apply_overrides(&tree, &overrides).is_err());
        assert_eq!(tree.get(ParameterId::HighCutSlope), 0.0);
    }
}
