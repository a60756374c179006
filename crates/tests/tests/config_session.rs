//! Config file -> parameter store -> processor integration

use eqchain_core::domain::{
    AudioBlockProcessor, ConfigManager, EqConfig, ParameterId, ParameterTree, Slope,
};
use eqchain_tests::noise;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_edited_config_reaches_next_block() {
    let temp_dir = TempDir::new().unwrap();
    let manager = ConfigManager::new(temp_dir.path().to_path_buf());
    let config = manager.load().await;

    let tree = Arc::new(ParameterTree::with_values(&config.parameters));
    let mut eq = AudioBlockProcessor::new(Arc::clone(&tree));
    eq.prepare(f64::from(config.engine.sample_rate), config.engine.block_size as usize)
        .unwrap();

    let mut block = noise(config.engine.block_size as usize, 1);
    eq.process_block(&mut [block.as_mut_slice()]).unwrap();
    assert_eq!(eq.left_chain().high_cut().active_sections(), 1);

    let edited = r#"
[engine]
sample_rate = 48000
block_size = 512

[parameters]
high_cut_freq = 8000.0
high_cut_slope = 36
peak_gain_db = -30.0
"#;
    tokio::fs::write(manager.config_path(), edited).await.unwrap();

    let reloaded = manager.reload().await.unwrap();
    reloaded.apply_to(&tree);
    eq.process_block(&mut [block.as_mut_slice()]).unwrap();

    assert_eq!(eq.left_chain().high_cut().active_sections(), 3);
    assert_eq!(eq.settings().high_cut_slope, Slope::Db36);
    assert_eq!(eq.settings().high_cut_freq, 8000.0);
    // Clamped by the store on the way in
    assert_eq!(tree.get(ParameterId::PeakGain), -24.0);
    assert_eq!(eq.settings().peak_gain_db, -24.0);
}

#[tokio::test]
async fn test_broken_edit_keeps_live_values() {
    let temp_dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_path(temp_dir.path().join("session.toml"));
    let mut config = EqConfig::factory_default();
    config.parameters.peak_gain_db = 4.5;
    manager.save(&config).await.unwrap();

    let tree = ParameterTree::with_values(&manager.reload().await.unwrap().parameters);
    assert_eq!(tree.get(ParameterId::PeakGain), 4.5);

    tokio::fs::write(manager.config_path(), "[parameters]\npeak_gain_db = \"loud\"\n")
        .await
        .unwrap();
    assert!(manager.reload().await.is_err());
    assert_eq!(tree.get(ParameterId::PeakGain), 4.5);
}

#[tokio::test]
async fn test_snapshot_saved_and_restored() {
    let temp_dir = TempDir::new().unwrap();
    let manager = ConfigManager::new(temp_dir.path().to_path_buf());

    let live = ParameterTree::new();
    live.set(ParameterId::LowCutFreq, 95.4);
    live.set(ParameterId::LowCutSlope, 2.0);
    live.set(ParameterId::PeakQuality, 2.5);

    let config = EqConfig {
        parameters: live.snapshot(),
        ..EqConfig::factory_default()
    };
    manager.save(&config).await.unwrap();

    let restored = ParameterTree::new();
    manager.reload().await.unwrap().apply_to(&restored);
    assert_eq!(restored.snapshot(), live.snapshot());
    assert_eq!(restored.get(ParameterId::LowCutFreq), 95.0);
}
