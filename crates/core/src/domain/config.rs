//! Configuration management for eqchain
//!
//! This module provides:
//! - The TOML session file (`[engine]` settings plus the raw `[parameters]`)
//! - `ConfigManager` for the per-user config file with factory defaults
//! - Hot-reload support via file system watcher

use crate::domain::params::{ParameterTree, ParameterValues};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Audio engine settings for live sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Requested sample rate in Hz
    pub sample_rate: u32,

    /// Requested buffer size in frames
    pub block_size: u32,

    /// Input device name (None = system default)
    pub input_device: Option<String>,

    /// Output device name (None = system default)
    pub output_device: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 512,
            input_device: None,
            output_device: None,
        }
    }
}

/// Complete eqchain configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqConfig {
    pub engine: EngineConfig,
    pub parameters: ParameterValues,
}

impl EqConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config = Self::from_toml(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no session can run with
    ///
    /// Parameter values are not range-checked here; the parameter store
    /// clamps them when they are applied.
    pub fn validate(&self) -> Result<()> {
        if self.engine.sample_rate == 0 {
            return Err(ConfigError::Invalid("engine.sample_rate must be positive".to_string()));
        }
        if self.engine.block_size == 0 {
            return Err(ConfigError::Invalid("engine.block_size must be positive".to_string()));
        }
        let p = &self.parameters;
        let controls = [
            ("low_cut_freq", p.low_cut_freq),
            ("high_cut_freq", p.high_cut_freq),
            ("peak_freq", p.peak_freq),
            ("peak_gain_db", p.peak_gain_db),
            ("peak_quality", p.peak_quality),
        ];
        if let Some((name, value)) = controls.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ConfigError::Invalid(format!("parameters.{name} is not finite ({value})")));
        }
        Ok(())
    }

    /// Publish the stored parameter values to a live store
    pub fn apply_to(&self, tree: &ParameterTree) {
        tree.load(&self.parameters);
    }

    /// Create factory default configuration
    pub fn factory_default() -> Self {
        Self::default()
    }
}

/// File system watcher for hot-reload
///
/// Watches the directory holding a config file and reports create/modify
/// events that touch that file.
pub struct ConfigWatcher {
    _watcher: notify::RecommendedWatcher,
    config_tx: broadcast::Sender<PathBuf>,
    path: PathBuf,
}

impl ConfigWatcher {
    /// Create a new config watcher for `config_path`
    pub async fn new(config_path: PathBuf) -> Result<Self> {
        use notify::Watcher;

        let (config_tx, _config_rx) = broadcast::channel(32);

        let watch_dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&watch_dir).await?;

        let file_name = config_path.file_name().map(|n| n.to_os_string());
        let tx_clone = config_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                ) {
                    for path in event.paths {
                        if path.file_name().map(|n| n.to_os_string()) == file_name {
                            // No subscriber is not an error; the session may not listen yet
                            if tx_clone.receiver_count() > 0 {
                                if let Err(e) = tx_clone.send(path) {
                                    error!("Failed to send config change event: {}", e);
                                }
                            }
                        }
                    }
                }
            }
        })?;

        watcher.watch(&watch_dir, notify::RecursiveMode::NonRecursive)?;

        info!(
            path = %config_path.display(),
            "Config watcher started"
        );

        Ok(Self {
            _watcher: watcher,
            config_tx,
            path: config_path,
        })
    }

    /// Subscribe to config change events
    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.config_tx.subscribe()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Configuration manager for the main eqchain config
///
/// Manages the configuration file at `~/.config/eqchain/config.toml` unless
/// an explicit path is given.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a manager for `config.toml` inside `config_dir`
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            config_path: config_dir.join("config.toml"),
        }
    }

    /// Create a manager for an explicit file path
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Manager for the per-user default location
    pub fn user_default() -> Result<Self> {
        Ok(Self::new(Self::default_config_dir()?))
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/eqchain` on Linux, the platform equivalent elsewhere
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("eqchain"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    /// Get the config file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// If the config file doesn't exist, writes and returns factory default.
    /// If the config file is corrupt, backs it up, logs an error and returns
    /// factory default.
    #[instrument(skip(self))]
    pub async fn load(&self) -> EqConfig {
        if !self.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            let config = EqConfig::factory_default();
            if let Err(e) = config.save_to_file(&self.config_path).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }

            return config;
        }

        match EqConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                EqConfig::factory_default()
            }
        }
    }

    /// Re-read the file for a hot reload
    ///
    /// Unlike [`load`](Self::load) this never substitutes defaults: a half
    /// written or broken file is reported so the live session keeps its
    /// current values.
    pub async fn reload(&self) -> Result<EqConfig> {
        EqConfig::load_from_file(&self.config_path).await
    }

    /// Save configuration to file
    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &EqConfig) -> Result<()> {
        config.save_to_file(&self.config_path).await
    }

    /// Write factory defaults, refusing to replace an existing file unless `force`
    #[instrument(skip(self))]
    pub async fn init(&self, force: bool) -> Result<EqConfig> {
        if self.exists() && !force {
            return Err(ConfigError::Invalid(format!(
                "{} already exists",
                self.config_path.display()
            )));
        }
        let config = EqConfig::factory_default();
        self.save(&config).await?;
        Ok(config)
    }

    /// Delete the config file
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        if self.exists() {
            fs::remove_file(&self.config_path).await?;
            info!(
                path = %self.config_path.display(),
                "Configuration cleared"
            );
        }

        Ok(())
    }

    /// Check if config file exists
    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}
