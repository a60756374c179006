//! Command-line argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "eqchain")]
#[command(about = "Real-time parametric EQ: low cut, peak and high cut", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the magnitude response of the configured chain
    Response {
        /// Config file to start from (default: factory settings)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Sample rate to design for (default: the config's engine rate)
        #[arg(long)]
        sample_rate: Option<u32>,

        #[command(flatten)]
        overrides: ParameterOverrides,

        /// Number of log-spaced frequencies between 20 Hz and 20 kHz
        #[arg(long, default_value_t = 31)]
        points: usize,

        /// Also measure the response from the processed impulse (FFT)
        #[arg(long)]
        measured: bool,
    },

    /// List audio devices
    Devices,

    /// Run input -> EQ -> output until Ctrl+C, reloading the config on change
    Run {
        /// Config file (default: ~/.config/eqchain/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the factory-default config file
    Init {
        /// Config file (default: ~/.config/eqchain/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Per-parameter values taking precedence over the config file
#[derive(Args, Debug, Default)]
pub struct ParameterOverrides {
    /// Low-cut corner frequency in Hz
    #[arg(long)]
    pub low_cut: Option<f32>,

    /// Low-cut slope in dB/Oct (12, 24, 36 or 48)
    #[arg(long)]
    pub low_cut_slope: Option<u32>,

    /// High-cut corner frequency in Hz
    #[arg(long)]
    pub high_cut: Option<f32>,

    /// High-cut slope in dB/Oct (12, 24, 36 or 48)
    #[arg(long)]
    pub high_cut_slope: Option<u32>,

    /// Peak centre frequency in Hz
    #[arg(long)]
    pub peak: Option<f32>,

    /// Peak gain in dB
    #[arg(long, allow_negative_numbers = true)]
    pub peak_gain: Option<f32>,

    /// Peak quality (Q)
    #[arg(long)]
    pub peak_q: Option<f32>,
}
