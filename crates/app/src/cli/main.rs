//! eqchain CLI Application

mod args;
mod commands;

use args::{Cli, Command};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Response {
            config,
            sample_rate,
            overrides,
            points,
            measured,
        } => commands::response(config, sample_rate, overrides, points, measured).await,
        Command::Devices => commands::devices(),
        Command::Run { config } => commands::run(config).await,
        Command::Init { config, force } => commands::init(config, force).await,
    }
}
