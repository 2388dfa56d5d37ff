//! sflash - Serial flash protocol engine front end
//!
//! Drives the SPI NOR and SPI NAND engines of `sflash-core` against the
//! in-memory parts of `sflash-dummy`. The emulated parts, the host I/O mode
//! and the busy-poll budget come from an optional TOML file; `--image`
//! keeps the array contents between runs.

mod cli;
mod commands;
mod config;
mod image;

use clap::Parser;
use cli::{Cli, Commands};
use config::Config;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Nor { image, command } => commands::nor::run(&config, image.as_deref(), command),
        Commands::Nand { image, command } => commands::nand::run(&config, image.as_deref(), command),
    }
}
