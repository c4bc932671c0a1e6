//! Kiln - an incremental front-end asset pipeline with live reload.

mod cli;
mod config;
mod core;
mod embed;
mod freshness;
mod logger;
mod pipeline;
mod reload;
mod scheduler;
mod stage;
mod utils;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::ProjectConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = ProjectConfig::load(&cli)?;
    let mode = cli.mode();

    match &cli.command {
        Commands::Build { .. } => cli::build::build_all(&config, mode),
        Commands::Run { names, .. } => cli::run::run_named(&config, names, mode),
        Commands::Watch { .. } => cli::watch::watch(&config, mode),
        Commands::Serve { .. } => cli::serve::serve(&config, mode),
        Commands::Check => cli::check::check(&config),
    }
}
