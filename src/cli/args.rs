//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::BuildMode;

/// Kiln incremental asset pipeline
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: kiln.toml)
    #[arg(short = 'C', long, global = true, default_value = "kiln.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run every pipeline once
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        mode: ModeArgs,
    },

    /// Run the named pipelines (and their dependencies) once
    #[command(visible_alias = "r")]
    Run {
        /// Pipeline names
        #[arg(required = true, value_name = "PIPELINE")]
        names: Vec<String>,

        #[command(flatten)]
        mode: ModeArgs,
    },

    /// Build, then rebuild pipelines as their sources change
    #[command(visible_alias = "w")]
    Watch {
        #[command(flatten)]
        mode: ModeArgs,
    },

    /// Watch plus a static server with live reload
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        mode: ModeArgs,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate the config and print pipelines in dependency order
    #[command(visible_alias = "c")]
    Check,
}

/// Shared build mode flag
#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct ModeArgs {
    /// Build for production (enables production-only stages)
    #[arg(short = 'P', long)]
    pub production: bool,
}

impl Cli {
    /// Build mode selected by the subcommand (development for `check`).
    pub fn mode(&self) -> BuildMode {
        match self.command {
            Commands::Build { mode }
            | Commands::Run { mode, .. }
            | Commands::Watch { mode }
            | Commands::Serve { mode, .. } => BuildMode::from_production(mode.production),
            Commands::Check => BuildMode::Development,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["kiln", "serve", "--port", "8080", "-i", "0.0.0.0"]);
        let Commands::Serve { port, interface, .. } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(port, Some(8080));
        assert_eq!(interface, Some("0.0.0.0".parse().unwrap()));
        assert_eq!(cli.config, PathBuf::from("kiln.toml"));
    }

    #[test]
    fn test_mode_from_flag() {
        let cli = Cli::parse_from(["kiln", "build", "--production"]);
        assert_eq!(cli.mode(), BuildMode::Production);

        let cli = Cli::parse_from(["kiln", "run", "styles", "scripts", "-V"]);
        assert_eq!(cli.mode(), BuildMode::Development);
        assert!(cli.verbose);
        let Commands::Run { names, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(names, ["styles", "scripts"]);
    }

    #[test]
    fn test_run_requires_names() {
        assert!(Cli::try_parse_from(["kiln", "run"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["kiln", "check", "-C", "other.toml"]);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert_eq!(cli.mode(), BuildMode::Development);
    }
}
