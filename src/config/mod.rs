//! Project configuration management for `kiln.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build      # [build]
//! │   ├── pipeline   # [[pipeline]] and stage tables
//! │   ├── serve      # [serve]
//! │   └── watch      # [watch]
//! ├── types/         # ConfigError, ConfigDiagnostics, FieldPath
//! └── mod.rs         # ProjectConfig (this file)
//! ```
//!
//! The file is loaded once at startup. Pipelines become an immutable
//! [`PipelineRegistry`]; there is no runtime mutation API.

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{BuildConfig, PipelineConfig, ServeConfig, StageConfig, StageKind, WatchConfig};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::{
    cli::{Cli, Commands},
    log,
    pipeline::{Glob, PipelineRegistry},
    utils::path::normalize_path,
};
use anyhow::{Context, Result, bail};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing kiln.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Change detection settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Full build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Declared pipelines, in declaration order
    #[serde(default, rename = "pipeline")]
    pub pipelines: Vec<PipelineConfig>,
}

impl ProjectConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd to find the config file. The project root is
    /// the config file's parent directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let Some(config_path) = find_config_file(&cwd, &cli.config) else {
            bail!(
                "config file `{}` not found in {} or any parent directory",
                cli.config.display(),
                cwd.display()
            );
        };

        let config_path = normalize_path(&config_path);
        let mut config = Self::from_path(&config_path)?;
        config.root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.config_path = config_path;
        config.apply_command_options(cli);
        config.validate()?;

        Ok(config)
    }

    /// Apply command-specific overrides.
    fn apply_command_options(&mut self, cli: &Cli) {
        crate::logger::set_verbose(cli.verbose);

        if let Commands::Serve { interface, port, .. } = &cli.command {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} (ignored):", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Validate the whole file, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        if self.pipelines.is_empty() {
            diag.error_with_hint(
                FieldPath::new("pipeline"),
                "no pipelines declared",
                "add a [[pipeline]] table with a name and sources",
            );
        }

        let mut names = FxHashSet::default();
        for (i, pipeline) in self.pipelines.iter().enumerate() {
            if !names.insert(pipeline.name.as_str()) {
                diag.error(
                    FieldPath::indexed("pipeline", i, "name"),
                    format!("pipeline `{}` is declared twice", pipeline.name),
                );
            }
        }
        for (i, pipeline) in self.pipelines.iter().enumerate() {
            pipeline.validate(i, &names, &mut diag);
        }

        for pattern in &self.watch.ignore {
            if let Err(e) = Glob::new(pattern) {
                diag.error(FieldPath::new("watch.ignore"), e.to_string());
            }
        }
        if self.watch.queue_capacity == 0 {
            diag.error(FieldPath::new("watch.queue_capacity"), "must be at least 1");
        }
        if self.serve.port != 0 && self.serve.port == self.serve.ws_port {
            diag.error(
                FieldPath::new("serve.ws_port"),
                "live-reload port must differ from the HTTP port",
            );
        }

        diag.print_warnings();
        diag.into_result().map_err(ConfigError::Diagnostics)
    }

    /// Build the pipeline registry (duplicate names and cycles are fatal).
    pub fn build_registry(&self) -> Result<PipelineRegistry, ConfigError> {
        let specs = self
            .pipelines
            .iter()
            .map(PipelineConfig::to_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PipelineRegistry::from_specs(&self.root, specs)?)
    }

    /// Compiled `watch.ignore` globs (invalid ones were rejected by validation).
    pub fn ignore_globs(&self) -> Vec<Glob> {
        self.watch
            .ignore
            .iter()
            .filter_map(|p| Glob::new(p).ok())
            .collect()
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Join a path with the root directory.
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }
}

/// Parse a config snippet in tests, failing on unknown fields.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> ProjectConfig {
    let (parsed, ignored) = ProjectConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = r#"
[serve]
root = "app"

[[pipeline]]
name = "styles"
sources = ["app/scss/**/*.scss"]
target = "app/css"

[[pipeline]]
name = "pages"
sources = ["app/pages/*.html"]
target = "app"
depends_on = ["styles"]
"#;

    #[test]
    fn test_unknown_fields_collected() {
        let (_, ignored) =
            ProjectConfig::parse_with_ignored("[serve]\nport = 1\nwat = true\n[extra]\na = 1").unwrap();
        assert!(ignored.contains(&"serve.wat".to_string()));
        assert!(ignored.contains(&"extra".to_string()));
    }

    #[test]
    fn test_validate_ok() {
        let config = test_parse_config(SITE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_duplicate_and_empty() {
        let config = test_parse_config(
            "[[pipeline]]\nname = \"a\"\nsources = [\"*.js\"]\n[[pipeline]]\nname = \"a\"\nsources = [\"*.js\"]",
        );
        let Err(ConfigError::Diagnostics(diag)) = config.validate() else {
            panic!("expected diagnostics");
        };
        assert_eq!(diag.errors()[0].field.as_str(), "pipeline[1].name");

        let Err(ConfigError::Diagnostics(diag)) = test_parse_config("").validate() else {
            panic!("expected diagnostics");
        };
        assert_eq!(diag.errors()[0].field.as_str(), "pipeline");
    }

    #[test]
    fn test_build_registry() {
        let mut config = test_parse_config(SITE);
        config.root = PathBuf::from("/site");
        let registry = config.build_registry().unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.match_pipelines(Path::new("/site/app/scss/a.scss"))[0].name,
            "styles"
        );
    }

    #[test]
    fn test_build_registry_rejects_cycle() {
        let mut config = test_parse_config(
            "[[pipeline]]\nname = \"a\"\nsources = [\"a\"]\ndepends_on = [\"b\"]\n[[pipeline]]\nname = \"b\"\nsources = [\"b\"]\ndepends_on = [\"a\"]",
        );
        config.root = PathBuf::from("/site");
        let err = config.build_registry().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Registry(crate::pipeline::RegistryError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn test_toml_error() {
        assert!(matches!(
            ProjectConfig::parse_with_ignored("[[pipeline]\n"),
            Err(ConfigError::Toml(_))
        ));
    }
}
