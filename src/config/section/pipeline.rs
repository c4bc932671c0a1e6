//! `[[pipeline]]` tables.
//!
//! # Example
//!
//! ```toml
//! [[pipeline]]
//! name = "scripts"
//! sources = ["app/vendor/js/*.js", "app/js/main.js"]
//! target = "app/js"
//! debounce_ms = 100
//! clean = ["app/js/main.min.js"]
//! stages = [
//!   { kind = "concat", file = "main.min.js" },
//!   { kind = "minify-js", mode = "production" },
//! ]
//! ```

use std::path::PathBuf;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::core::BuildMode;
use crate::pipeline::{Glob, PipelineSpec, RegistryError, ReloadMode};
use crate::stage::StageChain;

const fn default_debounce_ms() -> u64 {
    100
}

const fn yes() -> bool {
    true
}

/// One declared pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,

    /// Source globs relative to the project root.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Output directory relative to the project root.
    #[serde(default)]
    pub target: PathBuf,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// `false` makes the pipeline build-only.
    #[serde(default = "yes")]
    pub watch: bool,

    #[serde(default)]
    pub reload: ReloadMode,

    /// Globs removed before each run.
    #[serde(default)]
    pub clean: Vec<String>,

    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

/// One entry of `stages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(flatten)]
    pub kind: StageKind,

    /// Only run in this build mode.
    #[serde(default)]
    pub mode: Option<BuildMode>,

    /// Only apply to these extensions.
    #[serde(default)]
    pub only: Vec<String>,
}

fn default_prefix() -> String {
    "@@".into()
}

fn default_separator() -> String {
    "\n".into()
}

const fn default_quality() -> f32 {
    50.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StageKind {
    Include {
        #[serde(default = "default_prefix")]
        prefix: String,
        #[serde(default)]
        basepath: PathBuf,
        #[serde(default)]
        context: Map<String, Value>,
    },
    Concat {
        file: PathBuf,
        #[serde(default = "default_separator")]
        separator: String,
    },
    MinifyJs,
    MinifyCss,
    Image {
        #[serde(default = "yes")]
        webp: bool,
        #[serde(default = "yes")]
        avif: bool,
        #[serde(default = "default_quality")]
        quality: f32,
        #[serde(default)]
        keep_original: bool,
    },
    Newer {
        #[serde(default)]
        ext: Option<String>,
    },
    Command {
        command: Vec<String>,
        #[serde(default)]
        ext: Option<String>,
    },
    Rename {
        #[serde(default)]
        ext: Option<String>,
        #[serde(default)]
        suffix: Option<String>,
    },
}

impl PipelineConfig {
    /// Compile into an immutable spec.
    pub fn to_spec(&self) -> Result<PipelineSpec, RegistryError> {
        let invalid = |source| RegistryError::InvalidPattern {
            pipeline: self.name.clone(),
            source,
        };

        let sources: Vec<&str> = self.sources.iter().map(String::as_str).collect();
        let mut spec = PipelineSpec::new(&self.name, &sources).map_err(invalid)?;
        spec.clean = self
            .clean
            .iter()
            .map(|p| Glob::new(p))
            .collect::<Result<_, _>>()
            .map_err(invalid)?;

        Ok(spec
            .with_target(&self.target)
            .with_debounce_ms(self.debounce_ms)
            .with_depends_on(self.depends_on.iter().cloned())
            .with_watch(self.watch)
            .with_reload(self.reload)
            .with_stages(StageChain::from_configs(&self.stages)))
    }

    /// Report every problem with this table.
    pub fn validate(&self, index: usize, names: &FxHashSet<&str>, diag: &mut ConfigDiagnostics) {
        let field = |name: &str| FieldPath::indexed("pipeline", index, name);

        if self.name.trim().is_empty() {
            diag.error(field("name"), "pipeline name must not be empty");
        }

        if self.sources.is_empty() {
            diag.error_with_hint(
                field("sources"),
                format!("pipeline `{}` has no sources", self.name),
                "add at least one glob, e.g. \"app/scss/**/*.scss\"",
            );
        }
        for pattern in self.sources.iter().chain(&self.clean) {
            if let Err(e) = Glob::new(pattern) {
                diag.error(field("sources"), e.to_string());
            }
        }

        if self.target.is_absolute() {
            diag.error(field("target"), "target must be relative to the project root");
        }

        for dep in &self.depends_on {
            if dep == &self.name {
                diag.error(field("depends_on"), format!("`{dep}` depends on itself"));
            } else if !names.contains(dep.as_str()) {
                diag.error(field("depends_on"), format!("unknown pipeline `{dep}`"));
            }
        }

        for (i, stage) in self.stages.iter().enumerate() {
            stage.validate(field(&format!("stages[{i}]")), diag);
        }
    }
}

impl StageConfig {
    fn validate(&self, field: FieldPath, diag: &mut ConfigDiagnostics) {
        match &self.kind {
            StageKind::Command { command, .. } => match command.first() {
                None => diag.error(field, "command must not be empty"),
                Some(program) if which::which(program).is_err() => diag.warn(
                    field,
                    format!("`{program}` not found in PATH, runs will fail until installed"),
                ),
                Some(_) => {}
            },
            StageKind::Concat { file, .. } if file.as_os_str().is_empty() => {
                diag.error(field, "concat needs an output `file`");
            }
            StageKind::Image { quality, .. } if !(1.0..=100.0).contains(quality) => {
                diag.error(field, format!("quality {quality} is outside 1-100"));
            }
            StageKind::Image {
                webp: false,
                avif: false,
                keep_original: false,
                ..
            } => {
                diag.error(field, "image stage with webp, avif and keep_original all off drops every raster");
            }
            _ => {}
        }
    }
}
