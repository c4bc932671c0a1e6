use std::path::{Path, PathBuf};
use std::time::Duration;

use super::glob::{Glob, GlobError};
use crate::stage::StageChain;

/// How a connected client reacts to a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMode {
    /// Full page reload.
    #[default]
    Reload,
    /// Hot-swap stylesheets, reload for anything else.
    Inject,
    /// Report only.
    None,
}

impl ReloadMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reload => "reload",
            Self::Inject => "inject",
            Self::None => "none",
        }
    }
}

/// Immutable declaration of a named build pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub name: String,
    pub sources: Vec<Glob>,
    pub target: PathBuf,
    pub debounce: Duration,
    pub depends_on: Vec<String>,
    /// Build-only pipelines are never triggered by change events.
    pub watch: bool,
    pub reload: ReloadMode,
    /// Globs removed (relative to the root) before each run.
    pub clean: Vec<Glob>,
    pub stages: StageChain,
}

impl PipelineSpec {
    pub fn new(name: impl Into<String>, sources: &[&str]) -> Result<Self, GlobError> {
        let sources = sources
            .iter()
            .map(|p| Glob::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.into(),
            sources,
            target: PathBuf::new(),
            debounce: Duration::from_millis(100),
            depends_on: Vec::new(),
            watch: true,
            reload: ReloadMode::default(),
            clean: Vec::new(),
            stages: StageChain::default(),
        })
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce = Duration::from_millis(ms);
        self
    }

    pub fn with_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target(mut self, target: impl AsRef<Path>) -> Self {
        self.target = target.as_ref().to_path_buf();
        self
    }

    pub fn with_stages(mut self, stages: StageChain) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_reload(mut self, reload: ReloadMode) -> Self {
        self.reload = reload;
        self
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Whether any source pattern matches the `/` separated relative path.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.sources.iter().any(|g| g.is_match(rel_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_any_source() {
        let spec = PipelineSpec::new("scripts", &["app/vendor/js/*.js", "app/js/main.js"]).unwrap();
        assert!(spec.matches("app/js/main.js"));
        assert!(spec.matches("app/vendor/js/bootstrap.bundle.min.js"));
        assert!(!spec.matches("app/js/other.js"));
    }

    #[test]
    fn test_invalid_source_rejected() {
        assert!(PipelineSpec::new("bad", &["app/{a,b"]).is_err());
    }

    #[test]
    fn test_reload_mode_parse() {
        #[derive(serde::Deserialize)]
        struct Wrap {
            reload: ReloadMode,
        }
        let w: Wrap = toml::from_str("reload = \"inject\"").unwrap();
        assert_eq!(w.reload, ReloadMode::Inject);
    }
}
