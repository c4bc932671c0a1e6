//! Pipeline execution.
//!
//! The scheduler hands a [`RunRequest`] to a [`PipelineRunner`] and only looks
//! at the boolean outcome and error message. [`StageRunner`] is the real
//! implementation: collect sources, apply the stage chain, write outputs.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jwalk::WalkDir;
use rustc_hash::FxHashSet;

use super::glob::{Glob, to_slash};
use super::spec::PipelineSpec;
use crate::core::BuildMode;
use crate::stage::{Asset, StageContext, TransformError};

const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// One requested execution of a pipeline.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub pipeline: Arc<PipelineSpec>,
    /// Deduplicated paths whose changes triggered this run (empty for builds).
    pub changed: BTreeSet<PathBuf>,
    pub mode: BuildMode,
}

impl RunRequest {
    pub fn new(pipeline: Arc<PipelineSpec>, mode: BuildMode) -> Self {
        Self {
            pipeline,
            changed: BTreeSet::new(),
            mode,
        }
    }

    pub fn with_changed(mut self, changed: BTreeSet<PathBuf>) -> Self {
        self.changed = changed;
        self
    }

    pub fn name(&self) -> &str {
        &self.pipeline.name
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// Absolute paths of files written (unchanged outputs are not rewritten).
    pub written: Vec<PathBuf>,
}

/// Executes a pipeline's transform chain.
pub trait PipelineRunner: Send + Sync + 'static {
    fn run(&self, request: &RunRequest) -> Result<RunOutput, TransformError>;
}

/// Reads sources from disk, runs the stage chain and writes to `target`.
#[derive(Debug, Clone)]
pub struct StageRunner {
    root: PathBuf,
    ignore: Vec<Glob>,
}

impl StageRunner {
    pub fn new(root: impl Into<PathBuf>, ignore: Vec<Glob>) -> Self {
        Self {
            root: root.into(),
            ignore,
        }
    }

    fn is_ignored(&self, rel: &str) -> bool {
        self.ignore.iter().any(|g| g.is_match(rel))
    }

    /// Files under the glob's literal base that match it, sorted.
    fn walk(&self, glob: &Glob) -> Vec<(PathBuf, String)> {
        let base = self.root.join(glob.base());
        if !base.is_dir() {
            return Vec::new();
        }

        let mut files: Vec<(PathBuf, String)> = WalkDir::new(&base)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                let name = e.file_name().to_str().unwrap_or_default();
                !IGNORED_FILES.contains(&name)
            })
            .filter_map(|e| {
                let path = e.path();
                let rel = to_slash(path.strip_prefix(&self.root).ok()?);
                (glob.is_match(&rel) && !self.is_ignored(&rel)).then_some((path, rel))
            })
            .collect();
        files.sort();
        files
    }

    /// Every source of the pipeline, in glob order, each file once.
    ///
    /// Asset paths are relative to the base of the glob that found them.
    pub fn collect_sources(&self, spec: &PipelineSpec) -> Result<Vec<Asset>, TransformError> {
        let mut seen = FxHashSet::default();
        let mut assets = Vec::new();

        for glob in &spec.sources {
            for (path, _) in self.walk(glob) {
                if !seen.insert(path.clone()) {
                    continue;
                }
                let rel = path
                    .strip_prefix(self.root.join(glob.base()))
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| path.clone());
                let contents = fs::read(&path).map_err(|e| {
                    TransformError::new("read", format!("{}: {e}", path.display()))
                })?;
                assets.push(Asset::from_source(rel, contents, path));
            }
        }
        Ok(assets)
    }

    fn clean(&self, spec: &PipelineSpec) -> Result<(), TransformError> {
        for glob in &spec.clean {
            for (path, rel) in self.walk(glob) {
                crate::debug!("clean"; "{}: remove {}", spec.name, rel);
                fs::remove_file(&path).map_err(|e| {
                    TransformError::new("clean", format!("{}: {e}", path.display()))
                })?;
            }
        }
        Ok(())
    }

    fn write(&self, target: &Path, assets: Vec<Asset>) -> Result<RunOutput, TransformError> {
        let mut output = RunOutput::default();
        for asset in assets {
            let dest = target.join(&asset.path);
            if fs::read(&dest).is_ok_and(|existing| existing == asset.contents) {
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
            }
            fs::write(&dest, &asset.contents).map_err(|e| write_error(&dest, e))?;
            output.written.push(dest);
        }
        Ok(output)
    }
}

fn write_error(path: &Path, err: std::io::Error) -> TransformError {
    TransformError::new("write", format!("{}: {err}", path.display()))
}

impl PipelineRunner for StageRunner {
    fn run(&self, request: &RunRequest) -> Result<RunOutput, TransformError> {
        let spec = &request.pipeline;
        self.clean(spec)?;

        let assets = self.collect_sources(spec)?;
        let target = self.root.join(&spec.target);
        let ctx = StageContext {
            pipeline: &spec.name,
            root: &self.root,
            target: &target,
            mode: request.mode,
        };
        crate::debug!("run"; "{}: {} sources, {} changed", spec.name, assets.len(), request.changed.len());

        let assets = spec.stages.run(assets, &ctx)?;
        self.write(&target, assets)
    }
}
