//! One-shot builds.
//!
//! Pipelines run in dependency waves: every pipeline whose dependencies have
//! finished joins the next wave, and a wave runs in parallel on rayon unless
//! `build.sequential` is set. Dependents of a failed pipeline are skipped.

use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    config::ProjectConfig,
    core::BuildMode,
    log,
    pipeline::{PipelineRegistry, PipelineRunner, PipelineSpec, RunRequest, StageRunner},
    reload::Notifier,
    scheduler::{PipelineRun, RunState, execute},
    utils::path::normalize_path,
};

/// Outcome of a one-shot build, in completion order.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub runs: Vec<PipelineRun>,
}

impl BuildReport {
    pub fn failed(&self) -> impl Iterator<Item = &PipelineRun> {
        self.runs.iter().filter(|r| r.state != RunState::Succeeded)
    }

    /// Error naming every pipeline that did not succeed.
    pub fn ensure_success(&self) -> Result<()> {
        let failed: Vec<&str> = self.failed().map(PipelineRun::name).collect();
        if !failed.is_empty() {
            bail!(
                "{} of {} pipeline(s) did not succeed: {}",
                failed.len(),
                self.runs.len(),
                failed.join(", ")
            );
        }
        Ok(())
    }
}

/// Prints each finished run as a log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildLog;

impl Notifier for BuildLog {
    fn on_run_result(&self, run: &PipelineRun) {
        let name = run.name();
        match run.state {
            RunState::Succeeded => {
                let millis = run.duration().map_or(0, |d| d.as_millis());
                log!("build"; "{} ({} ms, {} written)", name, millis, run.output.written.len());
            }
            RunState::Failed | RunState::Skipped => {
                let detail = run.error_message().unwrap_or_default();
                log!("error"; "{}: {}", name, detail);
            }
            RunState::Pending | RunState::Running => {}
        }
    }
}

/// `kiln build`: clean, then run every pipeline once.
pub fn build_all(config: &ProjectConfig, mode: BuildMode) -> Result<()> {
    let registry = config.build_registry()?;
    clean_outputs(config)?;

    let runner = StageRunner::new(config.get_root(), config.ignore_globs());
    let start = Instant::now();
    let report = run_pipelines(
        &registry,
        &runner,
        None,
        mode,
        config.build.sequential,
        &BuildLog,
    );
    log!(
        "build";
        "{} pipeline(s) in {} ms ({})",
        report.runs.len(),
        start.elapsed().as_millis(),
        mode
    );
    report.ensure_success()
}

/// Remove `build.clean` paths. Paths outside the project root are refused.
pub fn clean_outputs(config: &ProjectConfig) -> Result<()> {
    let root = normalize_path(config.get_root());
    for entry in &config.build.clean {
        let path = normalize_path(&config.root_join(entry));
        if !path.starts_with(&root) || path == root {
            bail!("refusing to clean `{}`: not inside the project root", entry.display());
        }
        if path.is_dir() {
            fs::remove_dir_all(&path)
                .with_context(|| format!("failed to clean {}", path.display()))?;
        } else if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed to clean {}", path.display()))?;
        } else {
            continue;
        }
        crate::debug!("build"; "cleaned {}", entry.display());
    }
    Ok(())
}

/// Run pipelines once in dependency order.
///
/// `only` restricts the build to a set of names; dependencies outside the
/// set are treated as already satisfied.
pub fn run_pipelines(
    registry: &PipelineRegistry,
    runner: &dyn PipelineRunner,
    only: Option<&FxHashSet<String>>,
    mode: BuildMode,
    sequential: bool,
    notifier: &dyn Notifier,
) -> BuildReport {
    let selected = |name: &str| only.is_none_or(|set| set.contains(name));

    let mut remaining: Vec<Arc<PipelineSpec>> = registry
        .topo_order()
        .into_iter()
        .filter(|s| selected(&s.name))
        .collect();
    let mut outcomes: FxHashMap<String, RunState> = FxHashMap::default();
    let mut report = BuildReport::default();

    while !remaining.is_empty() {
        let mut wave = Vec::new();
        let mut blocked = Vec::new();

        for spec in remaining {
            let failed_dep = spec.depends_on.iter().find(|d| {
                matches!(outcomes.get(d.as_str()), Some(RunState::Failed | RunState::Skipped))
            });
            if let Some(dep) = failed_dep {
                let run = PipelineRun::skipped(Arc::clone(&spec), BTreeSet::new(), dep, Instant::now());
                notifier.on_run_result(&run);
                outcomes.insert(spec.name.clone(), RunState::Skipped);
                report.runs.push(run);
                continue;
            }

            let ready = spec
                .depends_on
                .iter()
                .all(|d| !selected(d) || outcomes.contains_key(d.as_str()));
            // Sequential builds take one pipeline per wave, in declared order
            if ready && !(sequential && !wave.is_empty()) {
                wave.push(spec);
            } else {
                blocked.push(spec);
            }
        }

        if wave.is_empty() {
            // Unreachable with an acyclic registry
            break;
        }

        let request = |spec: &Arc<PipelineSpec>| RunRequest::new(Arc::clone(spec), mode);
        let runs: Vec<PipelineRun> = if sequential {
            wave.iter().map(|spec| execute(runner, request(spec))).collect()
        } else {
            wave.par_iter().map(|spec| execute(runner, request(spec))).collect()
        };

        for run in runs {
            notifier.on_run_result(&run);
            outcomes.insert(run.name().to_string(), run.state);
            report.runs.push(run);
        }
        remaining = blocked;
    }

    report
}
