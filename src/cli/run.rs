//! `kiln run <name>...`: run selected pipelines once.

use anyhow::{Result, bail};

use super::build::{BuildLog, run_pipelines};
use crate::{config::ProjectConfig, core::BuildMode, pipeline::StageRunner};

pub fn run_named(config: &ProjectConfig, names: &[String], mode: BuildMode) -> Result<()> {
    let registry = config.build_registry()?;

    let unknown: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| registry.get(n).is_none())
        .collect();
    if !unknown.is_empty() {
        let known: Vec<&str> = registry.specs().iter().map(|s| s.name.as_str()).collect();
        bail!(
            "unknown pipeline(s): {} (declared: {})",
            unknown.join(", "),
            known.join(", ")
        );
    }

    let selection = registry.with_dependencies(names.iter().map(String::as_str));
    let runner = StageRunner::new(config.get_root(), config.ignore_globs());
    run_pipelines(
        &registry,
        &runner,
        Some(&selection),
        mode,
        config.build.sequential,
        &BuildLog,
    )
    .ensure_success()
}
