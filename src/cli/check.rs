//! `kiln check`: validate the config and show the dependency order.

use anyhow::Result;

use crate::{
    config::ProjectConfig,
    log,
    pipeline::{PipelineRegistry, ReloadMode},
};

pub fn check(config: &ProjectConfig) -> Result<()> {
    let registry = config.build_registry()?;
    log!("check"; "{} is valid", config.config_path.display());
    for line in describe(&registry) {
        println!("{line}");
    }
    Ok(())
}

/// One line per pipeline, dependencies first.
fn describe(registry: &PipelineRegistry) -> Vec<String> {
    registry
        .topo_order()
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let sources: Vec<&str> = spec.sources.iter().map(|g| g.as_str()).collect();
            let mut line = format!(
                "{:>2}. {} [{}] -> {}",
                i + 1,
                spec.name,
                sources.join(", "),
                spec.target.display()
            );
            if !spec.depends_on.is_empty() {
                line.push_str(&format!(" (after {})", spec.depends_on.join(", ")));
            }
            if !spec.watch {
                line.push_str(" (build only)");
            } else if spec.reload != ReloadMode::Reload {
                line.push_str(&format!(" (reload: {})", spec.reload.as_str()));
            }
            line
        })
        .collect()
}
