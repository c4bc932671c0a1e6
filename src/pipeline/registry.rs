//! Pipeline Registry.
//!
//! Holds every declared pipeline for the lifetime of the process and answers
//! "which pipelines care about this path". Registration rejects duplicate
//! names and dependency cycles so an invalid configuration never starts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use super::glob::{GlobError, to_slash};
use super::spec::PipelineSpec;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("pipeline `{0}` is already registered")]
    DuplicateName(String),

    #[error("dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("pipeline `{pipeline}` depends on unknown pipeline `{dependency}`")]
    UnknownDependency {
        pipeline: String,
        dependency: String,
    },

    #[error("pipeline `{pipeline}`: {source}")]
    InvalidPattern {
        pipeline: String,
        #[source]
        source: GlobError,
    },
}

#[derive(Debug, Default)]
pub struct PipelineRegistry {
    root: PathBuf,
    specs: Vec<Arc<PipelineSpec>>,
    index: FxHashMap<String, usize>,
}

impl PipelineRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            specs: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Register all specs, then verify every dependency name resolves.
    pub fn from_specs(
        root: impl Into<PathBuf>,
        specs: impl IntoIterator<Item = PipelineSpec>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new(root);
        for spec in specs {
            registry.register(spec)?;
        }
        registry.verify_dependencies()?;
        Ok(registry)
    }

    pub fn register(&mut self, spec: PipelineSpec) -> Result<(), RegistryError> {
        if self.index.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateName(spec.name));
        }

        if let Some(cycle) = self.find_cycle_through(&spec) {
            return Err(RegistryError::DependencyCycle { cycle });
        }

        crate::debug!("registry"; "register {} ({} sources)", spec.name, spec.sources.len());
        self.index.insert(spec.name.clone(), self.specs.len());
        self.specs.push(Arc::new(spec));
        Ok(())
    }

    /// Every `depends_on` entry must name a registered pipeline.
    pub fn verify_dependencies(&self) -> Result<(), RegistryError> {
        for spec in &self.specs {
            for dep in &spec.depends_on {
                if !self.index.contains_key(dep) {
                    return Err(RegistryError::UnknownDependency {
                        pipeline: spec.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, name: &str) -> Option<&Arc<PipelineSpec>> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    pub fn specs(&self) -> &[Arc<PipelineSpec>] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// All pipelines with a source pattern matching `path`.
    ///
    /// Absolute paths are made relative to the registry root first; paths
    /// outside the root match nothing.
    pub fn match_pipelines(&self, path: &Path) -> Vec<Arc<PipelineSpec>> {
        let Some(rel) = self.relative(path) else {
            return Vec::new();
        };
        let rel = to_slash(&rel);
        self.specs
            .iter()
            .filter(|spec| spec.matches(&rel))
            .cloned()
            .collect()
    }

    fn relative(&self, path: &Path) -> Option<PathBuf> {
        if path.is_absolute() {
            path.strip_prefix(&self.root).ok().map(Path::to_path_buf)
        } else {
            Some(path.to_path_buf())
        }
    }

    /// Pipelines that list `name` in `depends_on`.
    pub fn dependents(&self, name: &str) -> Vec<&Arc<PipelineSpec>> {
        self.specs
            .iter()
            .filter(|s| s.depends_on.iter().any(|d| d == name))
            .collect()
    }

    /// Registration order, with dependencies always before dependents.
    pub fn topo_order(&self) -> Vec<Arc<PipelineSpec>> {
        let mut placed = FxHashSet::default();
        let mut order = Vec::with_capacity(self.specs.len());

        while order.len() < self.specs.len() {
            let before = order.len();
            for spec in &self.specs {
                if placed.contains(spec.name.as_str()) {
                    continue;
                }
                let ready = spec
                    .depends_on
                    .iter()
                    .all(|d| placed.contains(d.as_str()) || !self.index.contains_key(d));
                if ready {
                    placed.insert(spec.name.as_str());
                    order.push(Arc::clone(spec));
                }
            }
            // Registration rejects cycles, so every pass places something
            if order.len() == before {
                break;
            }
        }
        order
    }

    /// The named pipelines plus everything they transitively depend on.
    pub fn with_dependencies<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> FxHashSet<String> {
        let mut seen = FxHashSet::default();
        let mut stack: Vec<&str> = names.into_iter().collect();
        while let Some(name) = stack.pop() {
            if !seen.insert(name.to_string()) {
                continue;
            }
            if let Some(spec) = self.get(name) {
                stack.extend(spec.depends_on.iter().map(String::as_str));
            }
        }
        seen
    }

    /// Search for a path from `spec` back to itself through registered specs.
    fn find_cycle_through(&self, spec: &PipelineSpec) -> Option<Vec<String>> {
        let mut path = vec![spec.name.clone()];
        let mut visited = FxHashSet::default();
        self.walk_deps(&spec.name, &spec.depends_on, &mut path, &mut visited)
    }

    fn walk_deps(
        &self,
        origin: &str,
        deps: &[String],
        path: &mut Vec<String>,
        visited: &mut FxHashSet<String>,
    ) -> Option<Vec<String>> {
        for dep in deps {
            if dep == origin {
                let mut cycle = path.clone();
                cycle.push(dep.clone());
                return Some(cycle);
            }
            if !visited.insert(dep.clone()) {
                continue;
            }
            let Some(next) = self.get(dep) else {
                continue;
            };
            path.push(dep.clone());
            if let Some(cycle) = self.walk_deps(origin, &next.depends_on, path, visited) {
                return Some(cycle);
            }
            path.pop();
        }
        None
    }
}
