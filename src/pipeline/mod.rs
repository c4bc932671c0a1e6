//! Pipeline declarations, matching and execution.
//!
//! - [`PipelineSpec`]: immutable declaration (sources, target, stages, deps)
//! - [`PipelineRegistry`]: all specs, path matching, dependency order
//! - [`PipelineRunner`]: the seam the scheduler calls to do the work

pub mod glob;
pub mod registry;
pub mod runner;
pub mod spec;

pub use glob::{Glob, GlobError};
pub use registry::{PipelineRegistry, RegistryError};
pub use runner::{PipelineRunner, RunOutput, RunRequest, StageRunner};
pub use spec::{PipelineSpec, ReloadMode};
