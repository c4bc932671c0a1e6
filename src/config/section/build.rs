//! `[build]` section configuration.
//!
//! ```toml
//! [build]
//! clean = ["dist"]     # Removed before `kiln build`
//! sequential = false   # Run pipelines one at a time in declared order
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Paths (relative to the project root) removed before a full build.
    pub clean: Vec<PathBuf>,

    /// Disable parallelism between independent pipelines.
    pub sequential: bool,
}
