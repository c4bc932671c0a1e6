//! Change detection.
//!
//! Turns raw filesystem notifications into [`ChangeEvent`]s for the
//! scheduler. Deciding which pipelines a path belongs to is left to the
//! registry; this module only filters noise and keeps the queue bounded.
//!
//! ```text
//! notify ──► FsWatcher (thread) ──► ChangeDetector ──► mpsc ──► Scheduler
//!                                        │
//!                                        └─ overflow map (coalesced, flushed later)
//! ```

mod detector;
mod watch_roots;
mod watcher;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;

use crate::pipeline::PipelineRegistry;

pub use detector::ChangeDetector;
pub use watcher::FsWatcher;

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }

    /// Map a notify event kind; metadata-only changes are noise.
    pub fn from_notify(kind: &notify::EventKind) -> Option<Self> {
        use notify::EventKind;
        use notify::event::ModifyKind;

        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Remove(_) => Some(Self::Removed),
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) => Some(Self::Modified),
            _ => None,
        }
    }
}

/// A single observed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub timestamp: SystemTime,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, timestamp: SystemTime) -> Self {
        Self {
            path: path.into(),
            timestamp,
            kind: ChangeKind::Modified,
        }
    }

    pub fn with_kind(mut self, kind: ChangeKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("event queue full, coalesced {coalesced} change(s) until the scheduler catches up")]
    Overflow { coalesced: usize },

    #[error("scheduler is no longer receiving events")]
    Closed,

    #[error("file watcher: {0}")]
    Notify(#[from] notify::Error),
}

/// Directories to watch: the literal base of every watched source pattern.
///
/// Nested directories are dropped in favor of their watched ancestor.
pub fn collect_watch_paths(registry: &PipelineRegistry) -> Vec<PathBuf> {
    let root = registry.root();
    let mut paths: Vec<PathBuf> = Vec::new();

    for spec in registry.specs().iter().filter(|s| s.watch) {
        for glob in &spec.sources {
            let dir = root.join(glob.base());
            if !paths.contains(&dir) {
                paths.push(dir);
            }
        }
    }

    dedupe_descendants(&mut paths);
    paths
}

fn dedupe_descendants(paths: &mut Vec<PathBuf>) {
    let snapshot = paths.clone();
    paths.retain(|path| {
        !snapshot
            .iter()
            .any(|other| other != path && path.starts_with(other))
    });
}

/// Check if path is a temp/backup file (editor artifacts).
pub(crate) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
        || name == ".DS_Store"
        || name == "4913"
}
