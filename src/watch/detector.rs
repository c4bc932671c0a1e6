use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rustc_hash::FxHashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::{ChangeEvent, ChangeKind, WatchError, is_temp_file};
use crate::pipeline::Glob;
use crate::utils::path::normalize_path;

/// Filters raw paths and forwards them to the scheduler queue.
///
/// The queue is bounded. When it is full, events are coalesced by path and
/// retried on the next [`flush`](Self::flush); nothing is dropped, and each
/// overflow episode is reported once with the number of coalesced changes.
pub struct ChangeDetector {
    root: PathBuf,
    ignore: Vec<Glob>,
    tx: mpsc::Sender<ChangeEvent>,
    /// Coalesced events in arrival order.
    overflow: Vec<ChangeEvent>,
    overflow_index: FxHashMap<PathBuf, usize>,
    /// Changes absorbed during the current overflow episode.
    coalesced: usize,
    /// Overflow episodes so far, one warning each.
    episodes: usize,
}

impl ChangeDetector {
    pub fn new(root: impl Into<PathBuf>, ignore: Vec<Glob>, tx: mpsc::Sender<ChangeEvent>) -> Self {
        Self {
            root: root.into(),
            ignore,
            tx,
            overflow: Vec::new(),
            overflow_index: FxHashMap::default(),
            coalesced: 0,
            episodes: 0,
        }
    }

    /// Accept one filesystem notification.
    ///
    /// Returns [`WatchError::Closed`] once the scheduler has gone away.
    pub fn on_fs_event(
        &mut self,
        path: &Path,
        timestamp: SystemTime,
        kind: ChangeKind,
    ) -> Result<(), WatchError> {
        if is_temp_file(path) {
            return Ok(());
        }

        let path = normalize_path(path);
        if self.is_ignored(&path) {
            crate::debug!("watch"; "ignored {}", path.display());
            return Ok(());
        }

        crate::debug!("watch"; "{} {}", kind.label(), path.display());
        let event = ChangeEvent {
            path,
            timestamp,
            kind,
        };

        // Keep arrival order: while a backlog exists, new events queue behind it
        self.flush()?;
        if !self.overflow.is_empty() {
            self.coalesce(event);
            return Ok(());
        }

        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                self.coalesce(event);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(WatchError::Closed),
        }
    }

    /// Move coalesced events into the queue as capacity allows.
    pub fn flush(&mut self) -> Result<(), WatchError> {
        if self.overflow.is_empty() {
            return Ok(());
        }

        let mut sent = 0;
        for event in &self.overflow {
            match self.tx.try_send(event.clone()) {
                Ok(()) => sent += 1,
                Err(TrySendError::Full(_)) => break,
                Err(TrySendError::Closed(_)) => return Err(WatchError::Closed),
            }
        }

        self.overflow.drain(..sent);
        self.reindex();

        if self.overflow.is_empty() {
            crate::debug!(
                "watch";
                "overflow #{} drained ({} coalesced)",
                self.episodes,
                self.coalesced
            );
            self.coalesced = 0;
        }
        Ok(())
    }

    /// Number of overflow episodes reported so far.
    pub fn overflow_episodes(&self) -> usize {
        self.episodes
    }

    /// Number of events still waiting for queue capacity.
    pub fn backlog(&self) -> usize {
        self.overflow.len()
    }

    fn coalesce(&mut self, event: ChangeEvent) {
        if self.coalesced == 0 {
            let warning = WatchError::Overflow {
                coalesced: self.overflow.len() + 1,
            };
            crate::logger::status_warning(&warning.to_string());
            self.episodes += 1;
        }
        self.coalesced += 1;

        match self.overflow_index.get(&event.path) {
            Some(&i) => {
                let slot = &mut self.overflow[i];
                slot.timestamp = slot.timestamp.max(event.timestamp);
                slot.kind = event.kind;
            }
            None => {
                self.overflow_index
                    .insert(event.path.clone(), self.overflow.len());
                self.overflow.push(event);
            }
        }
    }

    fn reindex(&mut self) {
        self.overflow_index.clear();
        for (i, event) in self.overflow.iter().enumerate() {
            self.overflow_index.insert(event.path.clone(), i);
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.root) else {
            return false;
        };
        self.ignore.iter().any(|g| g.matches_path(rel))
    }
}
