use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use notify::RecommendedWatcher;

use super::watch_roots::WatchRoots;
use super::{ChangeDetector, ChangeKind, WatchError};

/// How often the bridge thread flushes overflow and re-attaches roots.
const TICK: Duration = Duration::from_millis(200);

/// Owns the notify watcher and bridges its callbacks onto a thread.
///
/// The watcher starts in [`new`](Self::new), so changes made during the
/// initial build are buffered rather than lost.
pub struct FsWatcher {
    watcher: RecommendedWatcher,
    roots: WatchRoots,
    notify_rx: Receiver<notify::Result<notify::Event>>,
}

impl FsWatcher {
    pub fn new(paths: Vec<PathBuf>) -> Result<Self, WatchError> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let mut roots = WatchRoots::new(paths);
        roots.attach_existing(&mut watcher)?;
        crate::debug!("watch"; "watching {} root(s)", roots.attached());

        Ok(Self {
            watcher,
            roots,
            notify_rx,
        })
    }

    /// Feed events into `detector` until shutdown or until the scheduler
    /// stops receiving.
    pub fn spawn(self, detector: ChangeDetector) -> JoinHandle<()> {
        std::thread::spawn(move || self.run(detector))
    }

    fn run(mut self, mut detector: ChangeDetector) {
        loop {
            if crate::core::is_shutdown() {
                break;
            }

            let result = match self.notify_rx.recv_timeout(TICK) {
                Ok(Ok(event)) => forward(&event, &mut detector),
                Ok(Err(e)) => {
                    crate::log!("watch"; "notify error: {}", e);
                    Ok(())
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.roots.maintain(&mut self.watcher);
                    detector.flush()
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };

            if let Err(WatchError::Closed) = result {
                break;
            }
        }
        crate::debug!("watch"; "watcher stopped");
    }
}

fn forward(event: &notify::Event, detector: &mut ChangeDetector) -> Result<(), WatchError> {
    let Some(kind) = ChangeKind::from_notify(&event.kind) else {
        return Ok(());
    };

    let now = SystemTime::now();
    for path in &event.paths {
        detector.on_fs_event(path, now, kind)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::path::normalize_path;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    #[test]
    fn test_forward_skips_metadata_events() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut detector = ChangeDetector::new("/site", Vec::new(), tx);
        let event = notify::Event {
            kind: notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
                notify::event::MetadataKind::Permissions,
            )),
            paths: vec![PathBuf::from("/site/a.js")],
            attrs: Default::default(),
        };
        forward(&event, &mut detector).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_forward_every_path() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut detector = ChangeDetector::new("/site", Vec::new(), tx);
        let event = notify::Event {
            kind: notify::EventKind::Remove(notify::event::RemoveKind::File),
            paths: vec![PathBuf::from("/site/a.js"), PathBuf::from("/site/b.js")],
            attrs: Default::default(),
        };
        forward(&event, &mut detector).unwrap();
        let first = rx.try_recv().unwrap();
        assert_eq!(first.kind, ChangeKind::Removed);
        assert_eq!(rx.try_recv().unwrap().path, PathBuf::from("/site/b.js"));
    }

    #[test]
    fn test_watcher_skips_missing_roots() {
        let temp = TempDir::new().unwrap();
        let root = normalize_path(temp.path());
        let watcher = FsWatcher::new(vec![root.clone(), root.join("missing")]).unwrap();
        assert_eq!(watcher.roots.attached(), 1);
    }
}
