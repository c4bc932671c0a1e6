//! `kiln watch`: initial build, then incremental rebuilds.
//!
//! The watcher is created before the initial build so edits made while it
//! runs are replayed into the scheduler afterwards.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel;
use tokio::sync::mpsc;

use super::build::{BuildLog, run_pipelines};
use crate::{
    config::ProjectConfig,
    core::{BuildMode, register_shutdown},
    log,
    pipeline::{Glob, PipelineRegistry, PipelineRunner, StageRunner},
    reload::{Notifier, Notifiers, TerminalNotifier},
    scheduler::Scheduler,
    watch::{ChangeDetector, FsWatcher, collect_watch_paths},
};

/// Everything the incremental phase needs, prepared before the initial build.
pub struct WatchSession {
    registry: Arc<PipelineRegistry>,
    runner: Arc<StageRunner>,
    watcher: FsWatcher,
    mode: BuildMode,
    sequential: bool,
    queue_capacity: usize,
    ignore: Vec<Glob>,
}

impl WatchSession {
    /// Build the registry and start the file watcher.
    pub fn prepare(config: &ProjectConfig, mode: BuildMode) -> Result<Self> {
        let registry = Arc::new(config.build_registry()?);
        let paths = collect_watch_paths(&registry);
        let watcher = FsWatcher::new(paths)?;
        let runner = Arc::new(StageRunner::new(config.get_root(), config.ignore_globs()));

        Ok(Self {
            registry,
            runner,
            watcher,
            mode,
            sequential: config.build.sequential,
            queue_capacity: config.watch.queue_capacity,
            ignore: config.ignore_globs(),
        })
    }

    /// Run every pipeline once. Failures are reported, not fatal.
    pub fn initial_build(&self, notifier: &dyn Notifier) -> usize {
        let report = run_pipelines(
            &self.registry,
            self.runner.as_ref(),
            None,
            self.mode,
            self.sequential,
            notifier,
        );
        report.failed().count()
    }

    /// Start the scheduler actor on its own runtime thread.
    pub fn spawn(self, notifier: Arc<dyn Notifier>) -> JoinHandle<()> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let detector = ChangeDetector::new(
            self.registry.root().to_path_buf(),
            self.ignore,
            tx,
        );
        let watcher_handle = self.watcher.spawn(detector);

        let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
        register_shutdown(shutdown_tx);

        let runner: Arc<dyn PipelineRunner> = self.runner;
        let scheduler = Scheduler::new(self.registry, self.mode, runner, notifier)
            .with_shutdown_signal(shutdown_rx);

        thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log!("watch"; "failed to create runtime: {}", e);
                    return;
                }
            };
            rt.block_on(scheduler.run(rx));
            let _ = watcher_handle.join();
        })
    }
}

/// Wait for the scheduler thread to stop (max 2 seconds after shutdown).
pub fn wait_for_shutdown(handle: JoinHandle<()>) {
    while !crate::core::is_shutdown() && !handle.is_finished() {
        thread::sleep(Duration::from_millis(50));
    }
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

pub fn watch(config: &ProjectConfig, mode: BuildMode) -> Result<()> {
    let session = WatchSession::prepare(config, mode)?;

    let failed = session.initial_build(&BuildLog);
    if failed > 0 {
        log!("watch"; "initial build: {} pipeline(s) failed, waiting for changes", failed);
    }
    log!("watch"; "watching for changes ({})", mode);

    let notifier = Arc::new(Notifiers::new().with(TerminalNotifier));
    let handle = session.spawn(notifier);
    wait_for_shutdown(handle);
    Ok(())
}
