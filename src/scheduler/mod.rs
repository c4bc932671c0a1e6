//! Build Scheduler.
//!
//! Consumes [`ChangeEvent`]s, debounces them per pipeline, enforces one live
//! run per pipeline and dependency ordering, and reports every finished run
//! to a [`Notifier`].
//!
//! # Architecture
//!
//! ```text
//! Watcher ──ChangeEvent──► Scheduler loop ──spawn_blocking──► PipelineRunner
//!                          (SchedulerState) ◄──PipelineRun────┘
//!                                │
//!                                ▼
//!                             Notifier
//! ```
//!
//! All state transitions happen on the loop task; runs execute on the
//! blocking pool and only send their result back.

mod run;
mod state;


use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use crate::core::BuildMode;
use crate::pipeline::{PipelineRegistry, PipelineRunner, RunRequest};
use crate::reload::Notifier;
use crate::watch::ChangeEvent;

pub use run::{PipelineRun, RunState, execute};
pub use state::{Finished, Phase, RunQueue, SchedulerState};

/// Interval at which the loop checks the Ctrl+C signal.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

pub struct Scheduler {
    state: SchedulerState,
    runner: Arc<dyn PipelineRunner>,
    notifier: Arc<dyn Notifier>,
    shutdown_rx: Option<Receiver<()>>,
}

impl Scheduler {
    pub fn new(
        registry: Arc<PipelineRegistry>,
        mode: BuildMode,
        runner: Arc<dyn PipelineRunner>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            state: SchedulerState::new(registry, mode),
            runner,
            notifier,
            shutdown_rx: None,
        }
    }

    /// Stop the loop when a value arrives on `rx`.
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Run until shutdown, or until `events` closes and all work is done.
    pub async fn run(mut self, mut events: mpsc::Receiver<ChangeEvent>) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<PipelineRun>();
        let mut in_flight = 0usize;
        let mut events_open = true;
        let mut shutdown_tick = tokio::time::interval(SHUTDOWN_POLL);
        shutdown_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            for request in self.state.poll(Instant::now()) {
                in_flight += 1;
                self.dispatch(request, &done_tx);
            }

            if !events_open && in_flight == 0 && self.state.is_idle() {
                crate::debug!("sched"; "event stream closed, all runs finished");
                break;
            }

            let deadline = self.state.next_deadline();
            let wake = tokio::time::Instant::from_std(
                deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86400)),
            );

            tokio::select! {
                Some(run) = done_rx.recv() => {
                    in_flight = in_flight.saturating_sub(1);
                    self.finish(run);
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => self.on_event(&event),
                    None => events_open = false,
                },
                _ = tokio::time::sleep_until(wake), if deadline.is_some() => {}
                _ = shutdown_tick.tick(), if self.shutdown_rx.is_some() => {
                    if self.shutdown_requested() {
                        crate::debug!("sched"; "shutdown signal received");
                        break;
                    }
                }
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown_rx
            .as_ref()
            .is_some_and(|rx| rx.try_recv().is_ok())
    }

    fn on_event(&mut self, event: &ChangeEvent) {
        let touched = self.state.on_event(event, Instant::now());
        if touched.is_empty() {
            crate::debug!("sched"; "no pipeline for {}", event.path.display());
        }
    }

    fn dispatch(&self, request: RunRequest, done: &mpsc::UnboundedSender<PipelineRun>) {
        crate::debug!("sched"; "run {} ({} changed)", request.name(), request.changed.len());

        let runner = Arc::clone(&self.runner);
        let done = done.clone();
        tokio::task::spawn_blocking(move || {
            let run = execute(runner.as_ref(), request);
            let _ = done.send(run);
        });
    }

    fn finish(&mut self, run: PipelineRun) {
        let succeeded = run.state == RunState::Succeeded;
        let finished = self.state.on_finished(run.name(), succeeded, Instant::now());

        self.notifier.on_run_result(&run);
        for skipped in &finished.skipped {
            self.notifier.on_run_result(skipped);
        }
        if !finished.resumed.is_empty() {
            crate::debug!("sched"; "resuming {}", finished.resumed.join(", "));
        }
    }
}
