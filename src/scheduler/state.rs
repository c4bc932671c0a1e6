//! Pure scheduling state.
//!
//! Every transition takes the current `Instant` explicitly, so the whole
//! state machine runs without a clock, a runtime or a filesystem.
//!
//! ```text
//! Idle ──event──► Scheduled ──debounce elapsed, deps idle──► Running
//!  ▲                 ▲  │ event: reset deadline              │ event: rerun_requested
//!  │                 │  └────────────────────────────────────┤
//!  │                 └──────────── finished, rerun requested ┤
//!  └──────────────────────────── finished ───────────────────┘
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;

use super::run::PipelineRun;
use crate::core::BuildMode;
use crate::pipeline::{PipelineRegistry, PipelineSpec, RunRequest};
use crate::watch::ChangeEvent;

/// Where a pipeline is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Waiting for quiescence until `deadline`.
    Scheduled { deadline: Instant },
    Running,
}

impl Phase {
    fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Names awaiting promotion, in first-trigger order, each at most once.
#[derive(Debug, Default, Clone)]
pub struct RunQueue {
    names: VecDeque<String>,
}

impl RunQueue {
    /// Append `name` unless already queued.
    pub fn push(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.names.push_back(name.to_string());
        true
    }

    pub fn remove(&mut self, name: &str) {
        self.names.retain(|n| n != name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug)]
struct Slot {
    spec: Arc<PipelineSpec>,
    phase: Phase,
    /// Paths changed since the last promotion.
    pending: BTreeSet<PathBuf>,
    rerun_requested: bool,
}

/// Outcome of [`SchedulerState::on_finished`].
#[derive(Debug, Default)]
pub struct Finished {
    /// A trigger arrived while running; the pipeline is Scheduled again.
    pub rescheduled: bool,
    /// Dependents released because this pipeline failed.
    pub skipped: Vec<PipelineRun>,
    /// Dependents rescheduled with changes left over from a skipped run.
    pub resumed: Vec<String>,
}

#[derive(Debug)]
pub struct SchedulerState {
    registry: Arc<PipelineRegistry>,
    slots: Vec<Slot>,
    index: FxHashMap<String, usize>,
    queue: RunQueue,
    mode: BuildMode,
}

impl SchedulerState {
    pub fn new(registry: Arc<PipelineRegistry>, mode: BuildMode) -> Self {
        let slots: Vec<Slot> = registry
            .specs()
            .iter()
            .map(|spec| Slot {
                spec: Arc::clone(spec),
                phase: Phase::Idle,
                pending: BTreeSet::new(),
                rerun_requested: false,
            })
            .collect();
        let index = slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.spec.name.clone(), i))
            .collect();

        Self {
            registry,
            slots,
            index,
            queue: RunQueue::default(),
            mode,
        }
    }

    pub fn registry(&self) -> &Arc<PipelineRegistry> {
        &self.registry
    }

    /// Route a change to every watched pipeline whose sources match it.
    ///
    /// Returns the names of the pipelines it touched.
    pub fn on_event(&mut self, event: &ChangeEvent, now: Instant) -> Vec<String> {
        let names: Vec<String> = self
            .registry
            .match_pipelines(&event.path)
            .into_iter()
            .filter(|spec| spec.watch)
            .map(|spec| spec.name.clone())
            .collect();

        for name in &names {
            self.trigger(name, &event.path, now);
        }
        names
    }

    /// Record a change for `name`. Returns `true` on an `Idle -> Scheduled`
    /// transition.
    pub fn trigger(&mut self, name: &str, path: &Path, now: Instant) -> bool {
        let Some(&i) = self.index.get(name) else {
            return false;
        };
        let slot = &mut self.slots[i];
        slot.pending.insert(path.to_path_buf());

        match slot.phase {
            Phase::Idle => {
                slot.phase = Phase::Scheduled {
                    deadline: now + slot.spec.debounce,
                };
                self.queue.push(name);
                crate::debug!("sched"; "{name}: idle -> scheduled");
                true
            }
            Phase::Scheduled { .. } => {
                slot.phase = Phase::Scheduled {
                    deadline: now + slot.spec.debounce,
                };
                false
            }
            Phase::Running => {
                if !slot.rerun_requested {
                    crate::debug!("sched"; "{name}: rerun requested");
                }
                slot.rerun_requested = true;
                false
            }
        }
    }

    /// Promote every due, unblocked pipeline to `Running`.
    pub fn poll(&mut self, now: Instant) -> Vec<RunRequest> {
        let candidates: Vec<String> = self.queue.iter().map(str::to_string).collect();
        let mut requests = Vec::new();

        for name in candidates {
            let i = self.index[&name];
            let Phase::Scheduled { deadline } = self.slots[i].phase else {
                continue;
            };
            if deadline > now {
                continue;
            }
            if let Some(dep) = self.blocking_dependency(i) {
                crate::debug!("sched"; "{name}: waiting on {dep}");
                continue;
            }

            let slot = &mut self.slots[i];
            slot.phase = Phase::Running;
            let changed = std::mem::take(&mut slot.pending);
            self.queue.remove(&name);
            crate::debug!("sched"; "{name}: scheduled -> running ({} changed)", changed.len());

            requests.push(RunRequest::new(Arc::clone(&slot.spec), self.mode).with_changed(changed));
        }
        requests
    }

    /// Record the end of a run started by [`poll`](Self::poll).
    pub fn on_finished(&mut self, name: &str, succeeded: bool, now: Instant) -> Finished {
        let mut finished = Finished::default();
        let Some(&i) = self.index.get(name) else {
            return finished;
        };
        let slot = &mut self.slots[i];
        if slot.phase != Phase::Running {
            crate::debug!("sched"; "{name}: finished while {:?}, ignored", slot.phase);
            return finished;
        }

        if slot.rerun_requested {
            slot.rerun_requested = false;
            slot.phase = Phase::Scheduled {
                deadline: now + slot.spec.debounce,
            };
            self.queue.push(name);
            finished.rescheduled = true;
            crate::debug!("sched"; "{name}: running -> scheduled (rerun)");
            return finished;
        }

        slot.phase = Phase::Idle;
        crate::debug!("sched"; "{name}: running -> idle");

        if succeeded {
            finished.resumed = self.resume_dependents(name, now);
        } else {
            finished.skipped = self.release_dependents(name, now);
        }
        finished
    }

    /// Reschedule Idle direct dependents that still hold changes from a
    /// skipped run.
    fn resume_dependents(&mut self, recovered: &str, now: Instant) -> Vec<String> {
        let dependents: Vec<String> = self
            .registry
            .dependents(recovered)
            .iter()
            .map(|s| s.name.clone())
            .collect();

        let mut resumed = Vec::new();
        for dependent in dependents {
            let i = self.index[&dependent];
            let slot = &mut self.slots[i];
            if slot.phase != Phase::Idle || slot.pending.is_empty() {
                continue;
            }
            slot.phase = Phase::Scheduled {
                deadline: now + slot.spec.debounce,
            };
            self.queue.push(&dependent);
            crate::debug!("sched"; "{dependent}: idle -> scheduled, {recovered} recovered");
            resumed.push(dependent);
        }
        resumed
    }

    /// Skip every Scheduled dependent of a failed pipeline, transitively.
    ///
    /// Their pending paths stay recorded; [`resume_dependents`](Self::resume_dependents)
    /// schedules them again once the dependency succeeds.
    fn release_dependents(&mut self, failed: &str, now: Instant) -> Vec<PipelineRun> {
        let mut skipped = Vec::new();
        let mut stack = vec![failed.to_string()];

        while let Some(name) = stack.pop() {
            let dependents: Vec<String> = self
                .registry
                .dependents(&name)
                .iter()
                .map(|s| s.name.clone())
                .collect();

            for dependent in dependents {
                let i = self.index[&dependent];
                let slot = &mut self.slots[i];
                if !matches!(slot.phase, Phase::Scheduled { .. }) {
                    continue;
                }
                slot.phase = Phase::Idle;
                self.queue.remove(&dependent);
                crate::debug!("sched"; "{dependent}: skipped, {name} failed");
                skipped.push(PipelineRun::skipped(
                    Arc::clone(&slot.spec),
                    slot.pending.clone(),
                    &name,
                    now,
                ));
                stack.push(dependent);
            }
        }
        skipped
    }

    /// First direct dependency that is still Scheduled or Running.
    fn blocking_dependency(&self, i: usize) -> Option<&str> {
        self.slots[i]
            .spec
            .depends_on
            .iter()
            .find(|dep| {
                self.index
                    .get(dep.as_str())
                    .is_some_and(|&d| self.slots[d].phase.is_busy())
            })
            .map(String::as_str)
    }

    /// Earliest deadline among Scheduled pipelines that are not blocked.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| match slot.phase {
                Phase::Scheduled { deadline } if self.blocking_dependency(i).is_none() => {
                    Some(deadline)
                }
                _ => None,
            })
            .min()
    }

    pub fn phase(&self, name: &str) -> Option<Phase> {
        self.index.get(name).map(|&i| self.slots[i].phase)
    }

    pub fn pending(&self, name: &str) -> Option<&BTreeSet<PathBuf>> {
        self.index.get(name).map(|&i| &self.slots[i].pending)
    }

    pub fn rerun_requested(&self, name: &str) -> bool {
        self.index
            .get(name)
            .is_some_and(|&i| self.slots[i].rerun_requested)
    }

    pub fn queue(&self) -> &RunQueue {
        &self.queue
    }

    pub fn running(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.phase == Phase::Running)
            .count()
    }

    /// No pipeline is Scheduled or Running.
    pub fn is_idle(&self) -> bool {
        self.slots.iter().all(|s| s.phase == Phase::Idle)
    }
}
