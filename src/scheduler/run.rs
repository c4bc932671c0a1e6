//! One execution of a pipeline, from scheduling to outcome.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::pipeline::{PipelineRunner, PipelineSpec, RunOutput, RunRequest};
use crate::stage::TransformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Released without running because a dependency failed.
    Skipped,
}

impl RunState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub pipeline: Arc<PipelineSpec>,
    pub state: RunState,
    /// Paths that triggered the run.
    pub changed: BTreeSet<PathBuf>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub error: Option<TransformError>,
    pub output: RunOutput,
    /// For skipped runs, the dependency that failed.
    pub blocked_by: Option<String>,
}

impl PipelineRun {
    pub fn pending(pipeline: Arc<PipelineSpec>, changed: BTreeSet<PathBuf>) -> Self {
        Self {
            pipeline,
            state: RunState::Pending,
            changed,
            started_at: None,
            finished_at: None,
            error: None,
            output: RunOutput::default(),
            blocked_by: None,
        }
    }

    pub fn skipped(
        pipeline: Arc<PipelineSpec>,
        changed: BTreeSet<PathBuf>,
        dependency: &str,
        now: Instant,
    ) -> Self {
        Self {
            state: RunState::Skipped,
            finished_at: Some(now),
            blocked_by: Some(dependency.to_string()),
            ..Self::pending(pipeline, changed)
        }
    }

    pub fn name(&self) -> &str {
        &self.pipeline.name
    }

    pub fn start(&mut self, now: Instant) {
        self.state = RunState::Running;
        self.started_at = Some(now);
    }

    pub fn succeed(&mut self, output: RunOutput, now: Instant) {
        self.state = RunState::Succeeded;
        self.output = output;
        self.finished_at = Some(now);
    }

    pub fn fail(&mut self, error: TransformError, now: Instant) {
        self.state = RunState::Failed;
        self.error = Some(error);
        self.finished_at = Some(now);
    }

    pub fn duration(&self) -> Option<Duration> {
        Some(self.finished_at?.saturating_duration_since(self.started_at?))
    }

    /// Message shown to the user when the run did not succeed.
    pub fn error_message(&self) -> Option<String> {
        match self.state {
            RunState::Failed => self.error.as_ref().map(ToString::to_string),
            RunState::Skipped => self
                .blocked_by
                .as_ref()
                .map(|dep| format!("skipped: dependency `{dep}` failed")),
            _ => None,
        }
    }
}

/// Execute a request to completion.
///
/// Transform errors and panics both end as a `Failed` run; nothing escapes
/// the run boundary.
pub fn execute(runner: &dyn PipelineRunner, request: RunRequest) -> PipelineRun {
    let mut run = PipelineRun::pending(Arc::clone(&request.pipeline), request.changed.clone());
    run.start(Instant::now());

    let result = panic::catch_unwind(AssertUnwindSafe(|| runner.run(&request)));
    let now = Instant::now();
    match result {
        Ok(Ok(output)) => run.succeed(output, now),
        Ok(Err(error)) => run.fail(error, now),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            run.fail(TransformError::new("panic", message), now);
        }
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BuildMode;

    struct Fixed(Result<RunOutput, TransformError>);

    impl PipelineRunner for Fixed {
        fn run(&self, _request: &RunRequest) -> Result<RunOutput, TransformError> {
            self.0.clone()
        }
    }

    struct Panics;

    impl PipelineRunner for Panics {
        fn run(&self, _request: &RunRequest) -> Result<RunOutput, TransformError> {
            panic!("stage exploded");
        }
    }

    fn request() -> RunRequest {
        let spec = PipelineSpec::new("scripts", &["app/js/*.js"]).unwrap();
        RunRequest::new(Arc::new(spec), BuildMode::Development)
    }

    #[test]
    fn test_execute_success() {
        let output = RunOutput {
            written: vec![PathBuf::from("/site/app/js/main.min.js")],
        };
        let run = execute(&Fixed(Ok(output.clone())), request());
        assert_eq!(run.state, RunState::Succeeded);
        assert_eq!(run.output, output);
        assert!(run.duration().is_some());
        assert!(run.error_message().is_none());
    }

    #[test]
    fn test_execute_failure_keeps_error() {
        let error = TransformError::new("minify", "syntax error");
        let run = execute(&Fixed(Err(error.clone())), request());
        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.error, Some(error));
        assert_eq!(run.error_message().as_deref(), Some("minify: syntax error"));
    }

    #[test]
    fn test_execute_catches_panic() {
        let run = execute(&Panics, request());
        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.error.unwrap().message, "stage exploded");
    }

    #[test]
    fn test_skipped_message() {
        let spec = Arc::new(PipelineSpec::new("pages", &["*.html"]).unwrap());
        let run = PipelineRun::skipped(spec, BTreeSet::new(), "styles", Instant::now());
        assert_eq!(run.state, RunState::Skipped);
        assert!(run.state.is_finished());
        assert_eq!(
            run.error_message().as_deref(),
            Some("skipped: dependency `styles` failed")
        );
    }
}
