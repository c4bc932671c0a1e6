//! Run result sinks.
//!
//! The scheduler reports every finished [`PipelineRun`] to a [`Notifier`].
//! Notifiers are terminal: they never retry and never feed back into
//! scheduling.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::hub::ReloadHub;
use super::message::ReloadMessage;
use crate::pipeline::glob::to_slash;
use crate::pipeline::ReloadMode;
use crate::scheduler::{PipelineRun, RunState};

pub trait Notifier: Send + Sync + 'static {
    fn on_run_result(&self, run: &PipelineRun);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn on_run_result(&self, run: &PipelineRun) {
        (**self).on_run_result(run);
    }
}

/// Reports results through the terminal status block.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn on_run_result(&self, run: &PipelineRun) {
        let name = run.name();
        match run.state {
            RunState::Succeeded => {
                let millis = run.duration().map_or(0, |d| d.as_millis());
                let written = run.output.written.len();
                crate::logger::status_success(&format!(
                    "{name} ({millis} ms, {written} written)"
                ));
            }
            RunState::Failed => {
                let detail = run.error_message().unwrap_or_default();
                crate::logger::status_error(&format!("{name} failed"), &detail);
            }
            RunState::Skipped => {
                let detail = run.error_message().unwrap_or_default();
                crate::logger::status_warning(&format!("{name} {detail}"));
            }
            RunState::Pending | RunState::Running => {}
        }
    }
}

/// Forwards results to live-reload clients.
pub struct ReloadNotifier {
    hub: Arc<ReloadHub>,
    /// Directory served at `/`; outputs are addressed relative to it.
    serve_root: PathBuf,
    /// Latest error of each pipeline whose last run did not succeed.
    failing: Mutex<BTreeMap<String, String>>,
}

impl ReloadNotifier {
    pub fn new(hub: Arc<ReloadHub>, serve_root: impl Into<PathBuf>) -> Self {
        Self {
            hub,
            serve_root: serve_root.into(),
            failing: Mutex::new(BTreeMap::new()),
        }
    }

    /// Messages a finished run produces, in send order.
    fn messages_for(&self, run: &PipelineRun) -> Vec<ReloadMessage> {
        let name = run.name();
        let mut failing = self.failing.lock();

        if !matches!(run.state, RunState::Succeeded) {
            let Some(error) = run.error_message() else {
                return Vec::new();
            };
            failing.insert(name.to_string(), error.clone());
            return vec![ReloadMessage::error(name, error)];
        }

        let mut messages = Vec::new();
        if failing.remove(name).is_some() {
            // The overlay must show an error that is still outstanding
            match failing.iter().next() {
                Some((other, error)) => messages.push(ReloadMessage::error(other, error)),
                None => messages.push(ReloadMessage::ClearError),
            }
        }

        match run.pipeline.reload {
            ReloadMode::None => {}
            ReloadMode::Reload => messages.push(ReloadMessage::reload(format!("{name} rebuilt"))),
            ReloadMode::Inject => {
                match stylesheet_urls(&run.output.written, &self.serve_root) {
                    Some(urls) => messages.extend(urls.into_iter().map(ReloadMessage::inject_css)),
                    None => messages.push(ReloadMessage::reload(format!("{name} rebuilt"))),
                }
            }
        }
        messages
    }
}

impl Notifier for ReloadNotifier {
    fn on_run_result(&self, run: &PipelineRun) {
        for message in self.messages_for(run) {
            self.hub.send(&message);
        }
    }
}

/// URL paths for written files when every one is a stylesheet under
/// `serve_root`; `None` means a full reload is needed.
fn stylesheet_urls(written: &[PathBuf], serve_root: &Path) -> Option<Vec<String>> {
    if written.is_empty() {
        return None;
    }
    written
        .iter()
        .map(|path| {
            if path.extension().and_then(|e| e.to_str()) != Some("css") {
                return None;
            }
            let rel = path.strip_prefix(serve_root).ok()?;
            Some(format!("/{}", to_slash(rel)))
        })
        .collect()
}

/// Fan-out to several notifiers in order.
#[derive(Default)]
pub struct Notifiers(Vec<Arc<dyn Notifier>>);

impl Notifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: impl Notifier) -> Self {
        self.0.push(Arc::new(notifier));
        self
    }
}

impl Notifier for Notifiers {
    fn on_run_result(&self, run: &PipelineRun) {
        for notifier in &self.0 {
            notifier.on_run_result(run);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Instant;

    use super::*;
    use crate::pipeline::{PipelineSpec, RunOutput};
    use crate::stage::TransformError;

    fn spec(name: &str, reload: ReloadMode) -> Arc<PipelineSpec> {
        Arc::new(PipelineSpec::new(name, &["**/*"]).unwrap().with_reload(reload))
    }

    fn succeeded(spec: Arc<PipelineSpec>, written: &[&str]) -> PipelineRun {
        let mut run = PipelineRun::pending(spec, BTreeSet::new());
        run.start(Instant::now());
        let output = RunOutput {
            written: written.iter().map(PathBuf::from).collect(),
        };
        run.succeed(output, Instant::now());
        run
    }

    fn failed(spec: Arc<PipelineSpec>) -> PipelineRun {
        let mut run = PipelineRun::pending(spec, BTreeSet::new());
        run.start(Instant::now());
        run.fail(TransformError::new("minify", "syntax error"), Instant::now());
        run
    }

    fn notifier() -> ReloadNotifier {
        ReloadNotifier::new(Arc::new(ReloadHub::new()), "/site/app")
    }

    #[test]
    fn test_reload_mode_reloads() {
        let n = notifier();
        let run = succeeded(spec("scripts", ReloadMode::Reload), &["/site/app/js/main.min.js"]);
        assert_eq!(n.messages_for(&run), vec![ReloadMessage::reload("scripts rebuilt")]);
    }

    #[test]
    fn test_inject_mode_injects_css() {
        let n = notifier();
        let run = succeeded(
            spec("styles", ReloadMode::Inject),
            &["/site/app/css/style.min.css"],
        );
        assert_eq!(
            n.messages_for(&run),
            vec![ReloadMessage::inject_css("/css/style.min.css")]
        );
    }

    #[test]
    fn test_inject_mode_falls_back_to_reload() {
        let n = notifier();
        let mixed = succeeded(
            spec("styles", ReloadMode::Inject),
            &["/site/app/css/a.css", "/site/app/css/a.css.map"],
        );
        assert_eq!(n.messages_for(&mixed), vec![ReloadMessage::reload("styles rebuilt")]);

        let outside = succeeded(spec("styles", ReloadMode::Inject), &["/site/dist/a.css"]);
        assert_eq!(n.messages_for(&outside), vec![ReloadMessage::reload("styles rebuilt")]);
    }

    #[test]
    fn test_none_mode_reports_only() {
        let n = notifier();
        let run = succeeded(spec("fonts", ReloadMode::None), &["/site/app/fonts/a.woff2"]);
        assert!(n.messages_for(&run).is_empty());
    }

    #[test]
    fn test_error_then_clear_after_all_recover() {
        let n = notifier();
        let scripts = spec("scripts", ReloadMode::Reload);
        let styles = spec("styles", ReloadMode::None);

        assert_eq!(
            n.messages_for(&failed(Arc::clone(&scripts))),
            vec![ReloadMessage::error("scripts", "minify: syntax error")]
        );
        n.messages_for(&failed(Arc::clone(&styles)));

        // styles still failing, so its error replaces the recovered one
        assert_eq!(
            n.messages_for(&succeeded(Arc::clone(&scripts), &[])),
            vec![
                ReloadMessage::error("styles", "minify: syntax error"),
                ReloadMessage::reload("scripts rebuilt"),
            ]
        );
        assert_eq!(
            n.messages_for(&succeeded(styles, &[])),
            vec![ReloadMessage::ClearError]
        );
    }

    #[test]
    fn test_hub_replays_error_still_outstanding() {
        let hub = Arc::new(ReloadHub::new());
        let n = ReloadNotifier::new(Arc::clone(&hub), "/site/app");
        let scripts = spec("scripts", ReloadMode::Reload);
        let styles = spec("styles", ReloadMode::Inject);

        n.on_run_result(&failed(Arc::clone(&scripts)));
        n.on_run_result(&failed(Arc::clone(&styles)));
        assert_eq!(
            hub.pending_error(),
            Some(ReloadMessage::error("styles", "minify: syntax error"))
        );

        n.on_run_result(&succeeded(styles, &["/site/app/css/main.css"]));
        assert_eq!(
            hub.pending_error(),
            Some(ReloadMessage::error("scripts", "minify: syntax error"))
        );

        n.on_run_result(&succeeded(scripts, &[]));
        assert_eq!(hub.pending_error(), None);
    }

    #[test]
    fn test_skipped_run_is_an_error() {
        let n = notifier();
        let run = PipelineRun::skipped(
            spec("pages", ReloadMode::Reload),
            BTreeSet::new(),
            "styles",
            Instant::now(),
        );
        assert_eq!(
            n.messages_for(&run),
            vec![ReloadMessage::error("pages", "skipped: dependency `styles` failed")]
        );
    }

    #[test]
    fn test_fan_out() {
        #[derive(Default, Clone)]
        struct Count(Arc<Mutex<usize>>);
        impl Notifier for Count {
            fn on_run_result(&self, _run: &PipelineRun) {
                *self.0.lock() += 1;
            }
        }

        let count = Count::default();
        let all = Notifiers::new().with(count.clone()).with(count.clone());
        all.on_run_result(&failed(spec("scripts", ReloadMode::Reload)));
        assert_eq!(*count.0.lock(), 2);
    }
}
