//! External command execution for `command` stages.
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! let output = Cmd::from_slice(&["sass", "--no-source-map", "in.scss", "out.css"])
//!     .cwd(root)
//!     .env("KILN_MODE", "production")
//!     .run()?;
//! ```
//!
//! Tools write progress and deprecation chatter to stderr. On success the
//! non-noise lines are logged under the tool's name; on failure they become
//! the error message.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::log;

/// Stderr lines starting with these are never shown.
const NOISE_PREFIXES: &[&str] = &["Deprecation Warning", "More info", "DEPRECATION WARNING"];

static ANSI_ESCAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").ok());

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("failed to execute `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` failed with {status}{}", detail_suffix(.detail))]
    Failed {
        program: String,
        status: ExitStatus,
        detail: String,
    },
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!("\n{detail}")
    }
}

/// Command builder for external process execution.
#[derive(Debug, Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    /// Build from an argv array (`["sass", ...]` or `["npx", "sass", ...]`).
    pub fn from_slice<S: AsRef<OsStr>>(argv: &[S]) -> Self {
        let mut iter = argv.iter().map(|s| s.as_ref().to_owned());
        Self {
            program: iter.next().unwrap_or_default(),
            args: iter.filter(|a| !a.is_empty()).collect(),
            ..Default::default()
        }
    }

    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Run to completion. A non-zero exit status is an error.
    pub fn run(self) -> Result<Output, CommandError> {
        if self.program.is_empty() {
            return Err(CommandError::Empty);
        }
        let program = self.program.to_string_lossy().into_owned();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|source| CommandError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stderr = meaningful_lines(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            let detail = if stderr.is_empty() {
                meaningful_lines(&String::from_utf8_lossy(&output.stdout))
            } else {
                stderr
            };
            return Err(CommandError::Failed {
                program,
                status: output.status,
                detail,
            });
        }

        if !stderr.is_empty() {
            log!(&program; "{}", stderr);
        }
        Ok(output)
    }
}

/// Non-empty, non-noise lines with color codes removed.
fn meaningful_lines(text: &str) -> String {
    text.lines()
        .map(strip_ansi)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty() && !NOISE_PREFIXES.iter().any(|p| line.starts_with(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_ansi(s: &str) -> String {
    match ANSI_ESCAPE.as_ref() {
        Some(re) => re.replace_all(s, "").into_owned(),
        None => s.to_string(),
    }
}
