//! External tool stage.
//!
//! Runs one process per input. Arguments may reference:
//!
//! | Variable  | Value                                              |
//! |-----------|----------------------------------------------------|
//! | `$INPUT`  | the source file (or a scratch copy if transformed) |
//! | `$OUTPUT` | a scratch file the tool must write                 |
//! | `$ROOT`   | the project root                                   |
//! | `$MODE`   | `development` or `production`                      |
//!
//! Without `$OUTPUT` in the command, the tool's stdout becomes the output.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::utils::exec::Cmd;

use super::{Asset, Stage, StageContext, TransformError};

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct CommandStage {
    command: Vec<String>,
    /// Output extension (`scss` → `css`); `None` keeps the input's.
    ext: Option<String>,
}

impl CommandStage {
    pub fn new(command: Vec<String>, ext: Option<String>) -> Self {
        Self { command, ext }
    }

    fn writes_file(&self) -> bool {
        self.command.iter().any(|a| a.contains("$OUTPUT"))
    }

    fn run_one(&self, asset: Asset, ctx: &StageContext<'_>, scratch: &Path) -> Result<Asset, String> {
        let input = match &asset.source {
            Some(source) => source.clone(),
            None => {
                let path = scratch.join("in").join(&asset.path);
                write_file(&path, &asset.contents)?;
                path
            }
        };

        let mut out_rel = asset.path.clone();
        if let Some(ext) = &self.ext {
            out_rel.set_extension(ext);
        }
        let output = scratch.join("out").join(&out_rel);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let vars = [
            ("$INPUT", input.to_string_lossy().into_owned()),
            ("$OUTPUT", output.to_string_lossy().into_owned()),
            ("$ROOT", ctx.root.to_string_lossy().into_owned()),
            ("$MODE", ctx.mode.as_str().to_string()),
        ];
        let args: Vec<String> = self
            .command
            .iter()
            .map(|arg| {
                vars.iter()
                    .fold(arg.clone(), |acc, (key, value)| acc.replace(key, value))
            })
            .collect();

        crate::debug!("command"; "{}", args.join(" "));
        let result = Cmd::from_slice(&args)
            .cwd(ctx.root)
            .env("KILN_MODE", ctx.mode.as_str())
            .run()
            .map_err(|e| format!("{e:#}"))?;

        let contents = if self.writes_file() {
            fs::read(&output).map_err(|e| format!("tool produced no output file: {e}"))?
        } else {
            result.stdout
        };
        Ok(Asset::new(out_rel, contents))
    }
}

impl Stage for CommandStage {
    fn name(&self) -> &str {
        self.command.first().map_or("command", String::as_str)
    }

    fn run(&self, assets: Vec<Asset>, ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        if self.command.is_empty() {
            return Err(TransformError::new("command", "empty command"));
        }

        let scratch = std::env::temp_dir().join(format!(
            "kiln-{}-{}-{}",
            std::process::id(),
            ctx.pipeline,
            SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let result = assets
            .into_iter()
            .map(|asset| {
                let path = asset.path.clone();
                self.run_one(asset, ctx, &scratch).map_err(|e| {
                    TransformError::new(self.name(), format!("{}: {e}", path.display()))
                })
            })
            .collect();

        let _ = fs::remove_dir_all(&scratch);
        result
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    fs::write(path, contents).map_err(|e| e.to_string())
}
