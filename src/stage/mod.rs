//! Transform stages.
//!
//! A pipeline's work is an explicit, ordered [`StageChain`]. Each stage takes
//! the current set of in-memory [`Asset`]s and returns the next set; the
//! scheduler never looks inside, it only sees success or a [`TransformError`].
//!
//! ```text
//! sources ──► include ──► concat ──► minify-js ──► (write to target)
//! ```

mod command;
mod concat;
mod image;
mod include;
mod minify;
mod newer;
mod rename;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::section::StageConfig;
use crate::core::BuildMode;

pub use command::CommandStage;
pub use concat::Concat;
pub use image::ImageEncode;
pub use include::FileInclude;
pub use minify::{MinifyCss, MinifyJs};
pub use newer::Newer;
pub use rename::Rename;

/// Failure inside one stage of a pipeline run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{stage}: {message}")]
pub struct TransformError {
    pub stage: String,
    pub message: String,
}

impl TransformError {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// An in-memory file flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Path relative to the source glob base; also the path under `target`.
    pub path: PathBuf,
    pub contents: Vec<u8>,
    /// Absolute origin on disk while contents are untouched.
    pub source: Option<PathBuf>,
}

impl Asset {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            source: None,
        }
    }

    pub fn from_source(path: impl Into<PathBuf>, contents: Vec<u8>, source: PathBuf) -> Self {
        Self {
            path: path.into(),
            contents,
            source: Some(source),
        }
    }

    pub fn ext(&self) -> &str {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
    }

    /// Replace contents; the asset no longer mirrors its source file.
    pub fn set_contents(&mut self, contents: Vec<u8>) {
        self.contents = contents;
        self.source = None;
    }

    pub fn text(&self, stage: &str) -> Result<&str, TransformError> {
        std::str::from_utf8(&self.contents).map_err(|_| {
            TransformError::new(stage, format!("{} is not valid UTF-8", self.path.display()))
        })
    }
}

/// Read-only facts a stage may need about the current run.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub pipeline: &'a str,
    pub root: &'a Path,
    /// Absolute output directory of the pipeline.
    pub target: &'a Path,
    pub mode: BuildMode,
}

/// One opaque transform step.
pub trait Stage: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn run(&self, assets: Vec<Asset>, ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError>;
}

/// A stage plus the conditions under which it applies.
#[derive(Debug, Clone)]
pub struct StageSlot {
    stage: Arc<dyn Stage>,
    /// Run only in this build mode.
    mode: Option<BuildMode>,
    /// Restrict to these extensions; other assets pass through in place.
    only: Vec<String>,
}

impl StageSlot {
    pub fn new(stage: impl Stage + 'static) -> Self {
        Self {
            stage: Arc::new(stage),
            mode: None,
            only: Vec::new(),
        }
    }

    pub fn in_mode(mut self, mode: Option<BuildMode>) -> Self {
        self.mode = mode;
        self
    }

    pub fn only<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = exts.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        self.stage.name()
    }

    fn applies(&self, mode: BuildMode) -> bool {
        self.mode.is_none_or(|m| m == mode)
    }

    fn selects(&self, asset: &Asset) -> bool {
        self.only.is_empty() || self.only.iter().any(|e| e == asset.ext())
    }

    fn run(&self, assets: Vec<Asset>, ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        if self.only.is_empty() {
            return self.stage.run(assets, ctx);
        }

        // Filtered stages run per asset so unselected files keep their position
        let mut out = Vec::with_capacity(assets.len());
        for asset in assets {
            if self.selects(&asset) {
                out.extend(self.stage.run(vec![asset], ctx)?);
            } else {
                out.push(asset);
            }
        }
        Ok(out)
    }
}

/// Ordered list of stages applied by a pipeline.
#[derive(Debug, Clone, Default)]
pub struct StageChain {
    slots: Vec<StageSlot>,
}

impl StageChain {
    pub fn new(slots: Vec<StageSlot>) -> Self {
        Self { slots }
    }

    pub fn push(&mut self, slot: StageSlot) {
        self.slots.push(slot);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(StageSlot::name)
    }

    pub fn run(
        &self,
        mut assets: Vec<Asset>,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<Asset>, TransformError> {
        for slot in &self.slots {
            if !slot.applies(ctx.mode) {
                crate::debug!("stage"; "{}: skip {} ({:?} only)", ctx.pipeline, slot.name(), slot.mode);
                continue;
            }
            crate::debug!("stage"; "{}: {} ({} assets)", ctx.pipeline, slot.name(), assets.len());
            assets = slot.run(assets, ctx)?;
        }
        Ok(assets)
    }

    /// Build a chain from declarative stage configs.
    pub fn from_configs(configs: &[StageConfig]) -> Self {
        Self::new(configs.iter().map(slot_from_config).collect())
    }
}

fn slot_from_config(config: &StageConfig) -> StageSlot {
    use crate::config::section::StageKind;

    let slot = match &config.kind {
        StageKind::Include {
            prefix,
            basepath,
            context,
        } => StageSlot::new(FileInclude::new(prefix, basepath, context.clone())),
        StageKind::Concat { file, separator } => StageSlot::new(Concat::new(file, separator)),
        StageKind::MinifyJs => StageSlot::new(MinifyJs),
        StageKind::MinifyCss => StageSlot::new(MinifyCss),
        StageKind::Image {
            webp,
            avif,
            quality,
            keep_original,
        } => StageSlot::new(ImageEncode {
            webp: *webp,
            avif: *avif,
            quality: *quality,
            keep_original: *keep_original,
        }),
        StageKind::Newer { ext } => StageSlot::new(Newer::new(ext.clone())),
        StageKind::Command { command, ext } => {
            StageSlot::new(CommandStage::new(command.clone(), ext.clone()))
        }
        StageKind::Rename { ext, suffix } => StageSlot::new(Rename::new(ext.clone(), suffix.clone())),
    };

    slot.in_mode(config.mode).only(config.only.iter().cloned())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_chain_runs_in_order() {
        let chain = StageChain::new(vec![
            StageSlot::new(Upper),
            StageSlot::new(Concat::new("all.txt", "\n")),
        ]);
        let root = Path::new("/r");
        let out = chain
            .run(
                vec![Asset::new("a.txt", "a"), Asset::new("b.txt", "b")],
                &ctx(root, root),
            )
            .unwrap();
        assert_eq!(out, vec![Asset::new("all.txt", "A\nB")]);
    }

    #[test]
    fn test_only_filter_keeps_positions() {
        let chain = StageChain::new(vec![StageSlot::new(Upper).only(["scss"])]);
        let root = Path::new("/r");
        let out = chain
            .run(
                vec![
                    Asset::new("vendor.css", "v"),
                    Asset::new("main.scss", "m"),
                    Asset::new("z.css", "z"),
                ],
                &ctx(root, root),
            )
            .unwrap();
        let contents: Vec<_> = out.iter().map(|a| a.contents.clone()).collect();
        assert_eq!(contents, vec![b"v".to_vec(), b"M".to_vec(), b"z".to_vec()]);
    }

    #[test]
    fn test_mode_gating() {
        let chain =
            StageChain::new(vec![StageSlot::new(Upper).in_mode(Some(BuildMode::Production))]);
        let root = Path::new("/r");
        let dev = chain.run(vec![Asset::new("a.js", "x")], &ctx(root, root)).unwrap();
        assert_eq!(dev[0].contents, b"x");

        let mut prod_ctx = ctx(root, root);
        prod_ctx.mode = BuildMode::Production;
        let prod = chain.run(vec![Asset::new("a.js", "x")], &prod_ctx).unwrap();
        assert_eq!(prod[0].contents, b"X");
    }

    #[test]
    fn test_error_stops_chain() {
        let chain = StageChain::new(vec![
            StageSlot::new(Fail("minify", "syntax error")),
            StageSlot::new(Upper),
        ]);
        let root = Path::new("/r");
        let err = chain.run(vec![Asset::new("a.js", "x")], &ctx(root, root)).unwrap_err();
        assert_eq!(err, TransformError::new("minify", "syntax error"));
        assert_eq!(err.to_string(), "minify: syntax error");
    }

    #[test]
    fn test_set_contents_detaches_source() {
        let mut asset = Asset::from_source("a.css", b"x".to_vec(), PathBuf::from("/r/a.css"));
        asset.set_contents(b"y".to_vec());
        assert!(asset.source.is_none());
    }
}
