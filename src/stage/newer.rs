use crate::freshness::{get_mtime, is_output_fresh};

use super::{Asset, Stage, StageContext, TransformError};

/// Drop inputs whose output under the target directory is already up to date.
///
/// `ext` names the output extension when a later stage converts the file
/// (`hero.png` is checked against `hero.webp`).
#[derive(Debug, Clone, Default)]
pub struct Newer {
    ext: Option<String>,
}

impl Newer {
    pub fn new(ext: Option<String>) -> Self {
        Self { ext }
    }
}

impl Stage for Newer {
    fn name(&self) -> &str {
        "newer"
    }

    fn run(&self, assets: Vec<Asset>, ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        let before = assets.len();
        let kept: Vec<Asset> = assets
            .into_iter()
            .filter(|asset| {
                // Only files that still mirror a source on disk can be compared
                let Some(source) = &asset.source else {
                    return true;
                };
                let mut output = ctx.target.join(&asset.path);
                if let Some(ext) = &self.ext {
                    output.set_extension(ext);
                }
                !is_output_fresh(&output, get_mtime(source))
            })
            .collect();

        if kept.len() < before {
            crate::debug!("newer"; "{}: {} of {} up to date", ctx.pipeline, before - kept.len(), before);
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::test_support::ctx;
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write_at(path: &Path, at: SystemTime) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
        File::options().write(true).open(path).unwrap().set_modified(at).unwrap();
    }

    #[test]
    fn test_drops_up_to_date_inputs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let target = root.join("out");
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);

        let old_src = root.join("src/old.png");
        let new_src = root.join("src/new.png");
        write_at(&old_src, t0);
        write_at(&new_src, t0 + Duration::from_secs(100));
        write_at(&target.join("old.webp"), t0 + Duration::from_secs(50));
        write_at(&target.join("new.webp"), t0 + Duration::from_secs(50));

        let assets = vec![
            Asset::from_source("old.png", b"x".to_vec(), old_src),
            Asset::from_source("new.png", b"x".to_vec(), new_src),
            Asset::new("generated.png", "x"),
        ];
        let out = Newer::new(Some("webp".into()))
            .run(assets, &ctx(root, &target))
            .unwrap();
        let paths: Vec<_> = out.iter().map(|a| a.path.to_string_lossy().into_owned()).collect();
        assert_eq!(paths, vec!["new.png", "generated.png"]);
    }

    #[test]
    fn test_missing_output_keeps_input() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.svg");
        fs::write(&src, "<svg/>").unwrap();
        let target = dir.path().join("out");
        let out = Newer::default()
            .run(vec![Asset::from_source("a.svg", b"<svg/>".to_vec(), src)], &ctx(dir.path(), &target))
            .unwrap();
        assert_eq!(out.len(), 1);
    }
}
