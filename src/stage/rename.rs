use std::ffi::OsString;

use super::{Asset, Stage, StageContext, TransformError};

/// Change the extension and/or append a suffix to the file stem.
///
/// `main.js` with suffix `.min` becomes `main.min.js`.
#[derive(Debug, Clone)]
pub struct Rename {
    ext: Option<String>,
    suffix: Option<String>,
}

impl Rename {
    pub fn new(ext: Option<String>, suffix: Option<String>) -> Self {
        Self { ext, suffix }
    }
}

impl Stage for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    fn run(&self, assets: Vec<Asset>, _ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        Ok(assets
            .into_iter()
            .map(|mut asset| {
                let ext = self
                    .ext
                    .clone()
                    .unwrap_or_else(|| asset.ext().to_string());
                let mut name: OsString = asset.path.file_stem().unwrap_or_default().to_owned();
                if let Some(suffix) = &self.suffix {
                    name.push(suffix);
                }
                if !ext.is_empty() {
                    name.push(".");
                    name.push(ext);
                }
                asset.path.set_file_name(name);
                asset
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::test_support::ctx;
    use std::path::Path;

    fn rename(stage: Rename, path: &str) -> String {
        let root = Path::new("/r");
        let out = stage.run(vec![Asset::new(path, "")], &ctx(root, root)).unwrap();
        out[0].path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_suffix() {
        assert_eq!(rename(Rename::new(None, Some(".min".into())), "js/main.js"), "js/main.min.js");
    }

    #[test]
    fn test_extension() {
        assert_eq!(rename(Rename::new(Some("css".into()), None), "main.scss"), "main.css");
    }

    #[test]
    fn test_both() {
        assert_eq!(
            rename(Rename::new(Some("css".into()), Some(".min".into())), "style.scss"),
            "style.min.css"
        );
    }
}
