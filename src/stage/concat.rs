use std::path::PathBuf;

use super::{Asset, Stage, StageContext, TransformError};

/// Join every input, in order, into a single file.
#[derive(Debug, Clone)]
pub struct Concat {
    file: PathBuf,
    separator: String,
}

impl Concat {
    pub fn new(file: impl Into<PathBuf>, separator: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            separator: separator.into(),
        }
    }
}

impl Stage for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn run(&self, assets: Vec<Asset>, _ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        if assets.is_empty() {
            return Ok(assets);
        }

        let total: usize = assets.iter().map(|a| a.contents.len()).sum();
        let mut contents = Vec::with_capacity(total + assets.len() * self.separator.len());
        for (i, asset) in assets.iter().enumerate() {
            if i > 0 {
                contents.extend_from_slice(self.separator.as_bytes());
            }
            contents.extend_from_slice(&asset.contents);
        }
        Ok(vec![Asset::new(self.file.clone(), contents)])
    }
}
