//! Build mode for production/development runs.

use serde::{Deserialize, Serialize};

/// Which flavor of output a run produces.
///
/// Stages may be gated on a mode (e.g. minification only in production).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    pub const fn from_production(production: bool) -> Self {
        if production {
            Self::Production
        } else {
            Self::Development
        }
    }

    #[inline]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Lowercase name, also the value of `$MODE` in command stages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flag() {
        assert_eq!(BuildMode::from_production(true), BuildMode::Production);
        assert_eq!(BuildMode::from_production(false), BuildMode::Development);
        assert!(!BuildMode::default().is_production());
    }

    #[test]
    fn test_parse_lowercase() {
        #[derive(Deserialize)]
        struct Wrap {
            mode: BuildMode,
        }
        let w: Wrap = toml::from_str("mode = \"production\"").unwrap();
        assert_eq!(w.mode, BuildMode::Production);
        assert_eq!(w.mode.to_string(), "production");
    }
}
