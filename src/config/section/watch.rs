//! `[watch]` section configuration.
//!
//! ```toml
//! [watch]
//! ignore = ["**/node_modules/**"]   # Never turned into change events
//! queue_capacity = 1024             # Beyond this, events coalesce
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Globs (relative to the project root) the change detector drops.
    pub ignore: Vec<String>,

    /// Bounded event queue length between watcher and scheduler.
    pub queue_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ignore: vec!["**/node_modules/**".into(), "**/.git/**".into()],
            queue_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_watch_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.watch.queue_capacity, 1024);
        assert!(config.watch.ignore.iter().any(|g| g.contains("node_modules")));
    }

    #[test]
    fn test_watch_override() {
        let config = test_parse_config("[watch]\nignore = []\nqueue_capacity = 8");
        assert!(config.watch.ignore.is_empty());
        assert_eq!(config.watch.queue_capacity, 8);
    }
}
