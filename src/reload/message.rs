//! Live Reload Message Protocol
//!
//! JSON messages pushed over WebSocket to development clients.
//!
//! # Message Types
//!
//! - `connected`: sent once per connection
//! - `reload`: full page reload
//! - `inject`: swap one resource in place (stylesheets)
//! - `error` / `clear_error`: show or hide the failure overlay

use serde::{Deserialize, Serialize};

/// Message sent over WebSocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Connection established
    Connected {
        /// Server version for compatibility check
        version: String,
    },

    /// Full page reload
    Reload {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Replace a resource without reloading the page
    Inject {
        /// Resource kind, currently always `css`
        kind: String,
        /// URL path of the resource (e.g. `/css/style.min.css`)
        path: String,
    },

    /// Pipeline failure (display overlay, no reload)
    Error { pipeline: String, error: String },

    /// Clear error overlay (every failing pipeline recovered)
    ClearError,
}

impl ReloadMessage {
    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn reload(reason: impl Into<String>) -> Self {
        Self::Reload {
            reason: Some(reason.into()),
        }
    }

    pub fn inject_css(path: impl Into<String>) -> Self {
        Self::Inject {
            kind: "css".to_string(),
            path: path.into(),
        }
    }

    pub fn error(pipeline: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Error {
            pipeline: pipeline.into(),
            error: error.into(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }

    /// Parse from JSON string
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}
