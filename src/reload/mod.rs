//! Reload Module
//!
//! Reports pipeline results to the terminal and to connected browsers.
//!
//! ```text
//! Scheduler -> Notifier -> ReloadHub -> Browser
//!                  |
//!                  +-----> WatchStatus (terminal)
//! ```
//!
//! # Modules
//!
//! - `notifier` - Notifier trait, terminal and live-reload sinks
//! - `message` - JSON message protocol (reload, inject, error)
//! - `hub` - Connected WebSocket clients
//! - `server` - WebSocket accept loop

pub mod hub;
pub mod message;
pub mod notifier;
pub mod server;

pub use hub::ReloadHub;
pub use message::ReloadMessage;
pub use notifier::{Notifier, Notifiers, ReloadNotifier, TerminalNotifier};
pub use server::start_ws_server;
