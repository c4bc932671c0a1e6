//! Freshness detection: mtime comparison between sources and outputs.

pub mod mtime;

pub use mtime::{get_mtime, is_output_fresh};
