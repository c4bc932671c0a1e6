//! Command-line interface module.

mod args;
pub mod build;
pub mod check;
pub mod run;
pub mod serve;
pub mod watch;

pub use args::{Cli, Commands};
