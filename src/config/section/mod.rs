//! Configuration section definitions.
//!
//! Each module corresponds to a section in `kiln.toml`:
//!
//! | Module     | TOML Section   | Purpose                            |
//! |------------|----------------|------------------------------------|
//! | `build`    | `[build]`      | Full-build cleaning and ordering   |
//! | `pipeline` | `[[pipeline]]` | Pipeline declarations and stages   |
//! | `serve`    | `[serve]`      | Development server                 |
//! | `watch`    | `[watch]`      | Change detection                   |

mod build;
mod pipeline;
mod serve;
mod watch;

pub use build::BuildConfig;
pub use pipeline::{PipelineConfig, StageConfig, StageKind};
pub use serve::ServeConfig;
pub use watch::WatchConfig;
