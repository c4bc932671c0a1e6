//! Core types shared across the codebase.

mod mode;
mod state;

pub use mode::BuildMode;
pub use state::{
    is_serving, is_shutdown, register_server, register_shutdown, set_serving,
    setup_shutdown_handler,
};
