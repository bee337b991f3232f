pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::TomlConfig;

pub use adapters::{http::HttpJobApi, websocket::WebSocketTransport};
pub use core::{
    date_range::{months_between, validate_minimum_span},
    launcher::JobLauncher,
    log_buffer::StreamLogBuffer,
    session::{StreamSession, Subscription},
};
pub use utils::error::{ConsoleError, Result};
