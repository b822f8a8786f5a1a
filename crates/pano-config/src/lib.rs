//! Configuration for the panorama capture and bake pipeline.
//!
//! Settings persist to disk as `config.ron`. Every section is
//! `#[serde(default)]`, so older or newer files keep loading. CLI flags
//! override the loaded values.

mod bake;
mod cli;
mod config;
mod error;

pub use bake::{BakeOptions, OutputEncoding};
pub use cli::CliArgs;
pub use config::{CaptureConfig, Config, DebugConfig, ExportConfig, default_config_dir};
pub use error::ConfigError;
