//! Runtime configuration: CLI/ENV arguments layered over an optional TOML
//! file. Loaded once at start-up and passed down by value.

pub mod cli;
pub mod config;
pub mod file;
pub mod types;

pub use cli::CliConfig;
pub use config::{Config, ConfigError};
pub use file::FileConfig;
pub use types::LogLevel;
