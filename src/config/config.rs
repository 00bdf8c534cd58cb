use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecOptions;
use crate::server::ServerConfig;

use super::cli::CliConfig;
use super::file::FileConfig;
use super::types::LogLevel;

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub log_level: LogLevel,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// CLI/ENV, then the config file they point at.
    pub async fn load() -> Result<Config, ConfigError> {
        let cli = CliConfig::from_args()?;

        let file = match &cli.config_file_location {
            Some(path) => FileConfig::from_file(path).await?,
            None => FileConfig::default(),
        };

        Self::merge(cli, file)
    }

    /// CLI values win over file values, which win over defaults.
    pub fn merge(cli: CliConfig, file: FileConfig) -> Result<Config, ConfigError> {
        let defaults = ServerConfig::default();

        let mut codec: CodecOptions = file.codec;
        if let Some(byte_order) = cli.byte_order {
            codec.byte_order = byte_order;
        }

        let server = ServerConfig {
            host: cli.host.or(file.server.host).unwrap_or(defaults.host),
            port: cli.port.or(file.server.port).unwrap_or(defaults.port),
            pattern: cli
                .pattern
                .or(file.server.pattern)
                .unwrap_or(defaults.pattern),
            buffer_len: cli
                .buffer_len
                .or(file.server.buffer_len)
                .unwrap_or(defaults.buffer_len),
            codec,
        };

        let config = Config {
            server,
            log_level: cli.log_level.or(file.log).unwrap_or_default(),
        };
        config.validate()?;

        Ok(config)
    }
}

// -----------------------------------------------------------------------------
// ----- Config: Private -------------------------------------------------------

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.buffer_len == 0 {
            return Err(ConfigError::InvalidField {
                field: "buffer_len",
                reason: "must be at least 1".into(),
            });
        }

        if !self.server.pattern.starts_with('/') {
            return Err(ConfigError::InvalidField {
                field: "pattern",
                reason: format!("'{}' must start with '/'", self.server.pattern),
            });
        }

        if self.server.codec.initial_capacity == 0 {
            return Err(ConfigError::InvalidField {
                field: "codec.initial_capacity",
                reason: "must be at least 1".into(),
            });
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid CLI/ENV: {0}")]
    Cli(#[from] clap::Error),

    #[error("read error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
