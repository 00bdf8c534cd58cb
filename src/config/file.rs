use serde::Deserialize;
use std::path::Path;
use tokio::fs;

use crate::codec::CodecOptions;

use super::config::ConfigError;
use super::types::LogLevel;

// -----------------------------------------------------------------------------
// ----- FileConfig ------------------------------------------------------------

/// On-disk format:
///
/// ```toml
/// log = "info"
///
/// [server]
/// host = "0.0.0.0"
/// port = 8080
/// pattern = "/"
/// buffer_len = 1024
///
/// [codec]
/// byte_order = "big_endian"
/// max_payload = 409600
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub log: Option<LogLevel>,
    pub server: ServerSection,
    pub codec: CodecOptions,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub pattern: Option<String>,
    pub buffer_len: Option<usize>,
}

// -----------------------------------------------------------------------------
// ----- FileConfig: Static ----------------------------------------------------

impl FileConfig {
    pub async fn from_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let raw = fs::read_to_string(path).await.map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<FileConfig, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Toml { source: e })
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
