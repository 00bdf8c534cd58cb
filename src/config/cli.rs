use clap::Parser;
use std::path::PathBuf;

use crate::codec::ByteOrder;

use super::config::ConfigError;
use super::types::LogLevel;

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

/// Values given on the command line or in the environment. Anything left
/// unset falls back to the config file, then to built-in defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub pattern: Option<String>,
    pub buffer_len: Option<usize>,
    pub byte_order: Option<ByteOrder>,
    pub log_level: Option<LogLevel>,
    pub config_file_location: Option<PathBuf>,
}

impl CliConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = Args::try_parse()?;
        Ok(args.into())
    }

    pub fn parse_from<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let args = Args::try_parse_from(args)?;
        Ok(args.into())
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "wscrab", version, about = "WebSocket relay server")]
struct Args {
    // Host name or IP literal to bind.
    #[arg(long = "host", short = 'H', env = "WSCRAB_HOST")]
    host: Option<String>,

    #[arg(long = "port", short = 'p', env = "WSCRAB_PORT")]
    port: Option<u16>,

    // Route the upgrade is served on; trailing slash makes it a prefix.
    #[arg(long = "pattern", env = "WSCRAB_PATTERN")]
    pattern: Option<String>,

    // Queue depth and largest accepted message, in bytes.
    #[arg(long = "buffer-len", env = "WSCRAB_BUFFER_LEN")]
    buffer_len: Option<usize>,

    #[arg(long = "byte-order", value_enum)]
    byte_order: Option<ByteOrder>,

    #[arg(long = "log", value_enum)]
    log_level: Option<LogLevel>,

    // Optional; must exist when given.
    #[arg(long = "config", env = "WSCRAB_CONFIG_FILE")]
    config_file: Option<PathBuf>,
}

impl From<Args> for CliConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            pattern: args.pattern,
            buffer_len: args.buffer_len,
            byte_order: args.byte_order,
            log_level: args.log_level,
            config_file_location: args.config_file,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
