//! Configuration errors.

use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no platform config directory available")]
    NoConfigDir,

    /// A value the pipeline cannot run with: zero concurrency, zero-length
    /// chunks, or an overlap that leaves no forward stride.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
