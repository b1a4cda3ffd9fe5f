//! Silo Config - Configuration loading for the silo ingestion engine.

mod config;
mod error;
mod paths;

pub use config::{
    ChunkingConfig, Config, IndexConfig, LedgerConfig, ProviderConfig, RunConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use paths::AppPaths;
