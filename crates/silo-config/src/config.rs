//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub index: IndexConfig,
}

impl Config {
    /// Load configuration from the default location. A missing file yields
    /// the defaults.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &PathBuf) -> ConfigResult<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.run.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "run.concurrency must be at least 1".to_string(),
            ));
        }
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "chunking.chunk_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.chunking.overlap_fraction) {
            return Err(ConfigError::Invalid(format!(
                "chunking.overlap_fraction must be in [0, 1), got {}",
                self.chunking.overlap_fraction
            )));
        }
        // A stride of zero would chunk forever.
        let overlap = (self.chunking.chunk_size as f64 * self.chunking.overlap_fraction) as usize;
        if overlap >= self.chunking.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "overlap of {} chars leaves no forward stride for chunk_size {}",
                overlap, self.chunking.chunk_size
            )));
        }
        Ok(())
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &PathBuf) -> ConfigResult<()> {
        let default_config = Self::default_config_string();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, default_config)?;
        Ok(())
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Silo Configuration
# Corpus ingestion engine for retrieval-augmented question answering

[run]
# Maximum number of files processed in parallel
concurrency = 7

# Wall-clock ceiling for one batch run, in minutes. Files not dispatched
# before the deadline are left for the next run.
deadline_minutes = 120

[chunking]
# Chunk size in characters
chunk_size = 500

# Fraction of each chunk shared with its predecessor, in [0, 1)
overlap_fraction = 0.1

[ledger]
# Path to the ledger database (defaults to the platform data dir)
# path = "~/.local/share/silo/ledger.db"

# Minutes after which a record stuck in_progress becomes reclaimable
stale_after_minutes = 120

[provider]
# Model server address
host = "http://localhost:11434"

# Model for generating embeddings
embedding_model = "nomic-embed-text"

# Model for speaker attribution and image description
generation_model = "llama3.2-vision"

# Transcription service address (speaker-labelled segments)
transcribe_host = "http://localhost:9000"

# Per-call timeout in seconds (distinct from the run deadline)
timeout_seconds = 300

# Bounded retries for transient provider errors
max_retries = 3

[index]
# Vector index address
host = "http://localhost:9200"

# Index name
index_name = "silo-corpus"
"#
        .to_string()
    }
}

/// Batch run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum number of files processed in parallel.
    pub concurrency: usize,
    /// Wall-clock ceiling for one batch run, in minutes.
    pub deadline_minutes: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 7,
            deadline_minutes: 120,
        }
    }
}

/// Chunker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Chunk size in characters.
    pub chunk_size: usize,
    /// Fraction of each chunk shared with its predecessor, in [0, 1).
    pub overlap_fraction: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap_fraction: 0.1,
        }
    }
}

/// Ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Override for the ledger database path.
    pub path: Option<PathBuf>,
    /// Minutes after which a stuck in_progress record becomes reclaimable.
    pub stale_after_minutes: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: None,
            stale_after_minutes: 120,
        }
    }
}

/// Model server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub host: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub transcribe_host: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            generation_model: "llama3.2-vision".to_string(),
            transcribe_host: "http://localhost:9000".to_string(),
            timeout_seconds: 300,
            max_retries: 3,
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub host: String,
    pub index_name: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:9200".to_string(),
            index_name: "silo-corpus".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_default_config_string_parses() {
        let config: Config = toml::from_str(&Config::default_config_string()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.run.concurrency, 7);
        assert_eq!(config.chunking.chunk_size, 500);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.run.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_overlap_outside_range() {
        let mut config = Config::default();
        config.chunking.overlap_fraction = 1.0;
        assert!(config.validate().is_err());

        config.chunking.overlap_fraction = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_stride() {
        // chunk_size 1 with any overlap rounds to 0 overlap chars, fine;
        // but a fraction that consumes the whole chunk is rejected up front.
        let mut config = Config::default();
        config.chunking.chunk_size = 10;
        config.chunking.overlap_fraction = 0.99;
        // floor(10 * 0.99) = 9, stride 1: still valid
        assert!(config.validate().is_ok());

        config.chunking.overlap_fraction = 0.999;
        // floor(10 * 0.999) = 9, stride 1: still valid
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "run = [not toml").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.run.concurrency, 7);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.run.concurrency = 3;
        config.chunking.chunk_size = 400;
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.run.concurrency, 3);
        assert_eq!(reloaded.chunking.chunk_size, 400);
    }
}
