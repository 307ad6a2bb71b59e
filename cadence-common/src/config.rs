//! Configuration loading
//!
//! Configuration file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `CADENCE_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/cadence/config.toml` on Linux)
//! 4. Compiled defaults (a missing file is not an error)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "CADENCE_CONFIG";

/// Top-level configuration file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct CadenceConfig {
    /// Root of the local music library; relative song paths resolve below it
    pub music_directory: Option<PathBuf>,

    /// Decoder settings
    pub decoder: DecoderConfig,
}

/// `[decoder]` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecoderConfig {
    /// Plugin tried last for remote streams without MIME type or suffix
    pub fallback_plugin: String,

    /// Number of chunks in the pool shared with the playback worker
    pub buffer_chunks: usize,

    /// Interleaved samples per chunk
    pub chunk_samples: usize,

    /// Plugins removed from the registry
    pub disabled_plugins: Vec<String>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            fallback_plugin: "mp3".to_string(),
            buffer_chunks: 64,
            chunk_samples: 4096,
            disabled_plugins: Vec::new(),
        }
    }
}

impl CadenceConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Resolve and load the configuration following the priority order
    ///
    /// An explicitly named file (argument or environment variable) must
    /// exist and parse. The platform default file is optional: when it is
    /// absent the compiled defaults are used.
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            debug!("Loading configuration from command line path {}", path.display());
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            debug!("Loading configuration from {}={}", CONFIG_ENV_VAR, path);
            return Self::load(Path::new(&path));
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                debug!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            _ => {
                warn!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.decoder.buffer_chunks == 0 {
            return Err(Error::Config("decoder.buffer_chunks must be positive".to_string()));
        }
        if self.decoder.chunk_samples == 0 {
            return Err(Error::Config("decoder.chunk_samples must be positive".to_string()));
        }
        if self.decoder.fallback_plugin.trim().is_empty() {
            return Err(Error::Config("decoder.fallback_plugin must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Platform default configuration file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cadence").join("config.toml"))
}
