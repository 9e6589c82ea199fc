//! Relay configuration.
//!
//! Configuration can be built in code or loaded from TOML, with the
//! following resolution order for [`RelayConfig::load`]:
//! 1. an explicit path (e.g. `--config <path>`)
//! 2. `<config_dir>/sluice/config.toml` (user, via `dirs`)
//! 3. built-in defaults
//!
//! ```toml
//! [relay]
//! name = "ingest"
//! high_water_mark = 512
//! request_batch = 32
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Result, SluiceError};

/// Default number of buffered items (beyond outstanding demand) at which
/// the source is paused.
pub const DEFAULT_HIGH_WATER_MARK: usize = 256;

/// Default demand issued per refill by [`RelayStream`](crate::RelayStream).
pub const DEFAULT_REQUEST_BATCH: u64 = 16;

/// Relay configuration.
///
/// ```rust
/// # use sluice::RelayConfig;
/// let config = RelayConfig::new()
///     .name("ingest")
///     .high_water_mark(64)
///     .request_batch(8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Label for metrics and logs. Default: "relay".
    #[serde(default = "default_name")]
    pub name: String,
    /// Buffered items beyond outstanding demand that trigger `pause()`.
    /// Default: 256.
    #[serde(default = "default_high_water_mark")]
    pub high_water_mark: usize,
    /// Demand issued per refill by the pull-stream facade. Default: 16.
    #[serde(default = "default_request_batch")]
    pub request_batch: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            high_water_mark: default_high_water_mark(),
            request_batch: default_request_batch(),
        }
    }
}

fn default_name() -> String {
    "relay".to_string()
}

fn default_high_water_mark() -> usize {
    DEFAULT_HIGH_WATER_MARK
}

fn default_request_batch() -> u64 {
    DEFAULT_REQUEST_BATCH
}

impl RelayConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metrics/log label.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the high-water mark.
    pub fn high_water_mark(mut self, n: usize) -> Self {
        self.high_water_mark = n;
        self
    }

    /// Set the refill batch used by the pull-stream facade.
    pub fn request_batch(mut self, n: u64) -> Self {
        self.request_batch = n;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.high_water_mark == 0 {
            return Err(SluiceError::Configuration(
                "high_water_mark must be at least 1".into(),
            ));
        }
        if self.request_batch == 0 {
            return Err(SluiceError::Configuration(
                "request_batch must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    ///
    /// Settings live in a `[relay]` table; other top-level tables are left
    /// for the embedding application. A document without a `[relay]` table
    /// is read as bare relay keys.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(content)?;
        let value = match table.remove("relay") {
            Some(relay) => relay,
            None => toml::Value::Table(table),
        };
        let config: RelayConfig = value.try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit path, else the user config file,
    /// else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load_from_path(p);
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from_path(&user_path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sluice").join("config.toml"))
    }
}
