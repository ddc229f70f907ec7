//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file; logging, scan cadence, ledger
//! storage, and default source TTL are the only engine-level knobs the core
//! itself reads (spec §6: concrete per-source/per-sink settings are an
//! embedding binary's concern, not the core's).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_fetch_deadline_secs")]
    pub fetch_deadline_secs: u64,
    #[serde(default = "default_sink_deadline_secs")]
    pub sink_deadline_secs: u64,
    /// Name of the source whose payload decodes to `Vec<Market>` — the
    /// pipeline's Phase C input. Not named by the distilled spec's data
    /// model; resolved here as a required config field (see DESIGN.md).
    pub primary_source: String,
}

const fn default_deadline_secs() -> u64 {
    120
}

const fn default_interval_secs() -> u64 {
    300
}

const fn default_fetch_deadline_secs() -> u64 {
    30
}

const fn default_sink_deadline_secs() -> u64 {
    5
}

impl ScanConfig {
    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn sink_deadline(&self) -> Duration {
        Duration::from_secs(self.sink_deadline_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

const fn default_ttl_secs() -> u64 {
    300
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self { default_ttl_secs: default_ttl_secs() }
    }
}

impl SourcesConfig {
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scan: ScanConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads and validates configuration from a TOML file (teacher:
    /// `app::config::Config::load`).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.scan.primary_source.trim().is_empty() {
            return Err(ConfigError::MissingPrimarySource.into());
        }
        Ok(())
    }

    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.logging.level));

        match self.logging.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}
