//! Configuration layer: typed settings with layered precedence
//! (defaults → file → environment).

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

const ENV_PREFIX: &str = "RICORDO";
const ENV_SEPARATOR: &str = "_";
const DEFAULT_CONFIG_BASENAME: &str = "ricordo";

/// Top-level settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
}

/// Cache settings from `ricordo.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Enable the in-process cache. When false every operation bypasses
    /// the store.
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration load failed: {0}")]
    Load(#[from] config::ConfigError),
}

/// Load settings from `ricordo.toml` (optional, current directory) layered
/// under `RICORDO_`-prefixed environment variables.
pub fn load() -> Result<Settings, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
        .build()?;
    Ok(config.try_deserialize()?)
}

/// Load settings from an explicit file path, environment layered on top.
pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
        .build()?;
    Ok(config.try_deserialize()?)
}

/// Parse settings from a TOML string.
pub fn parse(toml: &str) -> Result<Settings, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?;
    Ok(config.try_deserialize()?)
}
