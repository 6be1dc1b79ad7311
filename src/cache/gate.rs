//! Cache gate: the single enable/disable switch.
//!
//! Every store-touching operation consults the gate first. The flag comes
//! from a [`GateSource`], which may be effectful (re-reading a
//! configuration file); source failures are reported as
//! [`ConfigReadError`] and the gate fails closed, so a configuration bug
//! can never leave stale data in play.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use config::{Config, File};
use thiserror::Error;
use tracing::warn;

use crate::config::CacheSettings;

/// The gate's configuration source could not be read.
#[derive(Debug, Clone, Error)]
#[error("cache gate configuration unreadable: {message}")]
pub struct ConfigReadError {
    message: String,
}

impl ConfigReadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Supplies the cache-enabled flag.
pub trait GateSource: Send + Sync {
    fn is_enabled(&self) -> Result<bool, ConfigReadError>;
}

/// A fixed flag, togglable at runtime.
pub struct StaticSource {
    enabled: AtomicBool,
}

impl StaticSource {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

impl GateSource for StaticSource {
    fn is_enabled(&self) -> Result<bool, ConfigReadError> {
        Ok(self.enabled.load(Ordering::Relaxed))
    }
}

/// Re-reads `cache.enabled` from a TOML file on every check.
///
/// Edits to the file take effect on the next cache operation without a
/// restart.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GateSource for FileSource {
    fn is_enabled(&self) -> Result<bool, ConfigReadError> {
        let config = Config::builder()
            .add_source(File::from(self.path.as_path()))
            .build()
            .map_err(|error| ConfigReadError::new(error.to_string()))?;
        config
            .get_bool("cache.enabled")
            .map_err(|error| ConfigReadError::new(error.to_string()))
    }
}

/// The runtime switch consulted before every store operation.
#[derive(Clone)]
pub struct CacheGate {
    source: Arc<dyn GateSource>,
}

impl CacheGate {
    pub fn new(source: Arc<dyn GateSource>) -> Self {
        Self { source }
    }

    /// Gate backed by a fixed flag.
    pub fn fixed(enabled: bool) -> Self {
        Self::new(Arc::new(StaticSource::new(enabled)))
    }

    /// Gate that re-reads `path` on every check.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileSource::new(path)))
    }

    /// Read the switch, failing closed.
    ///
    /// An unreadable source counts as disabled for this call: the caller
    /// recomputes instead of trusting the store.
    pub fn enabled(&self) -> bool {
        match self.source.is_enabled() {
            Ok(enabled) => enabled,
            Err(error) => {
                warn!(
                    error = %error,
                    "Cache gate read failed, treating cache as disabled"
                );
                false
            }
        }
    }

    /// Read the switch, surfacing source failures to the caller.
    pub fn read(&self) -> Result<bool, ConfigReadError> {
        self.source.is_enabled()
    }
}

impl From<&CacheSettings> for CacheGate {
    fn from(settings: &CacheSettings) -> Self {
        Self::fixed(settings.enabled)
    }
}
