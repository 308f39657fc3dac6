//! Service configuration module.
//!
//! Handles loading, validating, and merging `picserve.toml`. Stock defaults
//! are the base layer; the user file only needs the keys it overrides.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! hasher = "sha256"            # sha256 | blake3
//!
//! [storage]
//! path = "data/originals"      # Durable store for uploaded originals
//!
//! [cache]
//! backend = "memory"           # memory | filesystem
//! path = "data/cache"          # Only used by the filesystem backend
//! ttl_secs = 0                 # Sweep cached files older than this (0 = never)
//!
//! [upload]
//! max_bytes = 1048576          # Reject larger uploads
//! normalize = true             # Auto-orient, strip metadata, downscale
//! max_dimension = 4096         # Longest-edge ceiling
//! max_stored_bytes = 5242880   # Shrink further above this size
//!
//! [processing]
//! max_processes = 4            # Warm-up workers (omit for auto = CPU cores)
//!
//! [log]
//! level = "info"               # RUST_LOG overrides this
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::hasher::HashAlgorithm;
use crate::params::MAX_DIMENSION;
use crate::upload::UploadLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file read when `--config` isn't given.
pub const DEFAULT_CONFIG_FILE: &str = "picserve.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `picserve.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Digest used for upload identifiers and cache keys.
    pub hasher: HashAlgorithm,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub upload: UploadConfig,
    pub processing: ProcessingConfig,
    pub log: LogConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "upload.max_bytes must be positive".into(),
            ));
        }
        if !(1..=MAX_DIMENSION).contains(&self.upload.max_dimension) {
            return Err(ConfigError::Validation(format!(
                "upload.max_dimension must be 1-{MAX_DIMENSION}"
            )));
        }
        if self.upload.max_stored_bytes == 0 {
            return Err(ConfigError::Validation(
                "upload.max_stored_bytes must be positive".into(),
            ));
        }
        if self.cache.ttl_secs > 0 && self.cache.backend == CacheBackend::Memory {
            return Err(ConfigError::Validation(
                "cache.ttl_secs requires cache.backend = \"filesystem\"".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be positive".into(),
            ));
        }
        if tracing_subscriber::EnvFilter::try_new(&self.log.level).is_err() {
            return Err(ConfigError::Validation(format!(
                "log.level {:?} is not a valid filter",
                self.log.level
            )));
        }
        Ok(())
    }
}

/// Durable storage for uploaded originals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/originals"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Filesystem,
}

/// Cache for transformed variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Root directory for the filesystem backend.
    pub path: PathBuf,
    /// Age after which cached files are swept. `0` disables the sweep.
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            path: PathBuf::from("data/cache"),
            ttl_secs: 0,
        }
    }
}

/// Upload ingress and normalization limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    pub max_bytes: usize,
    pub normalize: bool,
    pub max_dimension: u32,
    pub max_stored_bytes: u64,
}

impl UploadConfig {
    pub fn limits(&self) -> UploadLimits {
        UploadLimits {
            max_bytes: self.max_bytes,
            normalize: self.normalize,
            max_dimension: self.max_dimension,
            max_stored_bytes: self.max_stored_bytes,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        let limits = UploadLimits::default();
        Self {
            max_bytes: limits.max_bytes,
            normalize: limits.normalize,
            max_dimension: limits.max_dimension,
            max_stored_bytes: limits.max_stored_bytes,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel warm-up workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. `info` or `picserve=debug`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ServiceConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ServiceConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when the file
/// doesn't exist.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock `picserve.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# picserve configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Digest for upload identifiers and cache keys: "sha256" or "blake3".
# Changing it orphans existing cache entries and identifiers.
hasher = "sha256"

# ---------------------------------------------------------------------------
# Durable storage for uploaded originals (one file per identifier)
# ---------------------------------------------------------------------------
[storage]
path = "data/originals"

# ---------------------------------------------------------------------------
# Cache for transformed variants
# ---------------------------------------------------------------------------
[cache]
# "memory" lives as long as the process; "filesystem" persists under `path`.
backend = "memory"
path = "data/cache"

# Remove cached files older than this many seconds. 0 disables the sweep.
# Only valid with backend = "filesystem".
ttl_secs = 0

# ---------------------------------------------------------------------------
# Uploads
# ---------------------------------------------------------------------------
[upload]
# Uploads larger than this are rejected (bytes).
max_bytes = 1048576

# Auto-orient, strip metadata and downscale before storing.
normalize = true

# Longest-edge ceiling applied during normalization (pixels, max 8192).
max_dimension = 4096

# Normalized images larger than this are shrunk further (bytes).
max_stored_bytes = 5242880

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `warm`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[log]
# tracing filter directive. The RUST_LOG environment variable takes precedence.
level = "info"
"##
}
