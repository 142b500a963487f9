//! `mnemo` Configuration Module
//!
//! Provides configuration file support via `mnemo.toml`, environment
//! variables, and runtime overrides.
//!
//! # Priority (highest to lowest)
//!
//! 1. Runtime overrides (API)
//! 2. Environment variables (`MNEMO_*`)
//! 3. Configuration file (`mnemo.toml`)
//! 4. Default values

use crate::distance::DistanceMetric;
use figment::{
    providers::{Data, Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration file.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Per-index HNSW configuration, fixed at [`open_index`].
///
/// Two indices are compatible only if they share the dimension, the metric
/// and the key schema; reopening a contract with a different configuration
/// is refused by the store.
///
/// [`open_index`]: crate::MemoryStore::open_index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Vector dimension (e.g., 768 for many embedding models).
    pub dimension: usize,

    /// Target out-degree for layers above 0 (M parameter).
    /// Higher = better recall, more stored edges, slower insert.
    pub m: usize,

    /// Size of the dynamic candidate list during construction.
    /// Higher = better recall, slower indexing.
    pub ef_construction: usize,

    /// Size of the dynamic candidate list at layer 0 during search.
    /// Must be at least `k` for a query of `k`.
    pub ef_search: usize,

    /// Distance metric used at insert and query time.
    pub metric: DistanceMetric,

    /// Capacity of the in-process adjacency cache, in layer nodes.
    /// 0 disables the cache.
    pub cache_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: 768,
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            metric: DistanceMetric::Cosine,
            cache_size: 4096,
        }
    }
}

impl IndexConfig {
    /// Maximum vector dimension supported by the wire format.
    pub const MAX_DIMENSION: usize = 4096;

    /// Creates a configuration for the given dimension with default tuning.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] when the dimension is zero or above
    /// [`Self::MAX_DIMENSION`], `m` is out of range, or the candidate list
    /// sizes cannot satisfy the search contract.
    pub fn validate(&self) -> crate::Result<()> {
        if self.dimension == 0 || self.dimension > Self::MAX_DIMENSION {
            return Err(crate::Error::Config(format!(
                "dimension must be in 1..={}, got {}",
                Self::MAX_DIMENSION,
                self.dimension
            )));
        }
        if self.m < 2 || self.m > 128 {
            return Err(crate::Error::Config(format!(
                "m must be in 2..=128, got {}",
                self.m
            )));
        }
        if self.ef_construction < self.m {
            return Err(crate::Error::Config(format!(
                "ef_construction ({}) must be at least m ({})",
                self.ef_construction, self.m
            )));
        }
        if self.ef_search == 0 {
            return Err(crate::Error::Config(
                "ef_search must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Hard out-degree cap for the given layer: `2M` at layer 0, `M` above.
    #[must_use]
    pub const fn m_max(&self, layer: u32) -> usize {
        if layer == 0 {
            self.m * 2
        } else {
            self.m
        }
    }

    /// Level-generation scale factor, `1 / ln(M)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn level_mult(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }
}

/// Process-wide configuration loaded from file and environment.
///
/// Applications typically load this once at startup and derive per-contract
/// [`IndexConfig`] values from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Default index tuning applied to newly opened contracts.
    pub index: IndexConfig,

    /// Backend section.
    pub backend: BackendConfig,
}

/// Backend configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Advisory ceiling on entries per batch write, 0 = let the backend
    /// decide. Oversize batches are split adaptively either way.
    pub max_batch_entries: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            max_batch_entries: 0,
        }
    }
}

impl StoreConfig {
    /// Loads configuration from `mnemo.toml` and `MNEMO_*` environment
    /// variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] when a provider yields malformed
    /// values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment(Toml::file("mnemo.toml"))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Loads configuration from an explicit file path plus the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] when the file does not exist,
    /// or [`ConfigError::ParseError`] on malformed content.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        Self::figment(Toml::file(path))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn figment(file: Data<Toml>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(file)
            .merge(Env::prefixed("MNEMO_").split("_").lowercase(false))
    }
}
