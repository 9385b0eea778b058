//! Dataset configuration and store tuning.
//!
//! A dataset is configured by its root directory, shard count and
//! zero-density threshold. Everything that ends up in a fragment group's
//! metadata is derived from here, so changing any of these values for an
//! existing dataset makes its groups fail validation on open.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Storage schema version. Bump on any incompatible change to the on-disk layout.
pub const SCHEMA_VERSION: u32 = 1;

/// Default zero-density threshold.
///
/// Fragments whose total is at or below this are candidates for compressed
/// storage. The value is a guess and not backed by measurements.
pub const DEFAULT_FRAGMENT_TOTAL_ZMAX: f64 = 2.0;

/// Configuration for a [`crate::Dataset`].
///
/// # Example
///
/// ```rust
/// use fragstore::config::DatasetConfig;
///
/// let config = DatasetConfig::new("/tmp/wiki-hourly", 4);
/// assert_eq!(config.hashmod, 4);
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Directory holding one database file per fragment group.
    pub root: PathBuf,

    /// Number of shards. Fixed at dataset creation.
    pub hashmod: u32,

    /// Zero-density threshold recorded in every group's metadata.
    #[serde(default = "default_zmax")]
    pub fragment_total_zmax: f64,

    /// Backend tuning applied on every open.
    #[serde(default)]
    pub tuning: StoreTuning,
}

fn default_zmax() -> f64 {
    DEFAULT_FRAGMENT_TOTAL_ZMAX
}

impl DatasetConfig {
    /// Creates a configuration with default threshold and tuning.
    pub fn new<P: Into<PathBuf>>(root: P, hashmod: u32) -> Self {
        Self {
            root: root.into(),
            hashmod,
            fragment_total_zmax: DEFAULT_FRAGMENT_TOTAL_ZMAX,
            tuning: StoreTuning::default(),
        }
    }

    /// Reads a configuration from a JSON file and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`], [`ConfigError::Parse`], or a
    /// validation error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHashmod`] or [`ConfigError::InvalidZmax`].
    pub fn validate(&self) -> Result<()> {
        if self.hashmod == 0 {
            return Err(ConfigError::InvalidHashmod.into());
        }
        if !self.fragment_total_zmax.is_finite() || self.fragment_total_zmax < 0.0 {
            return Err(ConfigError::InvalidZmax {
                value: self.fragment_total_zmax,
            }
            .into());
        }
        Ok(())
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Keep the journal file between transactions instead of deleting it.
    /// Avoids file create/delete metadata traffic on parallel filesystems.
    #[default]
    Persist,
    /// Delete the journal after each transaction.
    Delete,
    /// Write-ahead log.
    Wal,
}

impl JournalMode {
    /// Returns the pragma value.
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Persist => "PERSIST",
            Self::Delete => "DELETE",
            Self::Wal => "WAL",
        }
    }
}

/// SQLite synchronous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// No fsync. Buckets hold derived data that can be recomputed.
    #[default]
    Off,
    /// Sync at critical moments.
    Normal,
    /// Sync on every commit.
    Full,
}

impl SyncMode {
    /// Returns the pragma value.
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
        }
    }
}

/// Per-connection backend tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreTuning {
    /// Page size in bytes, applied only when a bucket is first created.
    pub page_size: u32,
    /// Page cache size in KiB.
    pub cache_size_kib: u32,
    /// Journal mode.
    pub journal_mode: JournalMode,
    /// Synchronous mode.
    pub synchronous: SyncMode,
}

impl Default for StoreTuning {
    fn default() -> Self {
        Self {
            page_size: 65_536,
            cache_size_kib: 1_048_576,
            journal_mode: JournalMode::Persist,
            synchronous: SyncMode::Off,
        }
    }
}
