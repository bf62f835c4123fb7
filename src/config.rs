//! Configuration for brtrecover
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a recovery run
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    // -------------------------------------------------------------------------
    // Directory Configuration
    // -------------------------------------------------------------------------
    /// Root directory holding the tree files. Paths inside log records are
    /// resolved against it.
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── __recoverylock_dont_delete_me   (recovery lock sentinel)
    ///     └── *.brt                           (tree files named by the log)
    pub data_dir: PathBuf,

    /// Directory holding the log segments (`log000000000000.tokulog`, ...)
    pub log_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Page Cache Configuration
    // -------------------------------------------------------------------------
    /// Resident size of the page cache before unpinned pages are evicted (in bytes)
    pub cache_size: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            log_dir: PathBuf::from("."),
            cache_size: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl RecoveryConfig {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for RecoveryConfig
#[derive(Default)]
pub struct ConfigBuilder {
    config: RecoveryConfig,
}

impl ConfigBuilder {
    /// Set the data directory (root for all tree files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the log directory (where segments are discovered)
    pub fn log_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_dir = path.into();
        self
    }

    /// Set the page cache size limit (in bytes)
    pub fn cache_size(mut self, size: usize) -> Self {
        self.config.cache_size = size;
        self
    }

    pub fn build(self) -> RecoveryConfig {
        self.config
    }
}
