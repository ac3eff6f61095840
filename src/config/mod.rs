//! Store configuration
//!
//! Configuration is an explicit value passed to
//! [`Store::open`](crate::store::Store::open); there is no
//! process-wide singleton.
//! Each namespace gets its own configuration and its own store, which
//! keeps multiple independent stores in one process possible (and keeps
//! tests hermetic).
//!
//! Misconfiguration is a propagated [`ConfigError`], never a process
//! abort: the embedding caller decides whether it is fatal.

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::path::PathBuf;

/// Default compaction threshold: 50 MB.
pub const DEFAULT_COMPACTION_THRESHOLD: u64 = 50 * 1024 * 1024;

/// Default live-data fraction below which compaction triggers.
pub const DEFAULT_COMPACTION_USED_FRACTION: f64 = 0.5;

/// When to compact the storage file on open.
///
/// Compaction runs when the file exceeds `threshold_bytes` and live
/// records occupy less than `used_fraction` of it.
#[derive(Debug, Clone, Copy)]
pub struct CompactionPolicy {
    /// File size above which compaction is considered.
    pub threshold_bytes: u64,
    /// Live-byte fraction below which compaction triggers.
    pub used_fraction: f64,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_COMPACTION_THRESHOLD,
            used_fraction: DEFAULT_COMPACTION_USED_FRACTION,
        }
    }
}

impl CompactionPolicy {
    /// Returns whether a file of `total_bytes` with `used_bytes` of live
    /// data should be compacted.
    pub fn should_compact(&self, total_bytes: u64, used_bytes: u64) -> bool {
        total_bytes > self.threshold_bytes
            && (used_bytes as f64) < (total_bytes as f64) * self.used_fraction
    }
}

/// Configuration for one store namespace.
///
/// Immutable once the store is opened. The storage file lives at
/// `<data_dir>/<namespace>.odb`, or inside the resolved shared
/// container when `shared_container_id` is set and resolvable.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Private storage root for this process.
    pub data_dir: PathBuf,
    /// Namespace; becomes the storage file stem.
    pub namespace: String,
    /// Schema version; must increment when record shapes change.
    pub schema_version: u64,
    /// Optional shared-container identifier for cross-target storage.
    pub shared_container_id: Option<String>,
    /// Compaction policy applied on open.
    pub compaction: CompactionPolicy,
}

impl StorageConfig {
    /// Create a configuration with default compaction and no shared
    /// container.
    pub fn new(data_dir: impl Into<PathBuf>, namespace: impl Into<String>, schema_version: u64) -> Self {
        Self {
            data_dir: data_dir.into(),
            namespace: namespace.into(),
            schema_version,
            shared_container_id: None,
            compaction: CompactionPolicy::default(),
        }
    }

    /// Set a shared-container identifier.
    pub fn with_shared_container(mut self, identifier: impl Into<String>) -> Self {
        self.shared_container_id = Some(identifier.into());
        self
    }

    /// Override the compaction policy.
    pub fn with_compaction(mut self, policy: CompactionPolicy) -> Self {
        self.compaction = policy;
        self
    }

    /// File name of the storage file for this namespace.
    pub fn file_name(&self) -> String {
        format!("{}.odb", self.namespace)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyNamespace`] when the namespace is
    /// blank, and [`ConfigError::InvalidNamespace`] when it contains
    /// path separators or parent-directory components.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        if self.namespace.contains('/') || self.namespace.contains('\\') || self.namespace.contains("..") {
            return Err(ConfigError::InvalidNamespace(self.namespace.clone()));
        }
        Ok(())
    }
}
