//! Storage file location
//!
//! Resolves the on-disk path of a namespace's storage file. When a
//! shared-container identifier is configured and the resolver can map
//! it to an existing directory, the file lives inside that container;
//! otherwise it lives under the private `data_dir`.
//!
//! Resolution is deterministic and pure given the configuration and
//! resolver. A shared-container identifier that cannot be resolved is
//! a non-fatal degradation: the locator falls back to the private path
//! and logs one WARN.

use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::observability::Logger;

/// Maps a shared-container identifier to a directory, if the platform
/// (or the embedding application) provides one.
pub trait ContainerResolver: Send + Sync {
    /// Returns the container directory for `identifier`, or `None`
    /// when the identifier cannot be resolved.
    fn resolve_container(&self, identifier: &str) -> Option<PathBuf>;
}

/// Resolver backed by a root directory of named containers.
///
/// `identifier` resolves to `<root>/<identifier>` when that directory
/// exists.
#[derive(Debug, Clone)]
pub struct DirContainerResolver {
    root: PathBuf,
}

impl DirContainerResolver {
    /// Create a resolver rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ContainerResolver for DirContainerResolver {
    fn resolve_container(&self, identifier: &str) -> Option<PathBuf> {
        let dir = self.root.join(identifier);
        if dir.is_dir() {
            Some(dir)
        } else {
            None
        }
    }
}

/// Resolver that never resolves any container.
///
/// The default when the embedding application has no shared-container
/// facility; configuration with a container id then always uses the
/// private path.
#[derive(Debug, Clone, Default)]
pub struct NoContainerResolver;

impl ContainerResolver for NoContainerResolver {
    fn resolve_container(&self, _identifier: &str) -> Option<PathBuf> {
        None
    }
}

/// Resolves storage file paths for one configuration.
pub struct FileLocator {
    data_dir: PathBuf,
    shared_container_id: Option<String>,
    resolver: Box<dyn ContainerResolver>,
}

impl FileLocator {
    /// Create a locator for `config` with the given resolver.
    pub fn new(config: &StorageConfig, resolver: Box<dyn ContainerResolver>) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            shared_container_id: config.shared_container_id.clone(),
            resolver,
        }
    }

    /// Create a locator that never uses a shared container.
    pub fn private_only(config: &StorageConfig) -> Self {
        Self::new(config, Box::new(NoContainerResolver))
    }

    /// Returns the private storage root.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Resolves `file_name` to its full storage path.
    ///
    /// Prefers the shared container when one is configured and
    /// resolvable; falls back to `<data_dir>/<file_name>` otherwise.
    pub fn resolve(&self, file_name: &str) -> PathBuf {
        if let Some(identifier) = &self.shared_container_id {
            match self.resolver.resolve_container(identifier) {
                Some(container) => return container.join(file_name),
                None => {
                    Logger::warn(
                        "shared_container_fallback",
                        &[("identifier", identifier), ("file", file_name)],
                    );
                }
            }
        }
        self.data_dir.join(file_name)
    }
}
