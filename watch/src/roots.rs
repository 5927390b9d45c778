//! The set of project roots currently observed.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use vhdl_types::Disposable;

use crate::WatchError;
use crate::registry::WatchRegistry;
use crate::watcher::{DescriptorWatcher, WatchEvent};

/// A root joining or leaving the workspace at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootChange {
    Added(PathBuf),
    Removed(PathBuf),
}

/// Canonical registry key for a root directory.
pub fn root_key(path: &Path) -> Result<String, WatchError> {
    let canonical = path
        .canonicalize()
        .map_err(|source| WatchError::Canonicalize {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(canonical.to_string_lossy().into_owned())
}

/// Owns one descriptor watcher per observed root.
///
/// All watchers report on a single channel, handed out by
/// [`WorkspaceRoots::new`].
pub struct WorkspaceRoots {
    descriptor: String,
    registry: WatchRegistry<DescriptorWatcher>,
    events_tx: mpsc::UnboundedSender<WatchEvent>,
}

impl WorkspaceRoots {
    #[must_use]
    pub fn new(descriptor: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<WatchEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let roots = Self {
            descriptor: descriptor.into(),
            registry: WatchRegistry::new(),
            events_tx,
        };
        (roots, events_rx)
    }

    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Start observing `path`. `Ok(false)` if it is already observed.
    ///
    /// Check and insert happen back to back, so repeated adds of the same
    /// root never produce a second watcher.
    pub fn add_root(&mut self, path: &Path) -> Result<bool, WatchError> {
        let key = root_key(path)?;
        if self.registry.has(&key) {
            tracing::debug!(root = %key, "Root already observed");
            return Ok(false);
        }

        let watcher =
            DescriptorWatcher::new(Path::new(&key), &self.descriptor, self.events_tx.clone())?;
        match self.registry.try_set(key, watcher) {
            Ok(()) => Ok(true),
            Err(mut refused) => {
                refused.dispose();
                Ok(false)
            }
        }
    }

    /// Stop observing `path`. `false` if it was not observed.
    pub fn remove_root(&mut self, path: &Path) -> bool {
        // A root deleted from disk can no longer be canonicalized; its key
        // may still match verbatim.
        let key = root_key(path).unwrap_or_else(|_| path.to_string_lossy().into_owned());
        let removed = self.registry.dispose_and_delete(&key);
        if removed {
            tracing::info!(root = %key, "Stopped observing root");
        }
        removed
    }

    /// Apply a runtime root change. Returns whether anything changed.
    pub fn apply(&mut self, change: &RootChange) -> Result<bool, WatchError> {
        match change {
            RootChange::Added(path) => self.add_root(path),
            RootChange::Removed(path) => Ok(self.remove_root(path)),
        }
    }

    #[must_use]
    pub fn is_observed(&self, path: &Path) -> bool {
        root_key(path).is_ok_and(|key| self.registry.has(&key))
    }

    /// Observed roots, sorted.
    #[must_use]
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.registry.keys().map(PathBuf::from).collect();
        roots.sort();
        roots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

impl Disposable for WorkspaceRoots {
    fn dispose(&mut self) {
        self.registry.dispose();
    }
}
