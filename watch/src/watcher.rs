//! Watches one project root for changes to its descriptor file.
//!
//! The watcher observes the root directory (non-recursively) and filters
//! events down to the descriptor's file name. Matching events are sent as
//! [`WatchEvent`]s on a tokio channel; nothing here knows what a restart is.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use vhdl_types::Disposable;

use crate::WatchError;

/// Poll interval of the fallback watcher.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Changed,
    Deleted,
}

/// The descriptor file under `root` was created, changed, or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub root: PathBuf,
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

fn classify(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            Some(WatchEventKind::Created)
        }
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            Some(WatchEventKind::Deleted)
        }
        // Attribute-only changes (touch, chmod) leave the content alone.
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(WatchEventKind::Changed),
        _ => None,
    }
}

/// Build the event-handler closure shared by both watcher backends.
fn make_event_handler(
    root: PathBuf,
    filename: OsString,
    tx: mpsc::UnboundedSender<WatchEvent>,
) -> impl Fn(notify::Result<Event>) + Send + 'static {
    move |result: notify::Result<Event>| {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(root = %root.display(), "Watch error: {e}");
                return;
            }
        };
        let Some(kind) = classify(&event.kind) else {
            return;
        };
        for path in event
            .paths
            .into_iter()
            .filter(|p| p.file_name().is_some_and(|f| f == filename))
        {
            tracing::debug!(path = %path.display(), ?kind, "Project descriptor event");
            let watch_event = WatchEvent {
                root: root.clone(),
                path,
                kind,
            };
            if tx.send(watch_event).is_err() {
                tracing::trace!("Watch event receiver gone; dropping event");
                return;
            }
        }
    }
}

/// A live subscription to one root's descriptor file.
pub struct DescriptorWatcher {
    root: PathBuf,
    /// Dropping the backend stops the OS-level watch.
    watcher: Option<Box<dyn Watcher + Send>>,
}

impl std::fmt::Debug for DescriptorWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorWatcher")
            .field("root", &self.root)
            .field("active", &self.is_active())
            .finish()
    }
}

impl DescriptorWatcher {
    /// Start watching `root` for `descriptor` (a bare file name).
    ///
    /// Uses the platform's native backend, falling back to polling when it
    /// cannot be initialised (containers, network filesystems).
    pub fn new(
        root: &Path,
        descriptor: &str,
        tx: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::NotADirectory(root.to_path_buf()));
        }

        let mut watcher = Self::create_backend(root, descriptor, tx)?;
        watcher
            .watch(root, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Watch {
                path: root.to_path_buf(),
                source,
            })?;

        tracing::info!(root = %root.display(), descriptor, "Watching project descriptor");

        Ok(Self {
            root: root.to_path_buf(),
            watcher: Some(watcher),
        })
    }

    fn create_backend(
        root: &Path,
        descriptor: &str,
        tx: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Box<dyn Watcher + Send>, WatchError> {
        let handler = make_event_handler(root.to_path_buf(), descriptor.into(), tx.clone());
        match notify::recommended_watcher(handler) {
            Ok(w) => Ok(Box::new(w)),
            Err(e) => {
                tracing::warn!("Native watcher unavailable ({e}); falling back to polling");
                let handler = make_event_handler(root.to_path_buf(), descriptor.into(), tx);
                let poll = PollWatcher::new(
                    handler,
                    NotifyConfig::default().with_poll_interval(POLL_INTERVAL),
                )
                .map_err(|source| WatchError::Watch {
                    path: root.to_path_buf(),
                    source,
                })?;
                Ok(Box::new(poll))
            }
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }
}

impl Disposable for DescriptorWatcher {
    fn dispose(&mut self) {
        if self.watcher.take().is_some() {
            tracing::debug!(root = %self.root.display(), "Stopped watching project descriptor");
        }
    }
}

#[cfg(test)]
mod tests {
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

    use super::*;

    #[test]
    fn classify_content_events() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Some(WatchEventKind::Created)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(WatchEventKind::Changed)
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File)),
            Some(WatchEventKind::Deleted)
        );
    }

    #[test]
    fn classify_renames_as_create_and_delete() {
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(WatchEventKind::Created)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(WatchEventKind::Deleted)
        );
    }

    #[test]
    fn classify_ignores_access_and_metadata() {
        assert_eq!(classify(&EventKind::Access(AccessKind::Any)), None);
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))),
            None
        );
    }

    #[test]
    fn handler_filters_by_file_name() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let root = PathBuf::from("/work/cpu");
        let handler = make_event_handler(root.clone(), "hdl-prj.json".into(), tx);

        handler(Ok(Event::new(EventKind::Create(CreateKind::File))
            .add_path(root.join("top.vhd"))));
        handler(Ok(Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(root.join("hdl-prj.json"))));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.root, root);
        assert_eq!(event.path, root.join("hdl-prj.json"));
        assert_eq!(event.kind, WatchEventKind::Changed);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn handler_survives_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handler = make_event_handler(PathBuf::from("/work"), "hdl-prj.json".into(), tx);
        handler(Ok(Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/work/hdl-prj.json"))));
    }

    #[test]
    fn watcher_rejects_missing_root() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = DescriptorWatcher::new(
            Path::new("/nonexistent/vhdl-client-watch-test"),
            "hdl-prj.json",
            tx,
        );
        assert!(matches!(result, Err(WatchError::NotADirectory(_))));
    }

    #[test]
    fn dispose_deactivates_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut watcher = DescriptorWatcher::new(dir.path(), "hdl-prj.json", tx).unwrap();
        assert!(watcher.is_active());

        watcher.dispose();
        assert!(!watcher.is_active());
        watcher.dispose();
    }
}
