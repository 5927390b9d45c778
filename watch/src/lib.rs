//! Project descriptor watching.
//!
//! Each observed root gets a [`DescriptorWatcher`], kept in a
//! [`WatchRegistry`] by [`WorkspaceRoots`]. Watchers only emit
//! [`WatchEvent`]s; [`forward_events`] turns them into calls of whatever
//! restart callback the caller supplies.

use std::path::PathBuf;

mod forward;
mod registry;
mod roots;
mod watcher;

pub use forward::forward_events;
pub use registry::WatchRegistry;
pub use roots::{RootChange, WorkspaceRoots, root_key};
pub use watcher::{DescriptorWatcher, WatchEvent, WatchEventKind};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("cannot resolve {}", path.display())]
    Canonicalize {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot watch {}", path.display())]
    Watch {
        path: PathBuf,
        source: notify::Error,
    },
}
