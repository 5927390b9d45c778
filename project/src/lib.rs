//! The `hdl-prj.json` project descriptor and the editing helpers built on
//! it: scaffolding a new descriptor and rendering entity instantiations.

use std::io;
use std::path::{Path, PathBuf};

mod atomic_write;
mod descriptor;
mod instantiate;
mod scaffold;

pub use atomic_write::atomic_write;
pub use descriptor::{AnalysisOptions, DESCRIPTOR_FILE, Language, ProjectDescriptor, ProjectFile};
pub use instantiate::{InstantiationStyle, instantiation};
pub use scaffold::{ScaffoldOutcome, create_project, discover_sources};

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("{} already exists (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),
    #[error("no VHDL or Verilog sources found under {}", .0.display())]
    NoSources(PathBuf),
}

impl ProjectError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. }
            | Self::Parse { path, .. }
            | Self::Write { path, .. } => path,
            Self::AlreadyExists(path) | Self::NoSources(path) => path,
        }
    }
}
