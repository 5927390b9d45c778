//! Creating a fresh `hdl-prj.json` for a root.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::ProjectError;
use crate::descriptor::{Language, ProjectDescriptor};

/// Directories never worth scanning for HDL sources.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target", "build", "work"];

#[derive(Debug)]
pub struct ScaffoldOutcome {
    pub path: PathBuf,
    pub descriptor: ProjectDescriptor,
    /// Explicitly requested files that are neither VHDL nor Verilog.
    pub skipped: Vec<PathBuf>,
}

/// Every VHDL or Verilog source under `root`, relative to it, sorted.
/// Honours `.gitignore` and friends.
#[must_use]
pub fn discover_sources(root: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !SKIPPED_DIRS.iter().any(|dir| name == *dir)
        })
        .build();

    let mut sources = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(root = %root.display(), "Skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        if Language::from_path(path).is_none() {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        sources.push(relative.to_path_buf());
    }
    sources.sort();
    sources
}

/// Descriptor entry spelling of `path`: relative to `root` when inside it,
/// always with forward slashes.
fn descriptor_entry(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.to_string_lossy().replace('\\', "/")
}

/// Write a new descriptor into `root`.
///
/// With `files` empty, the root is scanned with [`discover_sources`]. An
/// existing descriptor is only replaced when `force` is set.
pub fn create_project(
    root: &Path,
    files: &[PathBuf],
    force: bool,
) -> Result<ScaffoldOutcome, ProjectError> {
    let path = ProjectDescriptor::path_in(root);
    if path.exists() && !force {
        return Err(ProjectError::AlreadyExists(path));
    }

    let candidates = if files.is_empty() {
        discover_sources(root)
    } else {
        files.to_vec()
    };

    let mut descriptor = ProjectDescriptor::default();
    let mut skipped = Vec::new();
    for file in candidates {
        match Language::from_path(&file) {
            Some(language) => {
                descriptor.add_file(descriptor_entry(root, &file), language);
            }
            None => {
                tracing::warn!(file = %file.display(), "Not a VHDL or Verilog source; skipping");
                skipped.push(file);
            }
        }
    }
    if descriptor.files.is_empty() {
        return Err(ProjectError::NoSources(root.to_path_buf()));
    }

    descriptor.save(&path)?;
    tracing::info!(
        path = %path.display(),
        files = descriptor.files.len(),
        "Created project descriptor"
    );
    Ok(ScaffoldOutcome {
        path,
        descriptor,
        skipped,
    })
}
