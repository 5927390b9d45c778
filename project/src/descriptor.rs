use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProjectError;
use crate::atomic_write::atomic_write;

/// File name of the project descriptor at the top of each root.
pub const DESCRIPTOR_FILE: &str = "hdl-prj.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Vhdl,
    Verilog,
}

impl Language {
    /// Language of a source file, judged by extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "vhd" | "vhdl" => Some(Self::Vhdl),
            "v" | "sv" => Some(Self::Verilog),
            _ => None,
        }
    }
}

/// Analyser options. Keys this client does not know about survive a
/// load/save cycle untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(default)]
    pub ghdl_analysis: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub file: String,
    pub language: Language,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    #[serde(default)]
    pub options: AnalysisOptions,
    #[serde(default)]
    pub files: Vec<ProjectFile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectDescriptor {
    /// Where the descriptor of `root` lives.
    #[must_use]
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(DESCRIPTOR_FILE)
    }

    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProjectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ProjectError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the descriptor of `root`, `Ok(None)` if the root has none.
    pub fn load_from_root(root: &Path) -> Result<Option<Self>, ProjectError> {
        let path = Self::path_in(root);
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let json = self.to_json().map_err(|source| ProjectError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        atomic_write(path, json.as_bytes()).map_err(|source| ProjectError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Add `file` unless it is already listed. Returns whether it was added.
    pub fn add_file(&mut self, file: impl Into<String>, language: Language) -> bool {
        let file = file.into();
        if self.files.iter().any(|f| f.file == file) {
            return false;
        }
        self.files.push(ProjectFile { file, language });
        true
    }
}
