//! Line commands read from stdin while `watch` runs.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Start observing another root.
    Add(PathBuf),
    /// Stop observing a root.
    Remove(PathBuf),
    Restart,
    Status,
    Quit,
}

pub const HELP: &str = "commands: add DIR | remove DIR | restart | status | quit";

impl ControlCommand {
    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match (word, rest) {
            ("add", "") | ("remove", "") => return Err(format!("{word} needs a directory")),
            ("add", dir) => Self::Add(PathBuf::from(dir)),
            ("remove", dir) => Self::Remove(PathBuf::from(dir)),
            ("restart", "") => Self::Restart,
            ("status", "") => Self::Status,
            ("quit" | "exit", "") => Self::Quit,
            _ => return Err(format!("unknown command {line:?}; {HELP}")),
        };
        Ok(Some(command))
    }
}
