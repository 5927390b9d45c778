//! Public types consumed by the CLI.
//!
//! The CLI builds [`ServerOptions`] from its configuration and receives
//! [`ServerEvent`]s from the running server.

use std::path::PathBuf;
use std::time::Duration;

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How the server process is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchMode {
    /// Minimal flags.
    #[default]
    Run,
    /// Verbose flags plus a trace file.
    Debug,
}

/// Everything needed to spawn and initialize the language server.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    command: String,
    run_args: Vec<String>,
    debug_args: Vec<String>,
    mode: LaunchMode,
    roots: Vec<PathBuf>,
    request_timeout: Duration,
}

impl ServerOptions {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            run_args: Vec::new(),
            debug_args: Vec::new(),
            mode: LaunchMode::Run,
            roots: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_run_args(mut self, args: Vec<String>) -> Self {
        self.run_args = args;
        self
    }

    pub fn with_debug_args(mut self, args: Vec<String>) -> Self {
        self.debug_args = args;
        self
    }

    pub fn with_mode(mut self, mode: LaunchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Workspace roots, sent as workspace folders. The first one is the
    /// server's working directory and `rootUri`.
    pub fn with_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.roots = roots;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn mode(&self) -> LaunchMode {
        self.mode
    }

    /// Arguments for the current launch mode.
    #[must_use]
    pub fn args(&self) -> &[String] {
        match self.mode {
            LaunchMode::Run => &self.run_args,
            LaunchMode::Debug => &self.debug_args,
        }
    }

    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Severity of a `window/logMessage` or `window/showMessage` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageLevel {
    Error = 1,
    Warning = 2,
    Info = 3,
    Log = 4,
}

impl MessageLevel {
    /// Convert from the LSP `MessageType` number. `None` outside 1..=4.
    #[must_use]
    pub fn from_lsp(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Error),
            2 => Some(Self::Warning),
            3 => Some(Self::Info),
            4 => Some(Self::Log),
            _ => None,
        }
    }
}

/// Why the server's output stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStopReason {
    /// Server closed stdout.
    Exited,
    /// Reading from the server failed.
    Failed(String),
}

/// An event emitted by a running server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// The server logged or showed a message.
    Message {
        level: MessageLevel,
        text: String,
        /// `true` for `window/showMessage`, meant for the user.
        show: bool,
    },
    /// The server's output stream ended.
    Stopped { reason: ServerStopReason },
}
