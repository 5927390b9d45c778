//! `config.toml` for vhdl-client.
//!
//! ```toml
//! [server]
//! command = "ghdl-ls"
//! args = []
//! debug = false
//! trace_file = "ghdl-ls.trace"
//!
//! [watch]
//! descriptor = "hdl-prj.json"
//! debounce_ms = 300
//!
//! [log]
//! file = "/tmp/vhdl-client.log"
//! ```
//!
//! Every section and key is optional.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use vhdl_lsp::{LaunchMode, ServerOptions};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "VHDL_CLIENT_CONFIG";

const DEFAULT_COMMAND: &str = "ghdl-ls";
const DEFAULT_TRACE_FILE: &str = "ghdl-ls.trace";
const DEFAULT_DESCRIPTOR: &str = "hdl-prj.json";
const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Rejections raised while deserializing; surface inside [`ConfigError::Parse`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("server.command must not be empty")]
    EmptyCommand,
    #[error("server.request_timeout_secs must be greater than zero")]
    ZeroTimeout,
    #[error("watch.descriptor must be a bare file name, got {0:?}")]
    DescriptorNotAFileName(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
struct RawServerConfig {
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    debug: bool,
    debug_args: Option<Vec<String>>,
    trace_file: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawServerConfig")]
pub struct ServerConfig {
    pub command: String,
    /// Arguments in run mode.
    pub args: Vec<String>,
    /// Launch in debug mode even without `--debug`.
    pub debug: bool,
    /// Arguments in debug mode. Derived from `trace_file` when unset.
    pub debug_args: Option<Vec<String>>,
    pub trace_file: PathBuf,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            args: Vec::new(),
            debug: false,
            debug_args: None,
            trace_file: PathBuf::from(DEFAULT_TRACE_FILE),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl TryFrom<RawServerConfig> for ServerConfig {
    type Error = InvalidConfig;

    fn try_from(raw: RawServerConfig) -> Result<Self, Self::Error> {
        let command = match raw.command {
            Some(command) if command.trim().is_empty() => return Err(InvalidConfig::EmptyCommand),
            Some(command) => command,
            None => DEFAULT_COMMAND.to_string(),
        };
        let timeout_secs = raw
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(InvalidConfig::ZeroTimeout);
        }
        Ok(Self {
            command,
            args: raw.args,
            debug: raw.debug,
            debug_args: raw.debug_args,
            trace_file: raw
                .trace_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACE_FILE)),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl ServerConfig {
    /// Debug-mode arguments: the configured list, or verbose logging plus
    /// a protocol trace into `trace_file`.
    #[must_use]
    pub fn effective_debug_args(&self) -> Vec<String> {
        self.debug_args.clone().unwrap_or_else(|| {
            vec![
                "-vvv".to_string(),
                format!("--trace-file={}", self.trace_file.display()),
            ]
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawWatchConfig {
    descriptor: Option<String>,
    debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawWatchConfig")]
pub struct WatchConfig {
    /// File name watched in every root.
    pub descriptor: String,
    pub debounce: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            descriptor: DEFAULT_DESCRIPTOR.to_string(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

impl TryFrom<RawWatchConfig> for WatchConfig {
    type Error = InvalidConfig;

    fn try_from(raw: RawWatchConfig) -> Result<Self, Self::Error> {
        let descriptor = raw
            .descriptor
            .unwrap_or_else(|| DEFAULT_DESCRIPTOR.to_string());
        let is_bare = !descriptor.is_empty()
            && Path::new(&descriptor).file_name() == Some(OsStr::new(&descriptor));
        if !is_bare {
            return Err(InvalidConfig::DescriptorNotAFileName(descriptor));
        }
        Ok(Self {
            descriptor,
            debounce: Duration::from_millis(raw.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    /// Write logs here instead of stderr.
    pub file: Option<PathBuf>,
}

impl ClientConfig {
    /// Load from `override_path`, `$VHDL_CLIENT_CONFIG`, or the default
    /// location, in that order.
    ///
    /// A missing file at the default location yields the defaults; a
    /// missing file that was asked for explicitly is an error.
    pub fn load(override_path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV);
        let Some((path, explicit)) = resolve_path(override_path, env_path) else {
            tracing::debug!("No config directory; using defaults");
            return Ok(Self::default());
        };
        if !explicit && !path.exists() {
            tracing::debug!(path = %path.display(), "No config file; using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(source) => {
                tracing::warn!("Failed to read config at {}: {source}", path.display());
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded config");
                Ok(config)
            }
            Err(source) => {
                tracing::warn!("Failed to parse config at {}: {source}", path.display());
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Launch options for a server over `roots`. `force_debug` comes from
    /// the command line and wins over `server.debug`.
    #[must_use]
    pub fn server_options(&self, roots: Vec<PathBuf>, force_debug: bool) -> ServerOptions {
        let mode = if force_debug || self.server.debug {
            LaunchMode::Debug
        } else {
            LaunchMode::Run
        };
        ServerOptions::new(self.server.command.clone())
            .with_run_args(self.server.args.clone())
            .with_debug_args(self.server.effective_debug_args())
            .with_mode(mode)
            .with_roots(roots)
            .with_request_timeout(self.server.request_timeout)
    }
}

/// `~/.config/vhdl-client/config.toml` (platform equivalent elsewhere).
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vhdl-client").join("config.toml"))
}

/// Pick the config file and whether it was named explicitly.
fn resolve_path(
    override_path: Option<&Path>,
    env_path: Option<OsString>,
) -> Option<(PathBuf, bool)> {
    if let Some(path) = override_path {
        return Some((path.to_path_buf(), true));
    }
    if let Some(path) = env_path.filter(|p| !p.is_empty()) {
        return Some((PathBuf::from(path), true));
    }
    default_config_path().map(|path| (path, false))
}
