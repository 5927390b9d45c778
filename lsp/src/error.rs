use std::time::Duration;

use vhdl_types::ClientState;

use crate::codec::CodecError;
use crate::protocol::PathToUriError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{command} not found in PATH")]
    CommandNotFound {
        command: String,
        source: which::Error,
    },
    #[error("failed to spawn {command}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("language server is not running ({0})")]
    NotRunning(ClientState),
    #[error("connection to the language server is closed")]
    TransportClosed,
    #[error("{method} timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },
    #[error("{method} failed: {message} (code {code})")]
    Server {
        method: String,
        code: i64,
        message: String,
    },
    #[error("unexpected response to {method}")]
    Decode {
        method: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Uri(#[from] PathToUriError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ClientError {
    /// A write that hit an already-closed transport while the server was
    /// going away. Expected during stop and not worth surfacing.
    #[must_use]
    pub fn is_teardown_race(&self) -> bool {
        matches!(self, Self::TransportClosed | Self::Codec(CodecError::Closed))
    }
}
