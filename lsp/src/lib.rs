//! Language-client connection to an external VHDL language server.
//!
//! [`LanguageClient`] owns the server process and speaks JSON-RPC to it;
//! [`ConnectionManager`] sequences its start/stop/restart lifecycle.

pub mod codec;
pub mod protocol;
pub mod types;

mod client;
mod connection;
mod error;
pub(crate) mod server;

pub use client::LanguageClient;
pub use connection::{Connection, ConnectionManager};
pub use error::ClientError;
pub use protocol::{CustomRequest, GetAllEntities, GetEntityInterface, ShowAllFiles};
pub use types::{LaunchMode, MessageLevel, ServerEvent, ServerOptions, ServerStopReason};
