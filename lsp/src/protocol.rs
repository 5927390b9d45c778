//! JSON-RPC message shapes and the server's custom request contract.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use vhdl_types::{Entity, EntityInterface, SourceFile};

use crate::types::MessageLevel;

/// Name advertised to the server in `clientInfo`.
const CLIENT_NAME: &str = "vhdl-client";

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl<'a> Notification<'a> {
    pub fn new(method: &'a str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// A request the VHDL server understands beyond the base protocol.
pub trait CustomRequest {
    const METHOD: &'static str;
    type Params: Serialize;
    type Result: DeserializeOwned;
}

/// Every source file the server has loaded.
#[derive(Debug)]
pub enum ShowAllFiles {}

impl CustomRequest for ShowAllFiles {
    const METHOD: &'static str = "ghdl/showAllFiles";
    type Params = ();
    type Result = Option<Vec<SourceFile>>;
}

/// Every design entity the server knows about.
#[derive(Debug)]
pub enum GetAllEntities {}

impl CustomRequest for GetAllEntities {
    const METHOD: &'static str = "ghdl/getAllEntities";
    type Params = ();
    type Result = Option<Vec<Entity>>;
}

/// Generics and ports of one entity. `null` when the entity is unknown.
#[derive(Debug)]
pub enum GetEntityInterface {}

impl CustomRequest for GetEntityInterface {
    const METHOD: &'static str = "ghdl/getEntityInterface";
    type Params = Entity;
    type Result = Option<EntityInterface>;
}

/// Serialize request params, mapping `()` / `null` to "no params".
pub(crate) fn encode_params<P: Serialize>(
    params: &P,
) -> Result<Option<serde_json::Value>, serde_json::Error> {
    let value = serde_json::to_value(params)?;
    Ok((!value.is_null()).then_some(value))
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn initialize_params(roots: &[PathBuf]) -> Result<serde_json::Value, PathToUriError> {
    let folders = roots
        .iter()
        .map(|root| {
            Ok(serde_json::json!({
                "uri": path_to_file_uri(root)?.as_str(),
                "name": folder_name(root),
            }))
        })
        .collect::<Result<Vec<_>, PathToUriError>>()?;
    let root_uri = folders.first().map(|folder| folder["uri"].clone());

    Ok(serde_json::json!({
        "processId": std::process::id(),
        "clientInfo": {
            "name": CLIENT_NAME,
            "version": env!("CARGO_PKG_VERSION")
        },
        "rootUri": root_uri,
        "capabilities": {
            "textDocument": {
                "synchronization": {
                    "dynamicRegistration": false,
                    "didSave": false
                }
            },
            "window": {
                "showMessage": {}
            }
        },
        "workspaceFolders": folders
    }))
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct LogMessageParams {
    #[serde(rename = "type")]
    pub kind: u64,
    pub message: String,
}

impl LogMessageParams {
    pub fn level(&self) -> MessageLevel {
        MessageLevel::from_lsp(self.kind).unwrap_or(MessageLevel::Log)
    }
}

pub fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}

/// Resolve a `file://` URI back to a path. `None` for other schemes.
#[must_use]
pub fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
}
