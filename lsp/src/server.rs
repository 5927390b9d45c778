//! A running language server process and the JSON-RPC plumbing around it.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::{CodecError, FrameReader, FrameWriter};
use crate::error::ClientError;
use crate::protocol::{self, LogMessageParams, Notification, Request};
use crate::types::{ServerEvent, ServerOptions, ServerStopReason};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

const WRITER_CHANNEL_CAPACITY: usize = 64;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>>;

pub(crate) enum WriterCommand {
    Send(serde_json::Value),
    Shutdown,
}

enum IncomingFrame {
    Response {
        id: u64,
        body: serde_json::Value,
    },
    ServerRequest {
        id: serde_json::Value,
        method: String,
    },
    Notification {
        method: String,
        params: Option<serde_json::Value>,
    },
}

fn parse_incoming(frame: &serde_json::Value) -> Option<IncomingFrame> {
    let id = frame.get("id");
    let method = frame
        .get("method")
        .and_then(|m| m.as_str())
        .map(String::from);
    let has_result_or_error = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method, has_result_or_error) {
        (Some(id_val), None, true) => Some(IncomingFrame::Response {
            id: id_val.as_u64()?,
            body: frame.clone(),
        }),
        (Some(id_val), Some(method), _) => Some(IncomingFrame::ServerRequest {
            id: id_val.clone(),
            method,
        }),
        (None, Some(method), _) => Some(IncomingFrame::Notification {
            method,
            params: frame.get("params").cloned(),
        }),
        _ => None,
    }
}

/// Split a response body into its `result`, or the server's error.
fn response_result(method: &str, body: serde_json::Value) -> Result<serde_json::Value, ClientError> {
    if let Some(error) = body.get("error") {
        return Err(ClientError::Server {
            method: method.to_string(),
            code: error["code"].as_i64().unwrap_or_default(),
            message: error["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    Ok(body.get("result").cloned().unwrap_or(serde_json::Value::Null))
}

/// A spawned, initialized language server.
///
/// Holding one is proof the `initialize` handshake succeeded. Dropping it
/// aborts the I/O tasks and kills the child.
pub(crate) struct ServerProcess {
    command: String,
    child: Mutex<Child>,
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: AtomicU64,
    pending: PendingMap,
    /// Set by the reader once the server's stdout is gone.
    closed: Arc<AtomicBool>,
    request_timeout: Duration,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl ServerProcess {
    pub async fn start(
        options: &ServerOptions,
        event_tx: mpsc::Sender<ServerEvent>,
    ) -> Result<Self, ClientError> {
        let command = options.command().to_string();
        let resolved_cmd =
            which::which(&command).map_err(|source| ClientError::CommandNotFound {
                command: command.clone(),
                source,
            })?;

        let mut cmd = Command::new(&resolved_cmd);
        cmd.args(options.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(root) = options.roots().first() {
            cmd.current_dir(root);
        }

        let spawn_error = |source| ClientError::Spawn {
            command: command.clone(),
            source,
        };
        let mut child = cmd.spawn().map_err(spawn_error)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(std::io::Error::other("no stdout from child")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_error(std::io::Error::other("no stdin from child")))?;

        tracing::debug!(
            command = %resolved_cmd.display(),
            args = ?options.args(),
            "Spawned language server"
        );

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        let writer_handle = tokio::spawn(async move {
            let mut writer = FrameWriter::new(stdin);
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_frame(&frame).await {
                            if matches!(e, CodecError::Closed) {
                                tracing::debug!("Language server closed its input; dropping frame");
                            } else {
                                tracing::warn!("Language server write error: {e}");
                            }
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_closed = closed.clone();
        let reader_writer_tx = writer_tx.clone();
        let reader_command = command.clone();
        let reader_handle = tokio::spawn(async move {
            let mut reader = FrameReader::new(stdout);
            let reason = loop {
                match reader.read_frame().await {
                    Ok(Some(frame)) => {
                        Self::dispatch_frame(
                            &frame,
                            &reader_pending,
                            &event_tx,
                            &reader_writer_tx,
                            &reader_command,
                        )
                        .await;
                    }
                    Ok(None) => {
                        tracing::info!("Language server '{reader_command}' closed stdout");
                        break ServerStopReason::Exited;
                    }
                    Err(e) => {
                        tracing::warn!("Read error from '{reader_command}': {e}");
                        break ServerStopReason::Failed(e.to_string());
                    }
                }
            };
            // Flag first, then clear: a request that registers after the
            // clear sees the flag, one that registered before loses its sender.
            reader_closed.store(true, Ordering::SeqCst);
            reader_pending.lock().await.clear();
            let _ = event_tx.try_send(ServerEvent::Stopped { reason });
        });

        let server = Self {
            command,
            child: Mutex::new(child),
            writer_tx,
            next_id: AtomicU64::new(1),
            pending,
            closed,
            request_timeout: options.request_timeout(),
            reader_handle,
            writer_handle,
        };

        server.initialize(options).await?;

        Ok(server)
    }

    async fn dispatch_frame(
        frame: &serde_json::Value,
        pending: &Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>,
        event_tx: &mpsc::Sender<ServerEvent>,
        writer_tx: &mpsc::Sender<WriterCommand>,
        server_name: &str,
    ) {
        let Some(incoming) = parse_incoming(frame) else {
            tracing::trace!("Ignoring malformed JSON-RPC frame from '{server_name}'");
            return;
        };

        match incoming {
            IncomingFrame::Response { id, body } => {
                let sender = pending.lock().await.remove(&id);
                if let Some(tx) = sender {
                    let _ = tx.send(body);
                }
            }
            IncomingFrame::ServerRequest { id, method } => {
                // The server blocks on some requests until it hears back.
                tracing::debug!("'{server_name}' sent request {method}; replying method not found");
                let response = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": -32601,
                        "message": format!("Method not found: {method}")
                    }
                });
                let _ = writer_tx.send(WriterCommand::Send(response)).await;
            }
            IncomingFrame::Notification { method, params } => {
                Self::handle_notification(server_name, &method, params, event_tx);
            }
        }
    }

    fn handle_notification(
        server_name: &str,
        method: &str,
        params: Option<serde_json::Value>,
        event_tx: &mpsc::Sender<ServerEvent>,
    ) {
        let show = match method {
            "window/showMessage" => true,
            "window/logMessage" => false,
            _ => {
                tracing::trace!("Ignoring notification from '{server_name}': {method}");
                return;
            }
        };
        let Some(params) = params else { return };
        match serde_json::from_value::<LogMessageParams>(params) {
            Ok(message) => {
                let event = ServerEvent::Message {
                    level: message.level(),
                    text: message.message,
                    show,
                };
                // Events are best effort; a slow consumer must not stall responses.
                if event_tx.try_send(event).is_err() {
                    tracing::trace!("Dropping message from '{server_name}': event channel full");
                }
            }
            Err(e) => {
                tracing::debug!("Failed to parse {method} from '{server_name}': {e}");
            }
        }
    }

    async fn initialize(&self, options: &ServerOptions) -> Result<(), ClientError> {
        let params = protocol::initialize_params(options.roots())?;
        self.request("initialize", Some(params)).await?;
        self.notify("initialized", Some(serde_json::json!({})))
            .await
    }

    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ClientError> {
        self.request_within(method, params, self.request_timeout)
            .await
    }

    async fn request_within(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        timeout: Duration,
    ) -> Result<serde_json::Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if self.closed.load(Ordering::SeqCst) {
            self.pending.lock().await.remove(&id);
            return Err(ClientError::TransportClosed);
        }

        let frame = serde_json::to_value(Request::new(id, method, params)).map_err(CodecError::from)?;
        if self
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            return Err(ClientError::TransportClosed);
        }

        let body = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(body)) => body,
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                return Err(ClientError::TransportClosed);
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(ClientError::Timeout {
                    method: method.to_string(),
                    timeout,
                });
            }
        };

        response_result(method, body)
    }

    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), ClientError> {
        let frame =
            serde_json::to_value(Notification::new(method, params)).map_err(CodecError::from)?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| ClientError::TransportClosed)
    }

    /// Graceful shutdown: `shutdown`, `exit`, then wait for (or kill) the child.
    ///
    /// The child is always reaped; the returned error only reports how the
    /// handshake went.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        let handshake = match self.request_within("shutdown", None, SHUTDOWN_TIMEOUT).await {
            Ok(_) => self.notify("exit", None).await,
            Err(e) => Err(e),
        };

        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;

        let mut child = self.child.lock().await;
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, child.wait())
            .await
            .is_err()
        {
            tracing::debug!("'{}' didn't exit in time, killing", self.command);
            let _ = child.kill().await;
        }

        handshake
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}
