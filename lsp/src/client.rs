//! The connection handle: one language server, started and stopped on demand.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use vhdl_types::{ClientState, Disposable, Entity, EntityInterface, SourceFile};

use crate::codec::CodecError;
use crate::connection::Connection;
use crate::error::ClientError;
use crate::protocol::{self, CustomRequest, GetAllEntities, GetEntityInterface, ShowAllFiles};
use crate::server::ServerProcess;
use crate::types::{ServerEvent, ServerOptions};

/// Channel capacity for events flowing from the server tasks to the CLI.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Client side of the connection to the VHDL language server.
///
/// State lives in a `watch` channel: transitions are atomic check-and-set
/// operations, and observers can follow them with [`LanguageClient::subscribe`].
/// The server slot is only populated while a process is up.
pub struct LanguageClient {
    options: ServerOptions,
    state: watch::Sender<ClientState>,
    server: Mutex<Option<Arc<ServerProcess>>>,
    event_tx: mpsc::Sender<ServerEvent>,
}

impl LanguageClient {
    /// Create a stopped client and the receiver for its server events.
    ///
    /// Events survive restarts: every server process the client spawns
    /// reports on the same channel.
    #[must_use]
    pub fn new(options: ServerOptions) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let client = Self {
            options,
            state: watch::Sender::new(ClientState::Initial),
            server: Mutex::new(None),
            event_tx,
        };
        (client, event_rx)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Move to `to` if the current state satisfies `from`. Returns whether it moved.
    fn transition(&self, from: impl Fn(ClientState) -> bool, to: ClientState) -> bool {
        self.state.send_if_modified(|state| {
            if from(*state) {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    async fn running_server(&self) -> Result<Arc<ServerProcess>, ClientError> {
        let slot = self.server.lock().await;
        match (slot.as_ref(), self.state()) {
            (Some(server), ClientState::Running) => Ok(Arc::clone(server)),
            (_, state) => Err(ClientError::NotRunning(state)),
        }
    }

    /// Send one of the server's custom requests and decode its result.
    pub async fn send_request<R: CustomRequest>(
        &self,
        params: &R::Params,
    ) -> Result<R::Result, ClientError> {
        let server = self.running_server().await?;
        let params = protocol::encode_params(params).map_err(CodecError::from)?;
        let value = server.request(R::METHOD, params).await?;
        serde_json::from_value(value).map_err(|source| ClientError::Decode {
            method: R::METHOD.to_string(),
            source,
        })
    }

    /// Every source file the server has loaded.
    pub async fn list_files(&self) -> Result<Vec<SourceFile>, ClientError> {
        Ok(self
            .send_request::<ShowAllFiles>(&())
            .await?
            .unwrap_or_default())
    }

    /// Every design entity the server knows about.
    pub async fn list_entities(&self) -> Result<Vec<Entity>, ClientError> {
        Ok(self
            .send_request::<GetAllEntities>(&())
            .await?
            .unwrap_or_default())
    }

    /// Generics and ports of `entity`, or `None` if the server does not know it.
    pub async fn entity_interface(
        &self,
        entity: &Entity,
    ) -> Result<Option<EntityInterface>, ClientError> {
        self.send_request::<GetEntityInterface>(entity).await
    }
}

impl Connection for LanguageClient {
    fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    async fn start(&self) -> Result<(), ClientError> {
        if !self.transition(ClientState::needs_start, ClientState::Starting) {
            tracing::debug!(state = %self.state(), "Start skipped");
            return Ok(());
        }

        // Held across the spawn so a concurrent stop waits for the process
        // to exist before taking it.
        let mut slot = self.server.lock().await;
        match ServerProcess::start(&self.options, self.event_tx.clone()).await {
            Ok(server) => {
                *slot = Some(Arc::new(server));
                drop(slot);
                if self.transition(|s| s == ClientState::Starting, ClientState::Running) {
                    tracing::info!(
                        command = self.options.command(),
                        mode = ?self.options.mode(),
                        "Language server running"
                    );
                } else {
                    tracing::debug!("Stop requested while starting; leaving the process to it");
                }
                Ok(())
            }
            Err(e) => {
                drop(slot);
                // A stop that claimed the state meanwhile finishes the transition.
                self.transition(|s| s == ClientState::Starting, ClientState::StartFailed);
                tracing::warn!("Failed to start language server: {e}");
                Err(e)
            }
        }
    }

    async fn stop(&self) -> Result<(), ClientError> {
        if !self.transition(ClientState::needs_stop, ClientState::Stopping) {
            tracing::debug!(state = %self.state(), "Stop skipped");
            return Ok(());
        }

        let server = self.server.lock().await.take();
        let result = match server {
            Some(server) => server.shutdown().await,
            None => Ok(()),
        };
        self.transition(|s| s == ClientState::Stopping, ClientState::Stopped);
        tracing::info!("Language server stopped");
        result
    }
}

impl Disposable for LanguageClient {
    /// Drop the process without the shutdown handshake; `kill_on_drop`
    /// reaps it once no request still holds it.
    fn dispose(&mut self) {
        if self.server.get_mut().take().is_some() {
            tracing::debug!("Released language server process");
        }
        self.state.send_replace(ClientState::Stopped);
    }
}
