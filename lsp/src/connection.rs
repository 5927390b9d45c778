//! The connection manager, sole owner of the language-client connection.
//!
//! Restarts are driven entirely by the connection's own state predicates:
//! every step checks `needs_stop` / `needs_start` immediately before acting,
//! so any number of independent triggers can call [`ConnectionManager::restart`]
//! without further coordination and still end up with one live server.

use std::future::Future;
use std::sync::Arc;

use vhdl_types::{ClientState, Disposable};

use crate::error::ClientError;

/// A stoppable, restartable link to an external server.
///
/// `start` and `stop` take `&self`: implementations keep their state behind
/// interior mutability so a restart in progress stays observable to other
/// callers.
pub trait Connection: Send + Sync {
    fn state(&self) -> ClientState;

    fn needs_start(&self) -> bool {
        self.state().needs_start()
    }

    fn needs_stop(&self) -> bool {
        self.state().needs_stop()
    }

    fn start(&self) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn stop(&self) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// Owns the connection handle and sequences its lifecycle.
///
/// Cheap to clone; clones share the same connection. A manager without a
/// connection (see [`ConnectionManager::detached`]) turns every operation into
/// a no-op.
pub struct ConnectionManager<C> {
    client: Option<Arc<C>>,
}

impl<C> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<C> Default for ConnectionManager<C> {
    fn default() -> Self {
        Self::detached()
    }
}

impl<C> ConnectionManager<C> {
    #[must_use]
    pub fn detached() -> Self {
        Self { client: None }
    }

    #[must_use]
    pub fn client(&self) -> Option<&Arc<C>> {
        self.client.as_ref()
    }
}

impl<C: Connection> ConnectionManager<C> {
    #[must_use]
    pub fn new(client: C) -> Self {
        Self {
            client: Some(Arc::new(client)),
        }
    }

    #[must_use]
    pub fn state(&self) -> Option<ClientState> {
        self.client.as_deref().map(Connection::state)
    }

    /// Start the connection if it is startable.
    pub async fn start(&self) -> Result<(), ClientError> {
        match &self.client {
            Some(client) if client.needs_start() => client.start().await,
            _ => Ok(()),
        }
    }

    /// Stop the connection if it is running. Stop failures are logged, not returned.
    pub async fn stop(&self) {
        if let Some(client) = &self.client
            && client.needs_stop()
        {
            settle_stop(client.stop().await);
        }
    }

    /// Halt (if running) and start (if startable) the connection.
    ///
    /// A call that lands while another restart is halting the connection
    /// finds it `Stopping`, which needs neither action, and returns at once;
    /// the first caller issues the one start.
    pub async fn restart(&self) -> Result<(), ClientError> {
        let Some(client) = &self.client else {
            tracing::debug!("Restart requested before the client exists; ignoring");
            return Ok(());
        };

        if client.needs_stop() {
            tracing::info!("Stopping language server for restart");
            settle_stop(client.stop().await);
        }

        if client.needs_start() {
            tracing::info!("Starting language server");
            client.start().await?;
        } else {
            tracing::debug!(state = %client.state(), "Restart already in progress elsewhere");
        }

        Ok(())
    }
}

/// Decide which stop failures matter.
///
/// Write-after-close during teardown is expected; anything else is logged
/// and swallowed too, since the connection is down either way and the
/// following start is the real test.
fn settle_stop(result: Result<(), ClientError>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_teardown_race() => {
            tracing::debug!("Ignoring write after close during stop: {e}");
        }
        Err(e) => {
            tracing::warn!("Language server did not stop cleanly: {e}");
        }
    }
}

impl<C: Disposable> Disposable for ConnectionManager<C> {
    fn dispose(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        match Arc::try_unwrap(client) {
            Ok(mut client) => client.dispose(),
            Err(_) => {
                tracing::debug!("Connection still shared; released when the last handle drops");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// In-memory connection that yields mid-stop so restarts can interleave.
    #[derive(Default)]
    struct FakeConnection {
        state: Mutex<ClientState>,
        starts: AtomicUsize,
        stops: AtomicUsize,
        disposed: AtomicUsize,
        stop_error: Mutex<Option<ClientError>>,
        fail_start: bool,
    }

    impl FakeConnection {
        fn running() -> Self {
            let fake = Self::default();
            *fake.state.lock().unwrap() = ClientState::Running;
            fake
        }

        fn set_state(&self, state: ClientState) {
            *self.state.lock().unwrap() = state;
        }
    }

    impl Connection for FakeConnection {
        fn state(&self) -> ClientState {
            *self.state.lock().unwrap()
        }

        async fn start(&self) -> Result<(), ClientError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.set_state(ClientState::Starting);
            tokio::task::yield_now().await;
            if self.fail_start {
                self.set_state(ClientState::StartFailed);
                return Err(ClientError::NotRunning(ClientState::StartFailed));
            }
            self.set_state(ClientState::Running);
            Ok(())
        }

        async fn stop(&self) -> Result<(), ClientError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.set_state(ClientState::Stopping);
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            self.set_state(ClientState::Stopped);
            match self.stop_error.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    impl Disposable for FakeConnection {
        fn dispose(&mut self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn restart_without_connection_is_noop() {
        let manager: ConnectionManager<FakeConnection> = ConnectionManager::detached();
        manager.restart().await.unwrap();
        assert!(manager.state().is_none());
    }

    #[tokio::test]
    async fn restart_starts_initial_connection() {
        let manager = ConnectionManager::new(FakeConnection::default());
        manager.restart().await.unwrap();

        let client = manager.client().unwrap();
        assert_eq!(client.stops.load(Ordering::SeqCst), 0);
        assert_eq!(client.starts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), Some(ClientState::Running));
    }

    #[tokio::test]
    async fn restart_stops_then_starts_running_connection() {
        let manager = ConnectionManager::new(FakeConnection::running());
        manager.restart().await.unwrap();

        let client = manager.client().unwrap();
        assert_eq!(client.stops.load(Ordering::SeqCst), 1);
        assert_eq!(client.starts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), Some(ClientState::Running));
    }

    #[tokio::test]
    async fn concurrent_restarts_halt_once_and_start_once() {
        let manager = ConnectionManager::new(FakeConnection::running());
        let other = manager.clone();

        let (first, second) = tokio::join!(manager.restart(), other.restart());
        first.unwrap();
        second.unwrap();

        let client = manager.client().unwrap();
        assert_eq!(client.stops.load(Ordering::SeqCst), 1);
        assert_eq!(client.starts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), Some(ClientState::Running));
    }

    #[tokio::test]
    async fn repeated_restarts_keep_one_live_connection() {
        let manager = ConnectionManager::new(FakeConnection::running());
        for _ in 0..3 {
            manager.restart().await.unwrap();
        }

        let client = manager.client().unwrap();
        assert_eq!(client.stops.load(Ordering::SeqCst), 3);
        assert_eq!(client.starts.load(Ordering::SeqCst), 3);
        assert_eq!(manager.state(), Some(ClientState::Running));
    }

    #[tokio::test]
    async fn teardown_race_during_stop_is_suppressed() {
        let fake = FakeConnection::running();
        *fake.stop_error.lock().unwrap() = Some(ClientError::TransportClosed);
        let manager = ConnectionManager::new(fake);

        manager.restart().await.unwrap();
        assert_eq!(manager.state(), Some(ClientState::Running));
    }

    #[tokio::test]
    async fn unclean_stop_still_restarts() {
        let fake = FakeConnection::running();
        *fake.stop_error.lock().unwrap() = Some(ClientError::Timeout {
            method: "shutdown".into(),
            timeout: std::time::Duration::from_secs(2),
        });
        let manager = ConnectionManager::new(fake);

        manager.restart().await.unwrap();
        assert_eq!(manager.client().unwrap().starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_failure_is_reported() {
        let manager = ConnectionManager::new(FakeConnection {
            fail_start: true,
            ..FakeConnection::default()
        });

        assert!(manager.restart().await.is_err());
        assert_eq!(manager.state(), Some(ClientState::StartFailed));

        // A later trigger tries again.
        assert!(manager.restart().await.is_err());
        assert_eq!(manager.client().unwrap().starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let manager = ConnectionManager::new(FakeConnection::default());
        manager.start().await.unwrap();
        manager.start().await.unwrap();
        manager.stop().await;
        manager.stop().await;

        let client = manager.client().unwrap();
        assert_eq!(client.starts.load(Ordering::SeqCst), 1);
        assert_eq!(client.stops.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), Some(ClientState::Stopped));
    }

    #[test]
    fn dispose_releases_unshared_connection() {
        let mut manager = ConnectionManager::new(FakeConnection::default());
        let witness = manager.clone();
        drop(witness);

        manager.dispose();
        assert!(manager.client().is_none());
        // Second dispose has nothing left.
        manager.dispose();
    }
}
