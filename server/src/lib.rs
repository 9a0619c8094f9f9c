//! Lobby server for hangman: the authoritative game registry, the event
//! fan-out to connected clients, and the TCP accept loop feeding both.

pub mod broadcast;
pub mod builder;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod session;

use crate::session::SessionContext;
use hangman_lobby_protocol::DEFAULT_LOBBY_PORT;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

pub use broadcast::{EventBroadcaster, ObserverHandle, ObserverId, PublishReport};
pub use builder::ServerBuilder;
pub use dispatcher::{ConnectionDispatcher, DispatcherState};
pub use error::ServerError;
pub use registry::GameRegistry;

/// Configuration for the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to accept lobby connections on.
    pub bind_addr: String,
    /// Maximum concurrently live sessions; extra connections are rejected.
    pub max_sessions: usize,
    /// Events queued per client before it counts as stalled and is dropped.
    pub observer_queue_capacity: usize,
    /// Longest a single frame write to a client may take.
    pub delivery_timeout: Duration,
    /// Pause after a failed accept before trying again.
    pub accept_backoff: Duration,
    /// `ServerFull` replies allowed in flight; further over-limit
    /// connections are closed without one.
    pub max_pending_rejections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_LOBBY_PORT}"),
            max_sessions: 1024,
            observer_queue_capacity: 256,
            delivery_timeout: Duration::from_secs(5),
            accept_backoff: Duration::from_millis(100),
            max_pending_rejections: 64,
        }
    }
}

/// The lobby server, ready to bind.
pub struct LobbyServer {
    config: ServerConfig,
    registry: Arc<GameRegistry>,
}

impl LobbyServer {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The registry this server will serve.
    pub fn registry(&self) -> Arc<GameRegistry> {
        Arc::clone(&self.registry)
    }

    /// Bind the listening endpoint and start accepting in the background.
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.config.bind_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let (state_tx, state_rx) = watch::channel(DispatcherState::Listening);
        let state_tx = Arc::new(state_tx);

        let max_sessions = self.config.max_sessions;
        let sessions = Arc::new(Semaphore::new(max_sessions));
        let ctx = SessionContext {
            registry: Arc::clone(&self.registry),
            config: self.config,
            state: state_rx.clone(),
        };
        let dispatcher = ConnectionDispatcher::new(
            listener,
            ctx,
            Arc::clone(&sessions),
            Arc::clone(&state_tx),
        );
        let task = tokio::spawn(dispatcher.run());

        Ok(ServerHandle {
            local_addr,
            registry: self.registry,
            sessions,
            max_sessions,
            state_tx,
            state_rx,
            task,
        })
    }

    /// Run until the process exits.
    pub async fn run(self) -> Result<(), ServerError> {
        self.start().await?.wait().await
    }
}

/// Control handle for a started server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    registry: Arc<GameRegistry>,
    sessions: Arc<Semaphore>,
    max_sessions: usize,
    state_tx: Arc<watch::Sender<DispatcherState>>,
    state_rx: watch::Receiver<DispatcherState>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> Arc<GameRegistry> {
        Arc::clone(&self.registry)
    }

    /// Sessions currently holding a slot.
    pub fn active_sessions(&self) -> usize {
        self.max_sessions.saturating_sub(self.sessions.available_permits())
    }

    pub fn state(&self) -> DispatcherState {
        *self.state_rx.borrow()
    }

    /// Stop accepting connections and end live sessions.
    pub fn shutdown(&self) {
        self.state_tx.send_replace(DispatcherState::Stopped);
    }

    /// Wait for the accept loop to finish.
    pub async fn wait(self) -> Result<(), ServerError> {
        self.task.await?;
        Ok(())
    }
}
