//! Lobby client implementation.

use crate::cache::GameListCache;
use crate::error::{ConnectionError, ConnectionState, DisconnectReason, ReceiveError, SendError};
use crate::ClientError;
use hangman_lobby_protocol::{
    decode, encode_frame, ClientRequest, GameList, GameListView, LobbyError, MessageBuffer,
    RejectReason, ServerMessage,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

const READ_CHUNK: usize = 16 * 1024;
const REJECTION_BACKLOG: usize = 32;

// ============================================================================
// Config
// ============================================================================

/// Configuration for lobby connection.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// How long to wait for the TCP handshake.
    pub connect_timeout: Duration,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
        }
    }
}

// ============================================================================
// LobbyClient
// ============================================================================

/// A connection to the lobby server with a locally mirrored game list.
///
/// The server pushes every registry change; a background task applies them
/// to the [`GameListCache`], so [`game_list`](Self::game_list) and
/// [`game_players`](Self::game_players) are answered locally.
pub struct LobbyClient {
    cache: Arc<GameListCache>,
    writer: Mutex<OwnedWriteHalf>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    rejections: mpsc::Receiver<RejectReason>,
    reader: JoinHandle<()>,
}

impl LobbyClient {
    /// Connect to the lobby at `addr` (e.g. `"127.0.0.1:10005"`).
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        Self::connect_with(addr, LobbyConfig::default()).await
    }

    pub async fn connect_with(addr: &str, config: LobbyConfig) -> Result<Self, ClientError> {
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ConnectionError::Timeout)?
            .map_err(|e| ConnectionError::Refused(e.to_string()))?;
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let cache = Arc::new(GameListCache::new());
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let state_tx = Arc::new(state_tx);
        let (rejection_tx, rejections) = mpsc::channel(REJECTION_BACKLOG);

        let reader = tokio::spawn(read_loop(
            read_half,
            Arc::clone(&cache),
            Arc::clone(&state_tx),
            rejection_tx,
        ));

        tracing::debug!(%addr, "Connected to lobby");

        Ok(Self {
            cache,
            writer: Mutex::new(write_half),
            state_tx,
            state_rx,
            rejections,
            reader,
        })
    }

    /// The local mirror, for subscribing to applied changes.
    pub fn cache(&self) -> Arc<GameListCache> {
        Arc::clone(&self.cache)
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Wait until the connection is lost and report why.
    pub async fn closed(&self) -> DisconnectReason {
        let mut state = self.state_rx.clone();
        loop {
            if let ConnectionState::Lost(reason) = &*state.borrow_and_update() {
                return reason.clone();
            }
            if state.changed().await.is_err() {
                return DisconnectReason::ClientClosed;
            }
        }
    }

    /// Next request the server refused, in the order they were refused.
    ///
    /// Returns `None` once the connection is gone and no refusals remain.
    pub async fn next_rejection(&mut self) -> Option<RejectReason> {
        self.rejections.recv().await
    }

    pub async fn add_game(&self, name: &str) -> Result<(), ClientError> {
        self.send(ClientRequest::AddGame { name: name.to_string() }).await
    }

    pub async fn set_game_players(&self, name: &str, players: i32) -> Result<(), ClientError> {
        self.send(ClientRequest::SetGamePlayers {
            name: name.to_string(),
            players,
        })
        .await
    }

    pub async fn increment_game_players(&self, name: &str) -> Result<(), ClientError> {
        self.send(ClientRequest::IncrementGamePlayers { name: name.to_string() })
            .await
    }

    pub async fn decrement_game_players(&self, name: &str) -> Result<(), ClientError> {
        self.send(ClientRequest::DecrementGamePlayers { name: name.to_string() })
            .await
    }

    pub async fn remove_game(&self, name: &str) -> Result<(), ClientError> {
        self.send(ClientRequest::RemoveGame { name: name.to_string() }).await
    }

    /// Replace the server's whole game list.
    pub async fn set_game_data(&self, games: GameList) -> Result<(), ClientError> {
        self.send(ClientRequest::SetGameData { games }).await
    }

    async fn send(&self, request: ClientRequest) -> Result<(), ClientError> {
        if let ConnectionState::Lost(reason) = self.state() {
            return Err(ClientError::Disconnected(reason));
        }
        let frame = encode_frame(&request)?;
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.write_all(&frame).await {
            self.mark_lost(DisconnectReason::NetworkError(e.to_string()));
            return Err(SendError::Stream(e.to_string()).into());
        }
        Ok(())
    }

    fn mark_lost(&self, reason: DisconnectReason) {
        mark_lost(&self.state_tx, reason);
    }

    /// Close the lobby connection.
    pub async fn close(self) -> Result<(), ClientError> {
        self.mark_lost(DisconnectReason::ClientClosed);
        self.reader.abort();
        let mut writer = self.writer.lock().await;
        writer
            .shutdown()
            .await
            .map_err(|e| SendError::Stream(e.to_string()))?;
        Ok(())
    }
}

impl GameListView for LobbyClient {
    fn game_list(&self) -> GameList {
        self.cache.game_list()
    }

    fn game_players(&self, name: &str) -> Result<i32, LobbyError> {
        self.cache.game_players(name)
    }
}

impl Drop for LobbyClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Record the first reason the connection went away; later ones are noise.
fn mark_lost(state: &watch::Sender<ConnectionState>, reason: DisconnectReason) {
    state.send_if_modified(|current| {
        if current.is_connected() {
            *current = ConnectionState::Lost(reason);
            true
        } else {
            false
        }
    });
}

async fn read_loop(
    reader: OwnedReadHalf,
    cache: Arc<GameListCache>,
    state: Arc<watch::Sender<ConnectionState>>,
    rejections: mpsc::Sender<RejectReason>,
) {
    let reason = match pump(reader, &cache, &rejections).await {
        Ok(reason) => reason,
        Err(e) => DisconnectReason::NetworkError(e.to_string()),
    };
    tracing::debug!(?reason, "Lobby connection ended");
    mark_lost(&state, reason);
}

async fn pump(
    mut reader: OwnedReadHalf,
    cache: &GameListCache,
    rejections: &mpsc::Sender<RejectReason>,
) -> Result<DisconnectReason, ReceiveError> {
    let mut buffer = MessageBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = reader
            .read(&mut chunk)
            .await
            .map_err(|e| ReceiveError::Stream(e.to_string()))?;
        if n == 0 {
            return Ok(DisconnectReason::ServerClosed);
        }

        for frame in buffer.push(&chunk[..n]) {
            let frame = frame?;
            let message: ServerMessage =
                decode(&frame).map_err(|e| ReceiveError::MalformedMessage(e.to_string()))?;
            match message {
                ServerMessage::Event(event) => {
                    tracing::trace!(?event, "Applying lobby push");
                    event.deliver_to(cache);
                }
                ServerMessage::Rejected(RejectReason::ServerFull) => {
                    return Ok(DisconnectReason::Rejected(RejectReason::ServerFull));
                }
                ServerMessage::Rejected(reason) => {
                    if rejections.try_send(reason).is_err() {
                        tracing::debug!("Rejection backlog full, discarding");
                    }
                }
            }
        }
    }
}
