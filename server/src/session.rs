//! Per-connection session worker.
//!
//! A session subscribes its client to registry events, then runs two halves:
//! - writer: drains the observer queue and pushes each event as a frame,
//!   bounded by the delivery timeout
//! - reader: decodes client requests and applies them to the registry
//!
//! Whichever half finishes first ends the session.

use crate::broadcast::ObserverHandle;
use crate::dispatcher::{self, DispatcherState};
use crate::registry::GameRegistry;
use crate::ServerConfig;
use hangman_lobby_protocol::{
    decode, encode_frame, ClientRequest, CodecError, FramingError, LobbyEvent, MessageBuffer,
    RejectReason, ServerMessage, MAX_MESSAGE_SIZE,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

const READ_CHUNK: usize = 16 * 1024;

// Payload allowance for one pushed event, leaving headroom under the frame cap.
const FRAME_BUDGET: usize = MAX_MESSAGE_SIZE / 2;

/// Why a session ended abnormally.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("delivery timed out after {0:?}")]
    DeliveryTimeout(Duration),
    #[error("observer dropped by broadcaster")]
    ObserverDropped,
}

/// Shared state every session needs.
pub(crate) struct SessionContext {
    pub registry: Arc<GameRegistry>,
    pub config: ServerConfig,
    pub state: watch::Receiver<DispatcherState>,
}

/// Serve one client until it disconnects, stalls, or the server stops.
pub(crate) async fn run(stream: TcpStream, peer: SocketAddr, ctx: Arc<SessionContext>) {
    let _ = stream.set_nodelay(true);
    let (read_half, write_half) = stream.into_split();

    let (observer, events) = ObserverHandle::new(peer.to_string(), ctx.config.observer_queue_capacity);
    let observer_id = ctx.registry.subscribe(observer);
    tracing::info!(%peer, ?observer_id, "Lobby session established");

    let (reply_tx, reply_rx) = mpsc::channel::<ServerMessage>(16);
    let mut writer = tokio::spawn(write_loop(
        write_half,
        events,
        reply_rx,
        ctx.config.delivery_timeout,
    ));

    let mut state = ctx.state.clone();
    let outcome = tokio::select! {
        result = read_loop(read_half, &ctx.registry, reply_tx) => result,
        result = &mut writer => match result {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(%peer, "Session writer panicked: {:?}", e);
                Ok(())
            }
        },
        _ = dispatcher::stopped(&mut state) => Ok(()),
    };

    ctx.registry.unsubscribe(observer_id);
    writer.abort();

    match outcome {
        Ok(()) => tracing::info!(%peer, "Lobby session closed"),
        Err(e) => tracing::warn!(%peer, "Lobby session ended: {}", e),
    }
}

/// Refuse a connection with a reason, without registering anything.
pub(crate) async fn reject(mut stream: TcpStream, reason: RejectReason, timeout: Duration) {
    let peer = stream.peer_addr().ok();
    if let Err(e) = write_message(&mut stream, &ServerMessage::Rejected(reason), timeout).await {
        tracing::debug!(?peer, "Failed to send rejection: {}", e);
    }
    let _ = stream.shutdown().await;
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut events: mpsc::Receiver<LobbyEvent>,
    mut replies: mpsc::Receiver<ServerMessage>,
    delivery_timeout: Duration,
) -> Result<(), SessionError> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    for part in event.into_parts(FRAME_BUDGET) {
                        write_message(&mut writer, &ServerMessage::Event(part), delivery_timeout).await?;
                    }
                }
                // The broadcaster let go of us; the client's view is stale.
                None => return Err(SessionError::ObserverDropped),
            },
            Some(reply) = replies.recv() => {
                write_message(&mut writer, &reply, delivery_timeout).await?;
            }
        }
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    registry: &GameRegistry,
    replies: mpsc::Sender<ServerMessage>,
) -> Result<(), SessionError> {
    let mut buffer = MessageBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }

        for frame in buffer.push(&chunk[..n]) {
            let frame = frame?;
            let rejection = match decode::<ClientRequest>(&frame) {
                Ok(request) => match request.validate() {
                    Ok(()) => {
                        tracing::debug!(?request, "Applying client request");
                        request.apply_to(registry);
                        None
                    }
                    Err(e) => Some(RejectReason::from(e)),
                },
                Err(e) => Some(RejectReason::MalformedRequest(e.to_string())),
            };

            if let Some(reason) = rejection {
                tracing::debug!(?reason, "Rejecting client request");
                let _ = replies.send(ServerMessage::Rejected(reason)).await;
            }
        }
    }
}

async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &ServerMessage,
    timeout: Duration,
) -> Result<(), SessionError> {
    let frame = encode_frame(message)?;
    tokio::time::timeout(timeout, writer.write_all(&frame))
        .await
        .map_err(|_| SessionError::DeliveryTimeout(timeout))??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangman_lobby_protocol::{encode, frame_message, GameListView, PlayerChange};

    async fn read_server_message<R: AsyncRead + Unpin>(reader: &mut R) -> ServerMessage {
        let mut len = [0u8; 4];
        reader.read_exact(&mut len).await.unwrap();
        let mut payload = vec![0u8; u32::from_be_bytes(len) as usize];
        reader.read_exact(&mut payload).await.unwrap();
        decode(&payload).unwrap()
    }

    #[tokio::test]
    async fn test_read_loop_applies_requests() {
        let registry = GameRegistry::new();
        let (mut client, server) = tokio::io::duplex(1024);
        let (reply_tx, mut reply_rx) = mpsc::channel(4);

        let mut bytes = Vec::new();
        for request in [
            ClientRequest::AddGame { name: "alpha".into() },
            ClientRequest::IncrementGamePlayers { name: "alpha".into() },
            ClientRequest::AddGame { name: "".into() },
        ] {
            bytes.extend(frame_message(&encode(&request).unwrap()).unwrap());
        }
        bytes.extend(frame_message(b"{oops").unwrap());
        client.write_all(&bytes).await.unwrap();
        drop(client);

        read_loop(server, &registry, reply_tx).await.unwrap();

        assert_eq!(registry.list_games(), vec![("alpha".to_string(), 1)]);
        assert_eq!(
            reply_rx.recv().await,
            Some(ServerMessage::Rejected(RejectReason::InvalidGameName("".into())))
        );
        assert!(matches!(
            reply_rx.recv().await,
            Some(ServerMessage::Rejected(RejectReason::MalformedRequest(_)))
        ));
    }

    #[tokio::test]
    async fn test_write_loop_pushes_events_in_order() {
        let (events_tx, events_rx) = mpsc::channel(8);
        let (_reply_tx, reply_rx) = mpsc::channel(1);
        let (mut client, server) = tokio::io::duplex(4096);

        let writer = tokio::spawn(write_loop(server, events_rx, reply_rx, Duration::from_secs(1)));
        events_tx.send(LobbyEvent::NewGame("alpha".into())).await.unwrap();
        events_tx
            .send(LobbyEvent::GamePlayersChanged {
                name: "alpha".into(),
                change: PlayerChange::Increment,
            })
            .await
            .unwrap();

        assert_eq!(
            read_server_message(&mut client).await,
            ServerMessage::Event(LobbyEvent::NewGame("alpha".into()))
        );
        assert_eq!(
            read_server_message(&mut client).await,
            ServerMessage::Event(LobbyEvent::GamePlayersChanged {
                name: "alpha".into(),
                change: PlayerChange::Increment,
            })
        );

        drop(events_tx);
        assert!(matches!(
            writer.await.unwrap(),
            Err(SessionError::ObserverDropped)
        ));
    }

    #[tokio::test]
    async fn test_write_times_out_on_stalled_reader() {
        let (events_tx, events_rx) = mpsc::channel(64);
        let (_reply_tx, reply_rx) = mpsc::channel(1);
        // Tiny pipe that nobody reads from.
        let (_client, server) = tokio::io::duplex(16);

        let writer = tokio::spawn(write_loop(server, events_rx, reply_rx, Duration::from_millis(50)));
        for i in 0..8 {
            let _ = events_tx.try_send(LobbyEvent::NewGame(format!("game-{i}")));
        }

        assert!(matches!(
            writer.await.unwrap(),
            Err(SessionError::DeliveryTimeout(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_snapshot_still_reaches_client() {
        let games: Vec<(String, i32)> = (0..30_000)
            .map(|i| (format!("hangman-lobby-game-{i:06}-with-a-long-name"), i))
            .collect();
        let (events_tx, events_rx) = mpsc::channel(1);
        let (_reply_tx, reply_rx) = mpsc::channel(1);
        let (mut client, server) = tokio::io::duplex(64 * 1024);

        let writer = tokio::spawn(write_loop(server, events_rx, reply_rx, Duration::from_secs(5)));
        events_tx
            .send(LobbyEvent::GameDataReset(games.clone()))
            .await
            .unwrap();

        let mirror = GameRegistry::new();
        let rebuilt = tokio::time::timeout(Duration::from_secs(10), async {
            while mirror.game_count() < games.len() {
                match read_server_message(&mut client).await {
                    ServerMessage::Event(event) => event.deliver_to(&mirror),
                    other => panic!("unexpected {other:?}"),
                }
            }
        })
        .await;

        assert!(rebuilt.is_ok());
        assert_eq!(mirror.game_list(), games);
        assert!(!writer.is_finished());
    }
}
