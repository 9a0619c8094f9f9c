//! Accept loop for lobby connections.

use crate::session::{self, SessionContext};
use hangman_lobby_protocol::RejectReason;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};

// A refusal is a single tiny frame; don't let a peer hold the task longer.
const REJECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Lifecycle of the accept loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Accepting connections.
    Listening,
    /// Terminal; no further connections are accepted.
    Stopped,
}

/// Resolves once the dispatcher has been asked to stop.
pub(crate) async fn stopped(state: &mut watch::Receiver<DispatcherState>) {
    // An error means every sender is gone, which only happens after a stop.
    let _ = state.wait_for(|s| *s == DispatcherState::Stopped).await;
}

/// Accepts connections and hands each to its own session task.
pub struct ConnectionDispatcher {
    listener: TcpListener,
    sessions: Arc<Semaphore>,
    rejections: Arc<Semaphore>,
    ctx: Arc<SessionContext>,
    // Kept so the state channel outlives any handle.
    _state_tx: Arc<watch::Sender<DispatcherState>>,
}

impl ConnectionDispatcher {
    pub(crate) fn new(
        listener: TcpListener,
        ctx: SessionContext,
        sessions: Arc<Semaphore>,
        state_tx: Arc<watch::Sender<DispatcherState>>,
    ) -> Self {
        Self {
            listener,
            sessions,
            rejections: Arc::new(Semaphore::new(ctx.config.max_pending_rejections)),
            ctx: Arc::new(ctx),
            _state_tx: state_tx,
        }
    }

    /// Run until a stop is requested.
    ///
    /// Only `accept` is awaited here; all per-connection work runs in
    /// spawned tasks.
    pub async fn run(self) {
        let mut state = self.ctx.state.clone();
        tracing::info!(
            addr = ?self.listener.local_addr().ok(),
            max_sessions = self.ctx.config.max_sessions,
            "Lobby listening"
        );

        loop {
            tokio::select! {
                biased;
                _ = stopped(&mut state) => break,
                accepted = accept_or_back_off(self.listener.accept(), self.ctx.config.accept_backoff) => {
                    if let Some((stream, peer)) = accepted {
                        self.dispatch(stream, peer);
                    }
                }
            }
        }

        tracing::info!("Lobby stopped accepting connections");
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        match Arc::clone(&self.sessions).try_acquire_owned() {
            Ok(permit) => {
                tracing::debug!(%peer, "Connection accepted");
                let ctx = Arc::clone(&self.ctx);
                tokio::spawn(async move {
                    session::run(stream, peer, ctx).await;
                    drop(permit);
                });
            }
            Err(_) => match Arc::clone(&self.rejections).try_acquire_owned() {
                Ok(permit) => {
                    tracing::warn!(%peer, "Session limit reached, rejecting connection");
                    let timeout = self.ctx.config.delivery_timeout.min(REJECT_TIMEOUT);
                    tokio::spawn(async move {
                        session::reject(stream, RejectReason::ServerFull, timeout).await;
                        drop(permit);
                    });
                }
                // Too many refusals in flight already; just hang up.
                Err(_) => {
                    tracing::debug!(%peer, "Rejection backlog full, closing connection");
                    drop(stream);
                }
            },
        }
    }
}

/// Await one accept. A failure is logged and followed by `backoff` before
/// yielding `None`, so the caller simply loops again.
async fn accept_or_back_off<S>(
    accept: impl Future<Output = io::Result<(S, SocketAddr)>>,
    backoff: Duration,
) -> Option<(S, SocketAddr)> {
    match accept.await {
        Ok(accepted) => Some(accepted),
        Err(e) => {
            tracing::warn!("Error during connection accept, continuing: {}", e);
            tokio::time::sleep(backoff).await;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::GameRegistry;
    use crate::ServerConfig;
    use hangman_lobby_protocol::{decode, ServerMessage};
    use std::collections::VecDeque;
    use std::time::Instant;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_accept_failures_back_off_and_loop_continues() {
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let backoff = Duration::from_millis(20);
        let mut attempts: VecDeque<io::Result<(&str, SocketAddr)>> = VecDeque::from([
            Err(io::Error::other("too many open files")),
            Err(io::Error::other("connection aborted")),
            Ok(("conn", peer)),
        ]);

        let started = Instant::now();
        let mut failures = 0;
        let accepted = loop {
            let next = attempts.pop_front().unwrap();
            match accept_or_back_off(std::future::ready(next), backoff).await {
                Some(accepted) => break accepted,
                None => failures += 1,
            }
        };

        assert_eq!(accepted, ("conn", peer));
        assert_eq!(failures, 2);
        assert!(started.elapsed() >= backoff * 2);
    }

    async fn full_dispatcher(pending_rejections: usize) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (state_tx, state_rx) = watch::channel(DispatcherState::Listening);
        let ctx = SessionContext {
            registry: Arc::new(GameRegistry::new()),
            config: ServerConfig {
                max_pending_rejections: pending_rejections,
                ..ServerConfig::default()
            },
            state: state_rx,
        };
        // No session slots at all: every connection is over the limit.
        let dispatcher = ConnectionDispatcher::new(
            listener,
            ctx,
            Arc::new(Semaphore::new(0)),
            Arc::new(state_tx),
        );
        tokio::spawn(dispatcher.run());
        addr
    }

    #[tokio::test]
    async fn test_over_limit_connection_is_told_server_full() {
        let addr = full_dispatcher(1).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let mut bytes = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut bytes))
            .await
            .unwrap()
            .unwrap();
        let message: ServerMessage = decode(&bytes[4..]).unwrap();
        assert_eq!(message, ServerMessage::Rejected(RejectReason::ServerFull));
    }

    #[tokio::test]
    async fn test_rejections_beyond_backlog_are_closed_silently() {
        let addr = full_dispatcher(0).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let mut bytes = Vec::new();
        let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut bytes))
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }
}
