//! Test harness: a live server plus helpers for connecting to it.

use hangman_lobby_client::LobbyClient;
use hangman_lobby_protocol::{decode, encode_frame, ClientRequest, ServerMessage};
use hangman_lobby_server::{GameRegistry, LobbyServer, ServerBuilder, ServerHandle};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const WAIT: Duration = Duration::from_secs(5);

/// A running server bound to `127.0.0.1:0`.
pub struct LobbyTestHarness {
    pub handle: ServerHandle,
}

impl LobbyTestHarness {
    pub async fn start() -> Self {
        Self::start_with(LobbyServer::builder()).await
    }

    pub async fn start_with(builder: ServerBuilder) -> Self {
        let handle = builder
            .bind_addr("127.0.0.1:0")
            .build()
            .expect("valid config")
            .start()
            .await
            .expect("server starts");
        Self { handle }
    }

    pub fn addr(&self) -> String {
        self.handle.local_addr().to_string()
    }

    pub fn registry(&self) -> Arc<GameRegistry> {
        self.handle.registry()
    }

    pub async fn connect(&self) -> LobbyClient {
        LobbyClient::connect(&self.addr()).await.expect("client connects")
    }

    /// A bare TCP connection that speaks the wire format by hand.
    pub async fn connect_raw(&self) -> RawConnection {
        RawConnection {
            stream: TcpStream::connect(self.addr()).await.expect("raw connect"),
        }
    }
}

pub struct RawConnection {
    pub stream: TcpStream,
}

impl RawConnection {
    pub async fn send(&mut self, request: &ClientRequest) {
        let frame = encode_frame(request).unwrap();
        self.stream.write_all(&frame).await.unwrap();
    }

    pub async fn recv(&mut self) -> ServerMessage {
        tokio::time::timeout(WAIT, async {
            let mut len = [0u8; 4];
            self.stream.read_exact(&mut len).await.unwrap();
            let mut payload = vec![0u8; u32::from_be_bytes(len) as usize];
            self.stream.read_exact(&mut payload).await.unwrap();
            decode(&payload).unwrap()
        })
        .await
        .expect("server message within timeout")
    }
}

/// Poll `check` until it holds or the wait runs out.
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Await `fut`, failing the test if it takes longer than the wait.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(WAIT, fut).await.expect("timed out")
}
