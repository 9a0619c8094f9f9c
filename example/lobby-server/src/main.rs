//! Hangman lobby server.
//!
//! Run with: cargo run --bin lobby-server -- --addr 0.0.0.0:10005

use clap::Parser;
use hangman_lobby_server::{LobbyServer, ServerConfig};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lobby-server", about = "Hangman game lobby server")]
struct Args {
    /// Address to accept lobby connections on.
    #[arg(long, env = "LOBBY_ADDR", default_value = "0.0.0.0:10005")]
    addr: String,

    /// Maximum concurrently connected clients.
    #[arg(long, env = "LOBBY_MAX_SESSIONS", default_value_t = 1024)]
    max_sessions: usize,

    /// Events buffered per client before it is considered stalled.
    #[arg(long, env = "LOBBY_QUEUE_CAPACITY", default_value_t = 256)]
    queue_capacity: usize,

    /// Per-frame write timeout in milliseconds.
    #[arg(long, env = "LOBBY_DELIVERY_TIMEOUT_MS", default_value_t = 5000)]
    delivery_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let server = LobbyServer::builder()
        .config(ServerConfig {
            bind_addr: args.addr,
            max_sessions: args.max_sessions,
            observer_queue_capacity: args.queue_capacity,
            delivery_timeout: Duration::from_millis(args.delivery_timeout_ms),
            ..ServerConfig::default()
        })
        .build()?;

    let handle = server.start().await?;
    tracing::info!(addr = %handle.local_addr(), "Lobby server listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    handle.shutdown();
    handle.wait().await?;

    Ok(())
}
