//! Interactive hangman lobby client.
//!
//! Run with: cargo run --bin lobby-cli -- 127.0.0.1:10005

use hangman_lobby_client::{GameListView, LobbyClient};
use hangman_lobby_protocol::{LobbyEvent, PlayerChange};
use std::io::{self, BufRead, Write};
use tokio::sync::{broadcast, mpsc};

const DEFAULT_SERVER: &str = "127.0.0.1:10005";

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

fn describe(event: &LobbyEvent, client: &LobbyClient) -> String {
    match event {
        LobbyEvent::NewGame(name) => format!("new game '{}'", name),
        LobbyEvent::RemovedGame(name) => format!("game '{}' removed", name),
        LobbyEvent::GamePlayersChanged { name, change } => {
            let now = client
                .game_players(name)
                .map(|p| p.to_string())
                .unwrap_or_else(|_| "?".into());
            match change {
                PlayerChange::Set(_) => format!("'{}' set to {} players", name, now),
                PlayerChange::Increment => format!("player joined '{}' ({} now)", name, now),
                PlayerChange::Decrement => format!("player left '{}' ({} now)", name, now),
            }
        }
        LobbyEvent::GameDataReset(games) => format!("game list synced ({} games)", games.len()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_SERVER.to_string());

    println!("=== Hangman Lobby ===");
    println!("Connecting to {}...", addr);
    let mut client = LobbyClient::connect(&addr).await?;
    let mut events = client.cache().subscribe();

    println!("Commands:");
    println!("  /list              - List games");
    println!("  /add <name>        - Create a game");
    println!("  /set <name> <n>    - Set a game's player count");
    println!("  /join <name>       - Join a game");
    println!("  /leave <name>      - Leave a game");
    println!("  /remove <name>     - Remove a game");
    println!("  /quit              - Exit");
    println!();

    let (line_tx, mut line_rx) = mpsc::channel::<String>(10);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        loop {
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if line_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    prompt()?;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => print!("\r\x1b[K[lobby] {}\n", describe(&event, &client)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        print!("\r\x1b[K[lobby] missed {} updates\n", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                prompt()?;
            }

            rejection = client.next_rejection() => match rejection {
                Some(reason) => {
                    print!("\r\x1b[K[rejected] {:?}\n", reason);
                    prompt()?;
                }
                None => {
                    match client.state().disconnect_reason() {
                        Some(reason) => println!("\r\x1b[K[Disconnected] {}", reason),
                        None => println!("\r\x1b[K[Disconnected]"),
                    }
                    break;
                }
            },

            line = line_rx.recv() => {
                let Some(line) = line else { break };
                let input = line.trim();
                if input.is_empty() {
                    prompt()?;
                    continue;
                }

                let parts: Vec<&str> = input.split_whitespace().collect();
                let result = match parts.as_slice() {
                    ["/quit" | "/exit" | "/q"] => {
                        println!("Goodbye!");
                        break;
                    }
                    ["/list"] => {
                        let games = client.game_list();
                        if games.is_empty() {
                            println!("No games yet. Create one with /add <name>");
                        } else {
                            for (name, players) in games {
                                println!("  {:<20} {} players", name, players);
                            }
                        }
                        Ok(())
                    }
                    ["/add", name] => client.add_game(name).await,
                    ["/set", name, count] => match count.parse::<i32>() {
                        Ok(count) => client.set_game_players(name, count).await,
                        Err(_) => {
                            println!("Invalid player count");
                            Ok(())
                        }
                    },
                    ["/join", name] => client.increment_game_players(name).await,
                    ["/leave", name] => client.decrement_game_players(name).await,
                    ["/remove", name] => client.remove_game(name).await,
                    [cmd, ..] => {
                        println!("Unknown command or arguments: {}", cmd);
                        Ok(())
                    }
                    [] => Ok(()),
                };

                if let Err(e) = result {
                    println!("Request failed: {}", e);
                }
                prompt()?;
            }
        }
    }

    client.close().await?;
    Ok(())
}
