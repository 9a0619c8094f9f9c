//! The notification channel between the authoritative registry and the
//! copies kept by clients.

use crate::error::LobbyError;
use crate::event::{GameList, LobbyEvent, PlayerChange};

/// Receives game list mutations.
///
/// The server's registry implements this as the authority; each client's
/// cache implements it to mirror pushes. One method per registry mutator.
pub trait GameListObserver: Send + Sync {
    /// A game now exists with 0 players (resets an existing count).
    fn add_game(&self, name: &str);

    /// Set a game's player count, creating the game if needed.
    fn set_game_players(&self, name: &str, players: i32);

    /// Bump a game's player count; no-op if the game is unknown.
    fn increment_game_players(&self, name: &str);

    /// Lower a game's player count; no-op if the game is unknown.
    fn decrement_game_players(&self, name: &str);

    /// Forget a game.
    fn remove_game(&self, name: &str);

    /// Replace the whole game list.
    fn set_game_data(&self, games: GameList);
}

/// Read access to a game list.
pub trait GameListView {
    /// All games sorted by name.
    fn game_list(&self) -> GameList;

    /// Player count for `name`.
    fn game_players(&self, name: &str) -> Result<i32, LobbyError>;
}

impl LobbyEvent {
    /// Invoke the observer method matching this event.
    pub fn deliver_to<O: GameListObserver + ?Sized>(&self, observer: &O) {
        match self {
            LobbyEvent::NewGame(name) => observer.add_game(name),
            LobbyEvent::GamePlayersChanged { name, change } => match change {
                PlayerChange::Set(players) => observer.set_game_players(name, *players),
                PlayerChange::Increment => observer.increment_game_players(name),
                PlayerChange::Decrement => observer.decrement_game_players(name),
            },
            LobbyEvent::RemovedGame(name) => observer.remove_game(name),
            LobbyEvent::GameDataReset(games) => observer.set_game_data(games.clone()),
        }
    }
}
