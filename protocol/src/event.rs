//! Registry-change events.

use serde::{Deserialize, Serialize};

/// Ordered `(name, players)` pairs, sorted by name.
pub type GameList = Vec<(String, i32)>;

/// How a game's player count changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerChange {
    /// Count was set to an exact value.
    Set(i32),
    /// Count was bumped by one (no-op if the game was absent).
    Increment,
    /// Count was lowered by one (no-op if the game was absent).
    Decrement,
}

/// A notice that the game registry changed.
///
/// Each event carries just enough to let an observer replay the change on
/// its own copy of the game list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyEvent {
    /// A game now exists with 0 players.
    NewGame(String),
    /// A game's player count changed.
    GamePlayersChanged { name: String, change: PlayerChange },
    /// A game no longer exists.
    RemovedGame(String),
    /// The whole list was replaced; observers discard their view.
    GameDataReset(GameList),
}

impl LobbyEvent {
    /// Split into pieces whose encoded size stays under `budget` bytes.
    ///
    /// Only a reset can outgrow a frame. It becomes a smaller reset followed
    /// by one `Set` change per remaining game; applied in order, the pieces
    /// leave an observer with the same list as the original. Any other
    /// event comes back unchanged.
    pub fn into_parts(self, budget: usize) -> Vec<LobbyEvent> {
        let LobbyEvent::GameDataReset(mut games) = self else {
            return vec![self];
        };

        let head = games
            .iter()
            .scan(0usize, |used, (name, _)| {
                *used += encoded_entry_bound(name);
                Some(*used)
            })
            .take_while(|used| *used <= budget)
            .count();
        let tail = games.split_off(head);

        let mut parts = Vec::with_capacity(1 + tail.len());
        parts.push(LobbyEvent::GameDataReset(games));
        parts.extend(tail.into_iter().map(|(name, players)| LobbyEvent::GamePlayersChanged {
            name,
            change: PlayerChange::Set(players),
        }));
        parts
    }
}

// Worst case for one `["name",players]` entry: every name byte escaped as
// `\u00XX`, plus quotes, brackets, separators and an 11-digit count.
fn encoded_entry_bound(name: &str) -> usize {
    name.len() * 6 + 16
}
