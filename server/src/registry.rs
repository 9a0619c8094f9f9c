//! The authoritative game registry.
//!
//! Games live in a sharded map of atomic counters. Every per-game mutation
//! publishes its event while still holding that game's shard lock, so the
//! events for one game reach observers in the order the changes were
//! applied. Whole-registry operations (`set_game_data`, `subscribe`) take the
//! sequencer exclusively; everything else takes it shared.

use crate::broadcast::{EventBroadcaster, ObserverHandle, ObserverId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hangman_lobby_protocol::{
    GameList, GameListObserver, GameListView, LobbyError, LobbyEvent, PlayerChange,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};

pub struct GameRegistry {
    games: DashMap<String, AtomicI32>,
    sequencer: RwLock<()>,
    broadcaster: EventBroadcaster,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            games: DashMap::new(),
            sequencer: RwLock::new(()),
            broadcaster: EventBroadcaster::new(),
        }
    }

    /// The observers this registry publishes to.
    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    /// Track `name` with 0 players and publish `NewGame`.
    ///
    /// An existing game is reset to 0 rather than left alone. Concurrent
    /// calls for the same name collapse into one entry; each still publishes.
    pub fn add_game(&self, name: &str) {
        let _seq = self.sequencer.read();
        let entry = self
            .games
            .entry(name.to_string())
            .and_modify(|players| players.store(0, Ordering::SeqCst))
            .or_insert_with(|| AtomicI32::new(0));
        self.broadcaster.publish(LobbyEvent::NewGame(name.to_string()));
        drop(entry);
    }

    /// Set `name` to exactly `players`, creating it if needed.
    pub fn set_game_players(&self, name: &str, players: i32) {
        let _seq = self.sequencer.read();
        let entry = self
            .games
            .entry(name.to_string())
            .and_modify(|current| current.store(players, Ordering::SeqCst))
            .or_insert_with(|| AtomicI32::new(players));
        self.broadcaster.publish(LobbyEvent::GamePlayersChanged {
            name: name.to_string(),
            change: PlayerChange::Set(players),
        });
        drop(entry);
    }

    /// Add one player. Returns the new count, or `None` if `name` isn't
    /// tracked (the change event is published either way).
    pub fn increment_game_players(&self, name: &str) -> Option<i32> {
        self.adjust(name, 1, PlayerChange::Increment)
    }

    /// Remove one player. Counts may go negative.
    pub fn decrement_game_players(&self, name: &str) -> Option<i32> {
        self.adjust(name, -1, PlayerChange::Decrement)
    }

    fn adjust(&self, name: &str, delta: i32, change: PlayerChange) -> Option<i32> {
        let _seq = self.sequencer.read();
        // The vacant entry still pins the shard so a racing add_game can't
        // publish in between.
        let entry = self.games.entry(name.to_string());
        let players = match &entry {
            Entry::Occupied(occupied) => {
                // Counts wrap at the i32 bounds.
                Some(occupied.get().fetch_add(delta, Ordering::SeqCst).wrapping_add(delta))
            }
            Entry::Vacant(_) => None,
        };
        self.broadcaster.publish(LobbyEvent::GamePlayersChanged {
            name: name.to_string(),
            change,
        });
        drop(entry);
        players
    }

    /// Stop tracking `name`. `RemovedGame` is published even if it wasn't
    /// tracked. Returns whether an entry was removed.
    pub fn remove_game(&self, name: &str) -> bool {
        let _seq = self.sequencer.read();
        let event = LobbyEvent::RemovedGame(name.to_string());
        match self.games.entry(name.to_string()) {
            Entry::Occupied(occupied) => {
                self.broadcaster.publish(event);
                occupied.remove();
                true
            }
            Entry::Vacant(vacant) => {
                self.broadcaster.publish(event);
                drop(vacant);
                false
            }
        }
    }

    /// Replace every game with `games` and publish one `GameDataReset`.
    ///
    /// Later duplicates of a name win.
    pub fn set_game_data(&self, games: impl IntoIterator<Item = (String, i32)>) {
        let games: BTreeMap<String, i32> = games.into_iter().collect();
        let snapshot: GameList = games.iter().map(|(n, p)| (n.clone(), *p)).collect();

        let _seq = self.sequencer.write();
        self.games.clear();
        for (name, players) in games {
            self.games.insert(name, AtomicI32::new(players));
        }
        self.broadcaster.publish(LobbyEvent::GameDataReset(snapshot));
    }

    /// All games sorted by name.
    ///
    /// Each count is a value that entry really held; counts of different
    /// games may come from slightly different moments.
    pub fn list_games(&self) -> GameList {
        let _seq = self.sequencer.read();
        self.snapshot()
    }

    /// Player count for `name`.
    pub fn game_players(&self, name: &str) -> Result<i32, LobbyError> {
        let _seq = self.sequencer.read();
        self.games
            .get(name)
            .map(|players| players.load(Ordering::SeqCst))
            .ok_or_else(|| LobbyError::NoGameFound(name.to_string()))
    }

    /// Number of tracked games.
    pub fn game_count(&self) -> usize {
        let _seq = self.sequencer.read();
        self.games.len()
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.broadcaster.observer_count()
    }

    /// Register `observer` and queue the current game list as its first
    /// event.
    ///
    /// No mutation can land between the snapshot and the registration, so
    /// the observer neither misses a change nor sees one twice.
    pub fn subscribe(&self, observer: ObserverHandle) -> ObserverId {
        let _seq = self.sequencer.write();
        let snapshot = self.snapshot();
        self.broadcaster
            .add_observer_with(observer, LobbyEvent::GameDataReset(snapshot))
    }

    /// Stop publishing to an observer.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.broadcaster.remove_observer(id)
    }

    // Caller holds the sequencer.
    fn snapshot(&self) -> GameList {
        let mut games: GameList = self
            .games
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::SeqCst)))
            .collect();
        games.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        games
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GameListObserver for GameRegistry {
    fn add_game(&self, name: &str) {
        GameRegistry::add_game(self, name);
    }

    fn set_game_players(&self, name: &str, players: i32) {
        GameRegistry::set_game_players(self, name, players);
    }

    fn increment_game_players(&self, name: &str) {
        GameRegistry::increment_game_players(self, name);
    }

    fn decrement_game_players(&self, name: &str) {
        GameRegistry::decrement_game_players(self, name);
    }

    fn remove_game(&self, name: &str) {
        GameRegistry::remove_game(self, name);
    }

    fn set_game_data(&self, games: GameList) {
        GameRegistry::set_game_data(self, games);
    }
}

impl GameListView for GameRegistry {
    fn game_list(&self) -> GameList {
        self.list_games()
    }

    fn game_players(&self, name: &str) -> Result<i32, LobbyError> {
        GameRegistry::game_players(self, name)
    }
}
