//! Client-side mirror of the server's game registry.
//!
//! Kept current purely by server pushes; reads never touch the network.
//! Every applied push is re-announced on a local broadcast channel so a UI
//! can refresh the affected rows.

use hangman_lobby_protocol::{
    GameList, GameListObserver, GameListView, LobbyError, LobbyEvent, PlayerChange,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tokio::sync::broadcast;

const LOCAL_EVENT_CAPACITY: usize = 256;

pub struct GameListCache {
    games: RwLock<BTreeMap<String, i32>>,
    events: broadcast::Sender<LobbyEvent>,
}

impl GameListCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(LOCAL_EVENT_CAPACITY);
        Self {
            games: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    /// Listen for changes applied to this cache.
    pub fn subscribe(&self) -> broadcast::Receiver<LobbyEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.games.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.read().is_empty()
    }

    fn announce(&self, event: LobbyEvent) {
        // No listeners is fine.
        let _ = self.events.send(event);
    }

    fn adjust(&self, name: &str, delta: i32, change: PlayerChange) {
        if let Some(players) = self.games.write().get_mut(name) {
            *players = players.wrapping_add(delta);
        }
        self.announce(LobbyEvent::GamePlayersChanged {
            name: name.to_string(),
            change,
        });
    }
}

impl Default for GameListCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GameListObserver for GameListCache {
    fn add_game(&self, name: &str) {
        self.games.write().insert(name.to_string(), 0);
        self.announce(LobbyEvent::NewGame(name.to_string()));
    }

    fn set_game_players(&self, name: &str, players: i32) {
        self.games.write().insert(name.to_string(), players);
        self.announce(LobbyEvent::GamePlayersChanged {
            name: name.to_string(),
            change: PlayerChange::Set(players),
        });
    }

    fn increment_game_players(&self, name: &str) {
        self.adjust(name, 1, PlayerChange::Increment);
    }

    fn decrement_game_players(&self, name: &str) {
        self.adjust(name, -1, PlayerChange::Decrement);
    }

    fn remove_game(&self, name: &str) {
        self.games.write().remove(name);
        self.announce(LobbyEvent::RemovedGame(name.to_string()));
    }

    fn set_game_data(&self, games: GameList) {
        let replacement: BTreeMap<String, i32> = games.into_iter().collect();
        let snapshot: GameList = replacement.iter().map(|(n, p)| (n.clone(), *p)).collect();
        *self.games.write() = replacement;
        self.announce(LobbyEvent::GameDataReset(snapshot));
    }
}

impl GameListView for GameListCache {
    fn game_list(&self) -> GameList {
        self.games
            .read()
            .iter()
            .map(|(name, players)| (name.clone(), *players))
            .collect()
    }

    fn game_players(&self, name: &str) -> Result<i32, LobbyError> {
        self.games
            .read()
            .get(name)
            .copied()
            .ok_or_else(|| LobbyError::NoGameFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pushes_update_the_mirror() {
        let cache = GameListCache::new();
        cache.add_game("alpha");
        cache.increment_game_players("alpha");
        cache.increment_game_players("alpha");
        cache.set_game_players("beta", 3);
        cache.decrement_game_players("beta");

        assert_eq!(
            cache.game_list(),
            vec![("alpha".to_string(), 2), ("beta".to_string(), 2)]
        );
    }

    #[test]
    fn test_counts_wrap_at_the_bounds() {
        let cache = GameListCache::new();
        cache.set_game_players("alpha", i32::MAX);
        cache.increment_game_players("alpha");
        assert_eq!(cache.game_players("alpha"), Ok(i32::MIN));

        cache.decrement_game_players("alpha");
        assert_eq!(cache.game_players("alpha"), Ok(i32::MAX));

        cache.set_game_players("beta", i32::MIN);
        cache.decrement_game_players("beta");
        assert_eq!(cache.game_players("beta"), Ok(i32::MAX));
    }

    #[test]
    fn test_unknown_game_lookup_fails() {
        let cache = GameListCache::new();
        cache.increment_game_players("ghost");
        assert!(cache.is_empty());
        assert_eq!(
            cache.game_players("ghost"),
            Err(LobbyError::NoGameFound("ghost".into()))
        );
    }

    #[test]
    fn test_reset_discards_previous_view() {
        let cache = GameListCache::new();
        cache.add_game("stale");
        cache.set_game_data(vec![("fresh".into(), 2)]);

        assert_eq!(cache.game_list(), vec![("fresh".to_string(), 2)]);
        assert!(cache.game_players("stale").is_err());
    }

    #[test]
    fn test_local_listeners_see_applied_changes() {
        let cache = GameListCache::new();
        let mut events = cache.subscribe();

        cache.add_game("alpha");
        cache.remove_game("alpha");

        assert_eq!(events.try_recv().unwrap(), LobbyEvent::NewGame("alpha".into()));
        assert_eq!(events.try_recv().unwrap(), LobbyEvent::RemovedGame("alpha".into()));
    }
}
