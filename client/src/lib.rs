//! Client for the hangman lobby.
//!
//! [`LobbyClient`] keeps a [`GameListCache`] in sync with the server and
//! relays mutations to it.

pub mod cache;
pub mod error;
pub mod lobby;

pub use cache::GameListCache;
pub use error::{
    ClientError, ConnectionError, ConnectionState, DisconnectReason, ReceiveError, SendError,
};
pub use lobby::{LobbyClient, LobbyConfig};
pub use hangman_lobby_protocol::{GameListObserver, GameListView};
