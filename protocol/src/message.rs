//! Messages exchanged over a lobby session.
//!
//! Every message is JSON inside a length-prefixed frame (see
//! [`crate::framing`]).

use crate::event::{GameList, LobbyEvent};
use crate::observer::GameListObserver;
use crate::LobbyError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Encoding / decoding failure for a session message.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("serialization failed: {0}")]
    Serialize(String),
    #[error("deserialization failed: {0}")]
    Deserialize(String),
}

/// Why the server refused a connection or request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// The server is at its session limit.
    ServerFull,
    /// A request named a game with an unusable name.
    InvalidGameName(String),
    /// A frame could not be decoded as a request.
    MalformedRequest(String),
}

impl From<LobbyError> for RejectReason {
    fn from(error: LobbyError) -> Self {
        match error {
            LobbyError::InvalidGameName(mut name) => {
                // Echo at most a name's worth so the reply always fits a frame.
                if name.len() > crate::MAX_GAME_NAME_LEN {
                    let cut = (0..=crate::MAX_GAME_NAME_LEN)
                        .rev()
                        .find(|&i| name.is_char_boundary(i))
                        .unwrap_or(0);
                    name.truncate(cut);
                }
                RejectReason::InvalidGameName(name)
            }
            other => RejectReason::MalformedRequest(other.to_string()),
        }
    }
}

/// Server -> client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// A registry change to replay on the client's cache.
    Event(LobbyEvent),
    /// A request or the connection itself was refused.
    Rejected(RejectReason),
}

/// Client -> server: a registry mutation relayed by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientRequest {
    AddGame { name: String },
    SetGamePlayers { name: String, players: i32 },
    IncrementGamePlayers { name: String },
    DecrementGamePlayers { name: String },
    RemoveGame { name: String },
    SetGameData { games: GameList },
}

impl ClientRequest {
    /// Reject requests naming games that can't be registry keys.
    pub fn validate(&self) -> Result<(), LobbyError> {
        match self {
            ClientRequest::AddGame { name }
            | ClientRequest::SetGamePlayers { name, .. }
            | ClientRequest::IncrementGamePlayers { name }
            | ClientRequest::DecrementGamePlayers { name }
            | ClientRequest::RemoveGame { name } => crate::validate_game_name(name),
            ClientRequest::SetGameData { games } => games
                .iter()
                .try_for_each(|(name, _)| crate::validate_game_name(name)),
        }
    }

    /// Apply this request to a game list.
    pub fn apply_to<O: GameListObserver + ?Sized>(self, target: &O) {
        match self {
            ClientRequest::AddGame { name } => target.add_game(&name),
            ClientRequest::SetGamePlayers { name, players } => {
                target.set_game_players(&name, players)
            }
            ClientRequest::IncrementGamePlayers { name } => target.increment_game_players(&name),
            ClientRequest::DecrementGamePlayers { name } => target.decrement_game_players(&name),
            ClientRequest::RemoveGame { name } => target.remove_game(&name),
            ClientRequest::SetGameData { games } => target.set_game_data(games),
        }
    }
}

/// Serialize a message to its frame payload.
pub fn encode<M: Serialize>(message: &M) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(|e| CodecError::Serialize(e.to_string()))
}

/// Serialize a message and wrap it in a length-prefixed frame.
pub fn encode_frame<M: Serialize>(message: &M) -> Result<Vec<u8>, CodecError> {
    let payload = encode(message)?;
    crate::framing::frame_message(&payload).map_err(|e| CodecError::Serialize(e.to_string()))
}

/// Deserialize a frame payload.
pub fn decode<M: DeserializeOwned>(payload: &[u8]) -> Result<M, CodecError> {
    serde_json::from_slice(payload).map_err(|e| CodecError::Deserialize(e.to_string()))
}
