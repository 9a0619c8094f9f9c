//! Types shared by the hangman lobby server and its clients.
//!
//! - [`LobbyEvent`]: registry-change notices fanned out to every client
//! - [`GameListObserver`] / [`GameListView`]: the notification channel each
//!   client exposes, and the read side over its cached game list
//! - [`ServerMessage`] / [`ClientRequest`]: what travels over a session
//! - [`framing`]: 4-byte length-prefixed frames

pub mod error;
pub mod event;
pub mod framing;
pub mod message;
pub mod observer;

pub use error::LobbyError;
pub use event::{GameList, LobbyEvent, PlayerChange};
pub use framing::{frame_message, FramingError, MessageBuffer, MAX_MESSAGE_SIZE};
pub use message::{decode, encode, encode_frame, ClientRequest, CodecError, RejectReason, ServerMessage};
pub use observer::{GameListObserver, GameListView};

/// Well-known port the lobby listens on.
pub const DEFAULT_LOBBY_PORT: u16 = 10005;

/// Longest game name, in bytes, a client may register.
pub const MAX_GAME_NAME_LEN: usize = 1024;

/// Check that a game name can be used as a registry key.
pub fn validate_game_name(name: &str) -> Result<(), LobbyError> {
    if name.trim().is_empty() || name.len() > MAX_GAME_NAME_LEN {
        return Err(LobbyError::InvalidGameName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_name_must_not_be_blank() {
        assert!(validate_game_name("alpha").is_ok());
        assert!(matches!(
            validate_game_name(""),
            Err(LobbyError::InvalidGameName(_))
        ));
        assert!(validate_game_name("   ").is_err());
    }

    #[test]
    fn test_game_name_length_is_capped() {
        assert!(validate_game_name(&"x".repeat(MAX_GAME_NAME_LEN)).is_ok());
        assert!(matches!(
            validate_game_name(&"x".repeat(MAX_GAME_NAME_LEN + 1)),
            Err(LobbyError::InvalidGameName(_))
        ));
    }
}
