use thiserror::Error;

/// Errors surfaced by lobby queries and request validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LobbyError {
    #[error("No game found: {0}")]
    NoGameFound(String),

    #[error("Invalid game name: {0:?}")]
    InvalidGameName(String),
}
