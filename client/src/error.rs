//! Error types for the lobby client.

use hangman_lobby_protocol::{CodecError, FramingError, RejectReason};
use thiserror::Error;

/// Main client error type.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Send failed: {0}")]
    Send(#[from] SendError),

    #[error("Receive failed: {0}")]
    Receive(#[from] ReceiveError),

    #[error("Disconnected: {0}")]
    Disconnected(#[from] DisconnectReason),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<CodecError> for ClientError {
    fn from(e: CodecError) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

/// Errors that occur during connection establishment.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    #[error("Connection refused: {0}")]
    Refused(String),

    #[error("Connection timeout")]
    Timeout,
}

/// Errors that occur when sending requests.
#[derive(Error, Debug, Clone)]
pub enum SendError {
    #[error("Stream error: {0}")]
    Stream(String),
}

/// Errors that occur when receiving pushes.
#[derive(Error, Debug, Clone)]
pub enum ReceiveError {
    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

impl From<FramingError> for ReceiveError {
    fn from(e: FramingError) -> Self {
        ReceiveError::MalformedMessage(e.to_string())
    }
}

/// Reasons for disconnection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    #[error("Connection closed by server")]
    ServerClosed,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rejected by server: {0:?}")]
    Rejected(RejectReason),

    #[error("Client closed connection")]
    ClientClosed,
}

/// Current state of a client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected and receiving pushes.
    Connected,
    /// Connection lost.
    Lost(DisconnectReason),
}

impl ConnectionState {
    /// Returns true if the connection is established and healthy.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Returns the disconnect reason if the connection was lost.
    pub fn disconnect_reason(&self) -> Option<&DisconnectReason> {
        match self {
            ConnectionState::Lost(reason) => Some(reason),
            _ => None,
        }
    }
}
