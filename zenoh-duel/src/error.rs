/// Error types for the zenoh-duel library
use thiserror::Error;

/// Result type alias for duel operations
pub type Result<T> = std::result::Result<T, DuelError>;

/// Errors that can occur in zenoh-duel operations
#[derive(Debug, Error)]
pub enum DuelError {
    /// Zenoh-related errors
    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    /// Invalid player name provided
    #[error("Invalid player name: {0}. Must be a valid single-chunk keyexpr (no /, *, $, ?, #, @)")]
    InvalidPlayerName(String),

    /// Invalid room identifier provided
    #[error("Invalid room id: {0}")]
    InvalidRoomId(String),

    /// Invalid keyexpr pattern
    #[error("Invalid keyexpr: {0}")]
    InvalidKeyexpr(String),

    /// Invalid room status transition attempted
    #[error("Invalid state transition: from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state
        from: String,
        /// Attempted target state
        to: String,
    },

    /// Room does not exist in the store
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Join attempted on a room that is no longer waiting for a guest
    #[error("Room {room} is not joinable (status: {status})")]
    RoomNotJoinable {
        /// Room identifier
        room: String,
        /// Status observed at join time
        status: String,
    },

    /// Player does not take part in the room
    #[error("Player {player} does not play in room {room}")]
    NotInRoom {
        /// Room identifier
        room: String,
        /// Offending player
        player: String,
    },

    /// Publish or subscribe failure in the transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Channel closed on the other side
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for DuelError {
    fn from(e: serde_json::Error) -> Self {
        DuelError::Serialization(e.to_string())
    }
}
