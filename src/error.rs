use thiserror::Error;

/// Custom error types for the watch-party server
#[derive(Debug, Error)]
pub enum PartyError {
    /// Room and membership errors
    #[error("Invalid room code: {0:?}")]
    InvalidRoomCode(String),

    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Could not allocate a room code after {0} attempts")]
    RoomCodeExhausted(usize),

    #[error("Connection {0} not authorized for this operation")]
    Unauthorized(String),

    #[error("Connection {0} is not in a room")]
    NotInRoom(String),

    /// Signaling errors
    #[error("No live connection with id {0}")]
    UnknownTarget(String),

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Convenience type alias for Results using PartyError
pub type Result<T> = std::result::Result<T, PartyError>;

impl PartyError {
    /// Helper to create configuration errors
    pub fn config(msg: impl Into<String>) -> Self {
        PartyError::InvalidConfiguration(msg.into())
    }

    /// Text sent back in an `error` event, or `None` when the rejection is
    /// dropped without telling the client.
    pub fn client_message(&self) -> Option<&'static str> {
        match self {
            PartyError::InvalidRoomCode(_) => Some("Invalid Room Code"),
            PartyError::RoomNotFound(_) => Some("Room not found"),
            PartyError::RoomCodeExhausted(_) => Some("Could not allocate a room code"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PartyError::RoomNotFound("ABC123".to_string());
        assert_eq!(err.to_string(), "Room ABC123 not found");
    }

    #[test]
    fn test_error_helpers() {
        let err = PartyError::config("bad port");
        assert!(matches!(err, PartyError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_client_visible_errors() {
        assert_eq!(
            PartyError::InvalidRoomCode("a-b".into()).client_message(),
            Some("Invalid Room Code")
        );
        assert_eq!(
            PartyError::RoomNotFound("ABC123".into()).client_message(),
            Some("Room not found")
        );
    }

    #[test]
    fn test_silent_errors_have_no_client_message() {
        assert!(PartyError::Unauthorized("c1".into()).client_message().is_none());
        assert!(PartyError::UnknownTarget("c2".into()).client_message().is_none());
        assert!(PartyError::NotInRoom("c3".into()).client_message().is_none());
    }
}
