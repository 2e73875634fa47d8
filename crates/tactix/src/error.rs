//! Unified error type for the Tactix server.

use tactix_match::MatchError;
use tactix_protocol::ProtocolError;
use tactix_session::SessionError;
use tactix_transport::TransportError;

/// Top-level error that wraps every crate-specific error, so `?` works
/// across layers inside the server.
#[derive(Debug, thiserror::Error)]
pub enum TactixError {
    /// Connection, handshake or frame failure. Fatal to that connection.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The message could not be understood.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Delivery to a player's connection failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A game rule or storage failure.
    #[error(transparent)]
    Match(#[from] MatchError),
}

impl TactixError {
    /// The text sent back in the `error` field of a response.
    ///
    /// Storage and internal failures are not described to clients.
    pub fn client_message(&self) -> String {
        match self {
            Self::Protocol(ProtocolError::InvalidValue { field: "answer", .. }) => {
                "Answer must be 'yes' or 'no'".to_owned()
            }
            Self::Protocol(e) => e.to_string(),
            Self::Match(MatchError::Storage(_) | MatchError::UnknownState(_)) => {
                "internal server error".to_owned()
            }
            Self::Match(e) => e.to_string(),
            Self::Transport(_) | Self::Session(_) => "internal server error".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tactix_match::StorageError;
    use tactix_protocol::{Mark, PlayerId};
    use tactix_transport::FrameError;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: TactixError = TransportError::Frame(FrameError::Fragmented).into();
        assert!(matches!(err, TactixError::Transport(_)));
        assert!(err.to_string().contains("fragmented"));
    }

    #[test]
    fn test_from_session_error() {
        let err: TactixError = SessionError::NotConnected(PlayerId::new("p")).into();
        assert!(matches!(err, TactixError::Session(_)));
    }

    #[test]
    fn test_client_message_missing_player() {
        let err: TactixError = ProtocolError::MissingField("Player").into();
        assert_eq!(err.client_message(), "Player is required");
    }

    #[test]
    fn test_client_message_bad_answer() {
        let err: TactixError = ProtocolError::InvalidValue {
            field: "answer",
            value: "maybe".into(),
        }
        .into();
        assert_eq!(err.client_message(), "Answer must be 'yes' or 'no'");
    }

    #[test]
    fn test_client_message_domain_error_is_shown() {
        let err: TactixError = MatchError::NotYourTurn(Mark::X).into();
        assert_eq!(err.client_message(), "not your turn: waiting for X");
    }

    #[test]
    fn test_client_message_hides_storage_details() {
        let err: TactixError = MatchError::Storage(StorageError::Backend("disk on fire".into())).into();
        assert_eq!(err.client_message(), "internal server error");
    }
}
