//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// Everything here is a message-level problem: the frame arrived intact,
/// but its contents could not be turned into a request the server
/// understands. The connection stays open and the sender gets an error
/// response.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (malformed JSON or a field of the wrong type).
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope named an action the server has no handler for.
    #[error("action handler not found: {0}")]
    UnknownAction(String),

    /// A string field held a value outside its vocabulary.
    #[error("invalid {field}: {value:?}")]
    InvalidValue {
        field: &'static str,
        value: String,
    },

    /// A field the action requires was absent.
    #[error("{0} is required")]
    MissingField(&'static str),
}
