//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire messages.
///
/// A `ProtocolError` always means the bytes were the problem, never the
/// game: a well-formed move that breaks the rules is a `GameError`.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown event type,
    /// missing fields, or values of the wrong type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
