//! Codec trait and implementations for serializing/deserializing envelopes.
//!
//! The handler never calls `serde_json` directly. It goes through a
//! [`Codec`], so a binary format can replace JSON later without touching
//! the routing code.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected shape (unknown event type, missing field, a
    /// negative coordinate, ...).
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Browser clients speak JSON natively, which is why this is the default.
///
/// ```rust
/// use noughts_protocol::{ClientEvent, Codec, Envelope, JsonCodec};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::new(1, 0, ClientEvent::CreateGame);
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope<ClientEvent> = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
