//! Unified error type for the Noughts server.

use noughts_protocol::ProtocolError;
use noughts_session::SessionError;
use noughts_transport::TransportError;

use crate::ConfigError;

/// Top-level error wrapping each layer's error.
///
/// `#[from]` on every variant lets `?` lift sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum NoughtsError {
    /// Bind, accept, send or receive failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Unknown game or a rule violation.
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
