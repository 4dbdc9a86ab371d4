/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer did not complete the protocol handshake.
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
