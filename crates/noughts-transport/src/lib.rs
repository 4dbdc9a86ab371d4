//! Transport abstraction layer for Noughts.
//!
//! Provides the [`Transport`] and [`Connection`] traits so the server's
//! routing code never names a concrete network library, plus the
//! [`ConnectionId`] that identifies a connection everywhere above this
//! layer.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`.
//!   Crates that only need [`ConnectionId`] depend on this crate with
//!   default features off.

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
///
/// This is the identity a game binds a symbol to, so it must never be
/// reused while the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// An accepted peer that still has to complete its handshake.
    type Pending: Pending<Connection = Self::Connection, Error = Self::Error>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming peer.
    ///
    /// No handshake runs here, so a peer that stalls during its handshake
    /// never delays the next `accept`. Call [`Pending::upgrade`] on a task
    /// of its own.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// An accepted peer whose protocol handshake has not run yet.
pub trait Pending: Send + 'static {
    /// The connection produced once the handshake completes.
    type Connection: Connection;
    /// The error type for the handshake.
    type Error: std::error::Error + Send + Sync;

    /// Runs the handshake. Waits as long as the peer takes; callers bound
    /// it with a timeout.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive frames.
///
/// `send` and `recv` take `&self` and must be callable concurrently: one
/// task reads while another writes outbound events.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
